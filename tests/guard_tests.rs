//! Route guard behaviour through the application shell.

use snowdash::activity::ActivityLog;
use snowdash::api::ApiClient;
use snowdash::app::Shell;
use snowdash::config::DashConfig;
use snowdash::config::schema::BackendConfig;
use snowdash::guard::{RenderDecision, Route};
use snowdash::session::{KEY_AUTH_TOKEN, KEY_IS_AUTH, MemoryStorage, Session};

fn shell(session: Session, landing: &str) -> Shell {
    let mut config = DashConfig::default();
    config.views.landing = landing.to_string();
    let client = ApiClient::from_config(&BackendConfig::default(), ActivityLog::disabled());
    Shell::new(config, session, client)
}

fn signed_in() -> Session {
    Session::restore(Box::new(MemoryStorage::with_entries([
        (KEY_IS_AUTH, "yes"),
        (KEY_AUTH_TOKEN, "tok"),
    ])))
}

#[test]
fn signed_out_user_only_reaches_login() {
    let shell = shell(Session::in_memory(), "/usage");
    for route in Route::nav_entries() {
        assert_eq!(
            shell.navigate(route.path()),
            RenderDecision::RedirectTo {
                target: Route::Login,
                from: Some(route),
            }
        );
    }
    assert_eq!(shell.navigate("/login"), RenderDecision::Allow(Route::Login));
}

#[test]
fn signed_in_user_skips_login() {
    let shell = shell(signed_in(), "/queries");
    assert_eq!(shell.landing(), Route::Queries);
    assert_eq!(
        shell.navigate("/login"),
        RenderDecision::RedirectTo {
            target: Route::Queries,
            from: Some(Route::Login),
        }
    );
    assert_eq!(shell.navigate("/usage/"), RenderDecision::Allow(Route::Usage));
}

#[test]
fn bad_landing_falls_back_to_usage() {
    let shell = shell(signed_in(), "/login");
    assert_eq!(shell.landing(), Route::Usage);
}

#[test]
fn unknown_path_is_not_found() {
    let shell = shell(signed_in(), "/usage");
    assert_eq!(
        shell.navigate("/admin"),
        RenderDecision::NotFound("/admin".into())
    );
}

#[test]
fn logout_locks_protected_routes_again() {
    let mut shell = shell(signed_in(), "/usage");
    assert_eq!(shell.navigate("/queries"), RenderDecision::Allow(Route::Queries));

    shell.logout().unwrap();
    assert!(!shell.session().is_authenticated());
    // A user-initiated logout leaves no banner.
    assert_eq!(shell.session().message(), None);
    assert!(matches!(
        shell.navigate("/queries"),
        RenderDecision::RedirectTo {
            target: Route::Login,
            ..
        }
    ));
}
