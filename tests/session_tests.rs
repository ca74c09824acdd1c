//! Sign-in flow against an in-process backend: persistence across restarts,
//! rejected credentials, and returning to the page that required login.
mod common;

use serde_json::json;
use snowdash::guard::{self, RenderDecision, Route};
use snowdash::session::{FileStorage, KEY_CURRENT_USER, KEY_IS_AUTH, Session};
use snowdash::views::login::{LoginForm, LoginResult, LoginView};

use common::Backend;

fn form() -> LoginForm {
    LoginForm {
        username: "alice".into(),
        password: "hunter2".into(),
        account: "acme".into(),
    }
}

#[test]
fn login_persists_and_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    let backend = Backend::start(vec![(
        200,
        json!({"auth_token": "tok-9", "userData": {"currentUser": "ALICE", "role": "analyst"}}),
    )]);
    let client = backend.client();

    let mut session = Session::restore(Box::new(FileStorage::open(&path)));
    assert!(!session.is_authenticated());
    assert!(session.authenticate(&client, "alice", "hunter2", "acme").unwrap());

    let seen = backend.next_request();
    assert_eq!(seen.method, "POST");
    assert!(seen.url.starts_with("/login"));
    assert_eq!(
        seen.json_body(),
        json!({"username": "alice", "password": "hunter2", "account": "acme"})
    );
    assert_eq!(seen.header("Authorization"), None);

    let reopened = Session::restore(Box::new(FileStorage::open(&path)));
    assert!(reopened.is_authenticated());
    assert_eq!(reopened.token(), Some("tok-9"));
    assert_eq!(reopened.current_user(), Some("ALICE"));
    assert_eq!(reopened.storage().get("role").as_deref(), Some("analyst"));
    assert_eq!(reopened.storage().get(KEY_IS_AUTH).as_deref(), Some("yes"));
}

#[test]
fn login_without_user_data_remembers_username() {
    let backend = Backend::start(vec![(200, json!({"auth_token": "tok-1"}))]);
    let mut session = Session::in_memory();
    assert!(
        session
            .authenticate(&backend.client(), "bob", "pw", "acme")
            .unwrap()
    );
    assert_eq!(session.current_user(), Some("bob"));
    assert_eq!(
        session.storage().get(KEY_CURRENT_USER).as_deref(),
        Some("bob")
    );
}

#[test]
fn rejected_login_keeps_banner() {
    let backend = Backend::start(vec![(
        401,
        json!({"data": {"message": "Incorrect username or password was specified."}}),
    )]);
    let mut session = Session::in_memory();
    let ok = session
        .authenticate(&backend.client(), "alice", "wrong", "acme")
        .unwrap();

    assert!(!ok);
    assert!(!session.is_authenticated());
    assert_eq!(
        session.message(),
        Some("Incorrect username or password was specified.")
    );
    assert!(session.storage().is_empty());
}

#[test]
fn login_returns_to_requested_page() {
    let mut session = Session::in_memory();
    let from = match guard::decide(&session, "/queries", Route::Usage) {
        RenderDecision::RedirectTo {
            target: Route::Login,
            from,
        } => from,
        other => panic!("expected redirect to login, got {other:?}"),
    };
    assert_eq!(from, Some(Route::Queries));

    let backend = Backend::start(vec![(200, json!({"auth_token": "tok"}))]);
    let view = LoginView::new(from);
    let result = view
        .submit(&backend.client(), &mut session, &form(), Route::Usage)
        .unwrap();

    assert_eq!(result, LoginResult::SignedIn(Route::Queries));
    assert_eq!(
        guard::decide(&session, "/queries", Route::Usage),
        RenderDecision::Allow(Route::Queries)
    );
}

#[test]
fn rejected_submit_reports_banner() {
    let backend = Backend::start(vec![(500, json!("account locked"))]);
    let mut session = Session::in_memory();
    let result = LoginView::default()
        .submit(&backend.client(), &mut session, &form(), Route::Usage)
        .unwrap();
    assert_eq!(result, LoginResult::Rejected("account locked".into()));
}
