//! Screen controllers driven end to end through the HTTP client.
mod common;

use serde_json::json;
use snowdash::app::Shell;
use snowdash::config::DashConfig;
use snowdash::guard::{RenderDecision, Route};
use snowdash::session::{
    KEY_AUTH_TOKEN, KEY_CURRENT_USER, KEY_IS_AUTH, MemoryStorage, SESSION_EXPIRED_MESSAGE,
    Session,
};
use snowdash::views::FetchOutcome;
use snowdash::views::queries::{ExecutionStatus, Interval, Listing, QueriesView};
use snowdash::views::usage::{NO_USAGE_MESSAGE, UsageListing, UsageView};

use common::Backend;

fn session_for(user: &str) -> Session {
    Session::restore(Box::new(MemoryStorage::with_entries([
        (KEY_IS_AUTH, "yes"),
        (KEY_AUTH_TOKEN, "tok"),
        (KEY_CURRENT_USER, user),
    ])))
}

fn running_row(id: &str, user: &str) -> serde_json::Value {
    json!({
        "QUERY_ID": id,
        "EXECUTION_STATUS": "RUNNING",
        "QUERY_TEXT": "select 1",
        "USER_NAME": user,
        "START_TIME": "2026-10-19 09:15:00.000",
        "END_TIME": null,
        "TOTAL_ELAPSED_TIME": 1200,
    })
}

#[test]
fn empty_queries_reply_shows_interval_message() {
    let backend = Backend::start(vec![(200, json!({"data": []}))]);
    let mut session = session_for("alice");
    let mut view = QueriesView::new(Interval::DEFAULT, "SEDCADMIN");

    assert_eq!(view.refresh(&backend.client(), &mut session), FetchOutcome::Updated);
    assert!(backend.next_request().url.contains("numMinutes=30"));
    assert_eq!(
        view.listing(),
        Listing::Empty("There are no queries from the past 30 minutes.".into())
    );
}

#[test]
fn interval_change_waits_for_refresh() {
    let backend = Backend::start(vec![
        (200, json!({"data": [running_row("q1", "alice")]})),
        (200, json!({"data": [running_row("q1", "alice")]})),
    ]);
    let client = backend.client();
    let mut session = session_for("alice");
    let mut view = QueriesView::new(Interval::DEFAULT, "SEDCADMIN");
    view.refresh(&client, &mut session);
    backend.next_request();

    view.select_interval(Interval::from_minutes(120).unwrap());
    assert_eq!(view.listing(), Listing::IntervalChanged);

    view.refresh(&client, &mut session);
    assert!(backend.next_request().url.contains("numMinutes=120"));
    assert!(matches!(view.listing(), Listing::Rows(rows) if rows.len() == 1));
}

#[test]
fn owner_can_stop_running_query() {
    let backend = Backend::start(vec![
        (
            200,
            json!({"data": [running_row("q1", "alice"), running_row("q2", "bob")]}),
        ),
        (
            200,
            json!({"data": {
                "status": "FAILED_WITH_ERROR",
                "error_code": "000604",
                "error_message": "SQL execution canceled",
                "start_time": "2026-10-19 09:15:00.000",
                "end_time": "2026-10-19 09:20:00.000",
            }}),
        ),
    ]);
    let client = backend.client();
    let mut session = session_for("alice");
    let mut view = QueriesView::new(Interval::DEFAULT, "SEDCADMIN");
    view.refresh(&client, &mut session);
    backend.next_request();

    // Someone else's query never reaches the backend.
    assert_eq!(view.stop(&client, &mut session, "q2"), FetchOutcome::Refused);

    assert_eq!(view.stop(&client, &mut session, "q1"), FetchOutcome::Updated);
    let seen = backend.next_request();
    assert!(seen.url.starts_with("/queries/stop"));
    assert_eq!(seen.json_body(), json!({"id": "q1"}));
    assert!(seen.header("Timestamp").is_some());

    let row = view.find("q1").unwrap();
    assert_eq!(row.status, ExecutionStatus::FailedWithError);
    assert_eq!(
        row.status_description(),
        "Failed with Error Code 000604: SQL execution canceled"
    );
    assert!(!view.can_stop(row, &session));
}

#[test]
fn privileged_account_can_stop_any_running_query() {
    let backend = Backend::start(vec![(200, json!({"data": [running_row("q2", "bob")]}))]);
    let mut session = session_for("SEDCADMIN");
    let mut view = QueriesView::new(Interval::DEFAULT, "SEDCADMIN");
    view.refresh(&backend.client(), &mut session);

    let row = view.find("q2").unwrap();
    assert!(view.can_stop(row, &session));
}

#[test]
fn expired_token_sends_queries_screen_to_login() {
    let backend = Backend::start(vec![(
        401,
        json!({"data": {"message": "authorization token expired"}}),
    )]);
    let mut shell = Shell::new(
        DashConfig::default(),
        session_for("alice"),
        backend.client(),
    );
    let mut view = shell.queries_view();

    let (client, session) = shell.parts();
    assert_eq!(view.refresh(client, session), FetchOutcome::RedirectToLogin);
    assert_eq!(view.listing(), Listing::Loading);

    assert_eq!(
        shell.navigate("/queries"),
        RenderDecision::RedirectTo {
            target: Route::Login,
            from: Some(Route::Queries),
        }
    );
    assert_eq!(shell.session().message(), Some(SESSION_EXPIRED_MESSAGE));
}

#[test]
fn cut_off_reply_is_not_an_empty_list() {
    let client = common::client_for(&common::short_body_url(4096, r#"{"data": ["#));
    let mut session = session_for("alice");
    let mut view = QueriesView::new(Interval::DEFAULT, "SEDCADMIN");
    assert_eq!(view.refresh(&client, &mut session), FetchOutcome::Failed);
    assert!(matches!(view.listing(), Listing::Error(_)));
}

#[test]
fn server_error_shows_banner() {
    let backend = Backend::start(vec![(500, json!({"message": "warehouse suspended"}))]);
    let mut session = session_for("alice");
    let mut view = QueriesView::new(Interval::DEFAULT, "SEDCADMIN");
    assert_eq!(view.refresh(&backend.client(), &mut session), FetchOutcome::Failed);
    assert_eq!(view.listing(), Listing::Error("warehouse suspended"));
    assert!(session.is_authenticated());
}

#[test]
fn usage_selects_last_month_and_charts_a_day() {
    let backend = Backend::start(vec![(
        200,
        json!({"data": {
            "September, 2026": {
                "30": {"credits": 2.0, "interval": vec![0.5; 24]}
            },
            "October, 2026": {
                "1": {"credits": 0, "interval": vec![0.0; 24]},
                "2": {
                    "credits": 3.25,
                    "interval": vec![0.25; 48],
                    "users": {"ALICE": {"share": 75.0, "time": "45m"}}
                }
            }
        }}),
    )]);
    let mut session = session_for("alice");
    let mut view = UsageView::new();

    assert_eq!(view.refresh(&backend.client(), &mut session), FetchOutcome::Updated);
    assert!(backend.next_request().url.starts_with("/metering"));
    assert_eq!(view.months(), vec!["September, 2026", "October, 2026"]);
    match view.listing() {
        UsageListing::Days(month) => assert_eq!(month.name, "October, 2026"),
        other => panic!("expected day list, got {other:?}"),
    }

    assert!(!view.select_day("1"));
    assert!(view.chart().is_none());

    assert!(view.select_day("2"));
    let chart = view.chart().unwrap();
    assert_eq!(chart.title, "Usage on October 2");
    assert_eq!(chart.points.len(), 48);
    assert_eq!(chart.labels[0], "12a");
    assert_eq!(chart.labels[1], "");
    assert_eq!(chart.labels[24], "12p");
    assert_eq!(chart.shares.unwrap()[0].user, "ALICE");

    assert!(view.select_month("September, 2026"));
    assert!(view.chart().is_none());
}

#[test]
fn usage_without_data_is_empty() {
    let backend = Backend::start(vec![(200, json!({"data": {}}))]);
    let mut session = session_for("alice");
    let mut view = UsageView::new();
    view.refresh(&backend.client(), &mut session);
    assert_eq!(view.listing(), UsageListing::Empty);
    assert_eq!(NO_USAGE_MESSAGE, "There is no usage data to display.");
}
