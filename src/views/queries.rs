//! Queries screen: recent warehouse queries and the stop action.
//!
//! Rows come from `GET /queries?numMinutes=N`. Changing the interval is a
//! local selection only; nothing is fetched until the user refreshes.

use std::fmt;

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone};
use serde_json::{Value, json};

use super::{FetchGate, FetchOutcome, FetchTicket, ViewState, apply_error};
use crate::api::{ApiClient, ApiError};
use crate::session::Session;

/// Stop reply text meaning the query had already finished.
const NOT_EXECUTING: &str = "Identified SQL statement is not currently executing.";

/// Notice shown when the selected interval differs from the fetched one.
pub const INTERVAL_CHANGED_NOTICE: &str = "Press Refresh to see queries within a different interval.";

// ---------------------------------------------------------------------------
// Interval
// ---------------------------------------------------------------------------

const INTERVALS: [(u32, &str); 8] = [
    (15, "15 minutes"),
    (30, "30 minutes"),
    (60, "1 hour"),
    (120, "2 hours"),
    (240, "4 hours"),
    (480, "8 hours"),
    (720, "12 hours"),
    (1440, "24 hours"),
];

/// Look-back window for the query list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval(u32);

impl Interval {
    pub const DEFAULT: Interval = Interval(30);

    /// Only the selector values are valid.
    pub fn from_minutes(minutes: u32) -> Option<Self> {
        INTERVALS
            .iter()
            .any(|(m, _)| *m == minutes)
            .then_some(Self(minutes))
    }

    pub fn minutes(self) -> u32 {
        self.0
    }

    pub fn label(self) -> &'static str {
        INTERVALS
            .iter()
            .find(|(m, _)| *m == self.0)
            .map(|(_, label)| *label)
            .unwrap_or("30 minutes")
    }

    pub fn all() -> impl Iterator<Item = Interval> {
        INTERVALS.iter().map(|(m, _)| Interval(*m))
    }
}

impl Default for Interval {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Execution status
// ---------------------------------------------------------------------------

/// Display color family for a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Red,
    Blue,
    Green,
    Neutral,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionStatus {
    Blocked,
    FailedWithError,
    FailedWithIncident,
    Queued,
    ResumingWarehouse,
    Running,
    Success,
    /// Anything the backend sends that is not listed above.
    Other(String),
}

impl ExecutionStatus {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "BLOCKED" => Self::Blocked,
            "FAILED_WITH_ERROR" => Self::FailedWithError,
            "FAILED_WITH_INCIDENT" => Self::FailedWithIncident,
            "QUEUED" => Self::Queued,
            "RESUMING_WAREHOUSE" => Self::ResumingWarehouse,
            "RUNNING" => Self::Running,
            "SUCCESS" => Self::Success,
            other => Self::Other(other.to_string()),
        }
    }

    /// Wire name.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Blocked => "BLOCKED",
            Self::FailedWithError => "FAILED_WITH_ERROR",
            Self::FailedWithIncident => "FAILED_WITH_INCIDENT",
            Self::Queued => "QUEUED",
            Self::ResumingWarehouse => "RESUMING_WAREHOUSE",
            Self::Running => "RUNNING",
            Self::Success => "SUCCESS",
            Self::Other(raw) => raw,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Blocked => "Blocked",
            Self::FailedWithError | Self::FailedWithIncident => "Failed",
            Self::Queued => "Queued",
            Self::ResumingWarehouse => "Resuming Warehouse",
            Self::Running => "Running",
            Self::Success => "Success",
            Self::Other(raw) => raw,
        }
    }

    pub fn tone(&self) -> Tone {
        match self {
            Self::Blocked | Self::FailedWithError | Self::FailedWithIncident => Tone::Red,
            Self::Queued | Self::ResumingWarehouse | Self::Running => Tone::Blue,
            Self::Success => Tone::Green,
            Self::Other(_) => Tone::Neutral,
        }
    }
}

// ---------------------------------------------------------------------------
// Query row
// ---------------------------------------------------------------------------

/// One row of the query list.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub id: String,
    pub status: ExecutionStatus,
    pub sql_text: String,
    pub username: String,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    /// Already formatted for display.
    pub start_time: String,
    pub end_time: String,
    pub elapsed_time: String,
}

impl Query {
    /// Build a row from one element of the `/queries` list.
    pub fn from_row(row: &Value, now: DateTime<Local>) -> Self {
        Self {
            id: text(row, "QUERY_ID"),
            status: ExecutionStatus::parse(&text(row, "EXECUTION_STATUS")),
            sql_text: text(row, "QUERY_TEXT"),
            username: text(row, "USER_NAME"),
            error_code: optional_text(row, "ERROR_CODE"),
            error_message: optional_text(row, "ERROR_MESSAGE"),
            start_time: display_time(row.get("START_TIME"), now),
            end_time: display_time(row.get("END_TIME"), now),
            elapsed_time: text(row, "TOTAL_ELAPSED_TIME"),
        }
    }

    /// Status line, spelling out the error for `FAILED_WITH_ERROR`.
    pub fn status_description(&self) -> String {
        match self.status {
            ExecutionStatus::FailedWithError => format!(
                "Failed with Error Code {}: {}",
                self.error_code.as_deref().unwrap_or(""),
                self.error_message.as_deref().unwrap_or("")
            ),
            _ => self.status.label().to_string(),
        }
    }

    /// JSON shape used by `--format json`.
    pub fn to_json(&self) -> Value {
        json!({
            "id": self.id,
            "status": self.status.as_str(),
            "sql_text": self.sql_text,
            "username": self.username,
            "error_code": self.error_code,
            "error_message": self.error_message,
            "start_time": self.start_time,
            "end_time": self.end_time,
            "elapsed_time": self.elapsed_time,
        })
    }

    /// Fold a `/queries/stop` reply into the row.
    fn apply_stop_reply(&mut self, reply: &Value, now: DateTime<Local>) {
        if let Some(status) = reply.get("status").and_then(Value::as_str) {
            self.status = ExecutionStatus::parse(status);
        }
        if reply.get("message").and_then(Value::as_str) == Some(NOT_EXECUTING) {
            return;
        }
        self.error_message = optional_text(reply, "error_message");
        self.error_code = optional_text(reply, "error_code");
        self.start_time = display_time(reply.get("start_time"), now);
        self.end_time = display_time(reply.get("end_time"), now);
    }
}

/// Whether `user` may stop `query`.
///
/// The privileged account may stop anyone's query, everyone else only their
/// own, and only while it is running. Names compare case-insensitively: the
/// warehouse reports `USER_NAME` upper-cased while the stored user may be the
/// name as typed at login.
pub fn can_stop(query: &Query, user: Option<&str>, privileged_account: &str) -> bool {
    let Some(user) = user else {
        return false;
    };
    (user.eq_ignore_ascii_case(privileged_account) || query.username.eq_ignore_ascii_case(user))
        && query.status == ExecutionStatus::Running
}

fn text(row: &Value, key: &str) -> String {
    optional_text(row, key).unwrap_or_default()
}

fn optional_text(row: &Value, key: &str) -> Option<String> {
    match row.get(key)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Time formatting
// ---------------------------------------------------------------------------

/// Parse a backend timestamp: epoch milliseconds, RFC 3339, RFC 2822 (HTTP
/// date style) or `YYYY-MM-DD HH:MM:SS[.fff]` in local time.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Local>> {
    match value {
        Value::Number(n) => Local.timestamp_millis_opt(n.as_f64()? as i64).single(),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Local));
            }
            if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
                return Some(dt.with_timezone(&Local));
            }
            NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
                .ok()
                .and_then(|naive| Local.from_local_datetime(&naive).single())
        }
        _ => None,
    }
}

/// `h:mm:ss AM` for today, `M/D/YYYY h:mm:ss AM` otherwise.
pub fn format_date_time(time: DateTime<Local>, today: NaiveDate) -> String {
    let clock = time.format("%-I:%M:%S %p").to_string();
    if time.date_naive() == today {
        clock
    } else {
        format!("{} {}", time.format("%-m/%-d/%Y"), clock)
    }
}

fn display_time(value: Option<&Value>, now: DateTime<Local>) -> String {
    value
        .and_then(parse_timestamp)
        .map(|t| format_date_time(t, now.date_naive()))
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// What the list area should show.
#[derive(Debug, Clone, PartialEq)]
pub enum Listing<'a> {
    Loading,
    Error(&'a str),
    Empty(String),
    IntervalChanged,
    Rows(&'a [Query]),
}

/// State and actions of the Queries screen.
#[derive(Debug)]
pub struct QueriesView {
    selected: Interval,
    queried: Interval,
    state: ViewState<Vec<Query>>,
    gate: FetchGate,
    privileged_account: String,
}

impl QueriesView {
    pub fn new(interval: Interval, privileged_account: impl Into<String>) -> Self {
        Self {
            selected: interval,
            queried: interval,
            state: ViewState::Loading,
            gate: FetchGate::default(),
            privileged_account: privileged_account.into(),
        }
    }

    pub fn selected_interval(&self) -> Interval {
        self.selected
    }

    pub fn queried_interval(&self) -> Interval {
        self.queried
    }

    pub fn state(&self) -> &ViewState<Vec<Query>> {
        &self.state
    }

    pub fn privileged_account(&self) -> &str {
        &self.privileged_account
    }

    /// Change the selector. Does not fetch.
    pub fn select_interval(&mut self, interval: Interval) {
        self.selected = interval;
    }

    /// Fetch the list for the selected interval.
    pub fn refresh(&mut self, client: &ApiClient, session: &mut Session) -> FetchOutcome {
        let Some(ticket) = self.begin_refresh() else {
            return FetchOutcome::Busy;
        };
        let query = [("numMinutes", self.queried.minutes().to_string())];
        let result = client.get(session, "/queries", &query);
        self.complete_refresh(ticket, result, Local::now())
    }

    /// First half of [`refresh`](Self::refresh): show the loader and pin the
    /// interval being fetched.
    pub fn begin_refresh(&mut self) -> Option<FetchTicket> {
        let ticket = self.gate.begin()?;
        self.queried = self.selected;
        self.state = ViewState::Loading;
        Some(ticket)
    }

    /// Second half of [`refresh`](Self::refresh): replace the rows wholesale.
    pub fn complete_refresh(
        &mut self,
        ticket: FetchTicket,
        result: Result<Value, ApiError>,
        now: DateTime<Local>,
    ) -> FetchOutcome {
        if !self.gate.accept(ticket) {
            return FetchOutcome::Stale;
        }

        match result {
            Ok(data) => {
                let rows = data
                    .as_array()
                    .map(|rows| rows.iter().map(|row| Query::from_row(row, now)).collect())
                    .unwrap_or_default();
                self.state = ViewState::Ready(rows);
                FetchOutcome::Updated
            }
            Err(error) => apply_error(&mut self.state, &error),
        }
    }

    /// Whether the signed-in user may stop `query`.
    pub fn can_stop(&self, query: &Query, session: &Session) -> bool {
        can_stop(query, session.current_user(), &self.privileged_account)
    }

    pub fn find(&self, id: &str) -> Option<&Query> {
        self.state.ready()?.iter().find(|q| q.id == id)
    }

    /// Ask the backend to stop a query and fold the reply into its row.
    ///
    /// Refused unless the row is loaded and the user may stop it.
    pub fn stop(&mut self, client: &ApiClient, session: &mut Session, id: &str) -> FetchOutcome {
        let allowed = self.find(id).is_some_and(|q| self.can_stop(q, session));
        if !allowed {
            return FetchOutcome::Refused;
        }
        let Some(ticket) = self.gate.begin() else {
            return FetchOutcome::Busy;
        };

        let result = client.post(session, "/queries/stop", &[], &json!({ "id": id }));
        client.log().record(&format!(
            "stop query id={id} user={} ok={}",
            session.current_user().unwrap_or("-"),
            result.is_ok()
        ));
        self.complete_stop(ticket, id, result, Local::now())
    }

    /// Apply a stop reply to every row with `id`.
    pub fn complete_stop(
        &mut self,
        ticket: FetchTicket,
        id: &str,
        result: Result<Value, ApiError>,
        now: DateTime<Local>,
    ) -> FetchOutcome {
        if !self.gate.accept(ticket) {
            return FetchOutcome::Stale;
        }

        match result {
            Ok(reply) => {
                if let Some(rows) = self.state.ready_mut() {
                    for row in rows.iter_mut().filter(|q| q.id == id) {
                        row.apply_stop_reply(&reply, now);
                    }
                }
                FetchOutcome::Updated
            }
            Err(error) => apply_error(&mut self.state, &error),
        }
    }

    /// What to draw in the list area.
    ///
    /// The empty check comes before the interval check and uses the selected
    /// interval's label.
    pub fn listing(&self) -> Listing<'_> {
        match &self.state {
            ViewState::Loading => Listing::Loading,
            ViewState::Error(message) => Listing::Error(message),
            ViewState::Ready(rows) if rows.is_empty() => Listing::Empty(format!(
                "There are no queries from the past {}.",
                self.selected.label()
            )),
            ViewState::Ready(_) if self.selected != self.queried => Listing::IntervalChanged,
            ViewState::Ready(rows) => Listing::Rows(rows),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
