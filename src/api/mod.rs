/// HTTP client for the warehouse helper backend.
///
/// Wraps GET/POST calls made with the synchronous `ureq` client. Every call:
///
/// - sends the cached session token as the `Authorization` header,
/// - adds the client time as a `start_date` query parameter,
/// - on POST, also sends `Timestamp: <epoch ms>`.
///
/// Each reply then goes through [`classify`]:
///
/// | Outcome          | Result                                                    |
/// |------------------|-----------------------------------------------------------|
/// | transport error  | [`ApiError::Transport`] (status 500), also for a short body |
/// | `200`            | token + `userData` stored in the session, `body.data` out |
/// | `401`            | forced logout, [`ApiError::Unauthorized`]                 |
/// | `401`, not saved | [`ApiError::Storage`] when storage cannot be cleared      |
/// | `500`            | [`ApiError::Server`] with the body text                   |
/// | anything else    | [`ApiError::Unexpected`]                                  |
///
/// No call is retried.
use std::fmt;
use std::io::Read;
use std::time::Duration;

use chrono::{Local, Utc};
use serde_json::Value;

use crate::activity::ActivityLog;
use crate::config::schema::BackendConfig;
use crate::session::{LogoutReason, Session};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A request that did not produce data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The backend could not be reached.
    Transport(String),
    /// The backend answered 500.
    Server(String),
    /// The backend answered 401; the session has been logged out.
    Unauthorized(String),
    /// The backend answered with a status this client has no handling for.
    Unexpected { status: u16, message: String },
    /// The reply was fine but the session could not be written to storage.
    Storage(String),
}

impl ApiError {
    /// Status code this error is reported under.
    pub fn status(&self) -> u16 {
        match self {
            Self::Transport(_) | Self::Server(_) | Self::Storage(_) => 500,
            Self::Unauthorized(_) => 401,
            Self::Unexpected { status, .. } => *status,
        }
    }

    /// Human-readable text for an error banner.
    pub fn message(&self) -> &str {
        match self {
            Self::Transport(m) | Self::Server(m) | Self::Unauthorized(m) | Self::Storage(m) => m,
            Self::Unexpected { message, .. } => message,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(m) => write!(f, "backend unreachable: {m}"),
            Self::Server(m) => write!(f, "server error: {m}"),
            Self::Unauthorized(m) => write!(f, "unauthorized: {m}"),
            Self::Unexpected { status, message } => {
                write!(f, "unexpected status {status}: {message}")
            }
            Self::Storage(m) => write!(f, "session storage failed: {m}"),
        }
    }
}

impl std::error::Error for ApiError {}

// ---------------------------------------------------------------------------
// Raw response
// ---------------------------------------------------------------------------

/// A reply as read off the wire, before classification.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub status_text: String,
    /// Parsed JSON body; a non-JSON body is kept as a string, an empty one is
    /// `Null`.
    pub body: Value,
}

impl RawResponse {
    /// Read the whole body. A body that cannot be read in full is a transport
    /// failure, never an empty reply.
    fn read(resp: ureq::Response) -> Result<Self, String> {
        let status = resp.status();
        let status_text = resp.status_text().to_string();
        let mut text = String::new();
        resp.into_reader()
            .read_to_string(&mut text)
            .map_err(|e| format!("failed to read {status} response body: {e}"))?;
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };
        Ok(Self {
            status,
            status_text,
            body,
        })
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Turn a wire outcome into data or an [`ApiError`], updating the session.
pub fn classify(
    session: &mut Session,
    outcome: Result<RawResponse, String>,
) -> Result<Value, ApiError> {
    let response = outcome.map_err(ApiError::Transport)?;

    match response.status {
        200 => {
            session
                .adopt_reply(&response.body)
                .map_err(|e| ApiError::Storage(format!("{e:#}")))?;
            Ok(response.body.get("data").cloned().unwrap_or(Value::Null))
        }
        401 => {
            let message = data_message(&response.body)
                .unwrap_or(response.status_text.as_str())
                .to_string();
            let reason = LogoutReason::from_server_message(&message);
            match session.logout(Some(&reason)) {
                Ok(()) => Err(ApiError::Unauthorized(message)),
                Err(e) => Err(ApiError::Storage(format!(
                    "{message}; could not clear the stored session: {e:#}"
                ))),
            }
        }
        500 => Err(ApiError::Server(body_text(&response.body))),
        status => {
            let message = data_message(&response.body)
                .or_else(|| response.body.get("message").and_then(Value::as_str))
                .unwrap_or(response.status_text.as_str())
                .to_string();
            Err(ApiError::Unexpected { status, message })
        }
    }
}

/// `body.data.message`, when present.
fn data_message(body: &Value) -> Option<&str> {
    body.get("data")?.get("message")?.as_str()
}

/// Render a 500 body for display: a string verbatim, an object's `message`,
/// otherwise the JSON text.
fn body_text(body: &Value) -> String {
    match body {
        Value::String(s) => s.clone(),
        Value::Null => "internal server error".to_string(),
        other => other
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Synchronous backend client.
///
/// Holds no auth state of its own; every call borrows the [`Session`].
#[derive(Debug)]
pub struct ApiClient {
    base_url: String,
    agent: ureq::Agent,
    log: ActivityLog,
}

impl ApiClient {
    /// Build a client from the resolved `[backend]` section.
    pub fn from_config(config: &BackendConfig, log: ActivityLog) -> Self {
        let mut builder = ureq::AgentBuilder::new();
        if config.timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(config.timeout_secs));
        }
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            agent: builder.build(),
            log,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn log(&self) -> &ActivityLog {
        &self.log
    }

    /// `GET base_url + path` with the given query parameters.
    pub fn get(
        &self,
        session: &mut Session,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Value, ApiError> {
        let request = self.prepare("GET", path, session, query);
        let outcome = finish(request.call());
        self.settle("GET", path, session, outcome)
    }

    /// `POST base_url + path` with a JSON payload.
    pub fn post(
        &self,
        session: &mut Session,
        path: &str,
        query: &[(&str, String)],
        payload: &Value,
    ) -> Result<Value, ApiError> {
        let request = self
            .prepare("POST", path, session, query)
            .set("Timestamp", &Utc::now().timestamp_millis().to_string());
        let outcome = finish(request.send_json(payload));
        self.settle("POST", path, session, outcome)
    }

    fn prepare(
        &self,
        method: &str,
        path: &str,
        session: &Session,
        query: &[(&str, String)],
    ) -> ureq::Request {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let mut request = self
            .agent
            .request(method, &url)
            .set("Content-Type", "application/json")
            .query("start_date", &Local::now().to_rfc3339());

        if let Some(token) = session.token() {
            request = request.set("Authorization", token);
        }
        for (key, value) in query {
            request = request.query(key, value);
        }
        request
    }

    /// Log the wire outcome, classify it, and log a session storage failure.
    fn settle(
        &self,
        method: &str,
        path: &str,
        session: &mut Session,
        outcome: Result<RawResponse, String>,
    ) -> Result<Value, ApiError> {
        match &outcome {
            Ok(resp) => self
                .log
                .record(&format!("{method} {path} status={}", resp.status)),
            Err(e) => self
                .log
                .record(&format!("{method} {path} transport-error={e}")),
        }
        let result = classify(session, outcome);
        if let Err(ApiError::Storage(reason)) = &result {
            self.log
                .record(&format!("{method} {path} storage-error={reason}"));
        }
        result
    }
}

/// Collapse ureq's split between 2xx and error statuses into one response.
fn finish(result: Result<ureq::Response, ureq::Error>) -> Result<RawResponse, String> {
    match result {
        Ok(resp) | Err(ureq::Error::Status(_, resp)) => RawResponse::read(resp),
        Err(ureq::Error::Transport(transport)) => Err(transport.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::session::{
        KEY_AUTH_TOKEN, KEY_IS_AUTH, MemoryStorage, SESSION_EXPIRED_MESSAGE, Storage,
    };

    fn reply(status: u16, status_text: &str, body: Value) -> Result<RawResponse, String> {
        Ok(RawResponse {
            status,
            status_text: status_text.to_string(),
            body,
        })
    }

    fn signed_in() -> Session {
        Session::restore(Box::new(MemoryStorage::with_entries([
            (KEY_IS_AUTH, "yes"),
            (KEY_AUTH_TOKEN, "old"),
        ])))
    }

    #[test]
    fn ok_reply_yields_data_and_rotates_token() {
        let mut session = signed_in();
        let data = classify(
            &mut session,
            reply(200, "OK", json!({"auth_token": "new", "data": [1, 2]})),
        )
        .unwrap();
        assert_eq!(data, json!([1, 2]));
        assert_eq!(session.token(), Some("new"));
    }

    #[test]
    fn unauthorized_prefers_data_message() {
        let mut session = signed_in();
        let err = classify(
            &mut session,
            reply(
                401,
                "UNAUTHORIZED",
                json!({"data": {"message": "authorization token expired"}}),
            ),
        )
        .unwrap_err();
        assert_eq!(err, ApiError::Unauthorized("authorization token expired".into()));
        assert_eq!(err.status(), 401);
        assert!(!session.is_authenticated());
        assert!(session.storage().is_empty());
        assert_eq!(session.message(), Some(SESSION_EXPIRED_MESSAGE));
    }

    #[test]
    fn unauthorized_falls_back_to_status_text() {
        let mut session = signed_in();
        let err = classify(&mut session, reply(401, "UNAUTHORIZED", json!({}))).unwrap_err();
        assert_eq!(err.message(), "UNAUTHORIZED");
        assert_eq!(session.message(), None);
    }

    #[test]
    fn server_error_keeps_body_text() {
        let mut session = signed_in();
        let err = classify(
            &mut session,
            reply(500, "INTERNAL SERVER ERROR", json!({"message": "warehouse suspended"})),
        )
        .unwrap_err();
        assert_eq!(err, ApiError::Server("warehouse suspended".into()));
        assert!(session.is_authenticated());

        let err = classify(&mut session, reply(500, "", json!("boom"))).unwrap_err();
        assert_eq!(err.message(), "boom");
    }

    #[test]
    fn transport_error_reports_500() {
        let mut session = signed_in();
        let err = classify(&mut session, Err("connection refused".into())).unwrap_err();
        assert_eq!(err.status(), 500);
        assert_eq!(err.message(), "connection refused");
    }

    #[test]
    fn unknown_status_is_surfaced() {
        let mut session = signed_in();
        let err = classify(
            &mut session,
            reply(403, "FORBIDDEN", json!({"message": "not yours"})),
        )
        .unwrap_err();
        assert_eq!(
            err,
            ApiError::Unexpected {
                status: 403,
                message: "not yours".into()
            }
        );
        assert!(session.is_authenticated());
    }

    /// Storage that keeps its values but refuses to be cleared.
    struct StuckStorage(MemoryStorage);

    impl Storage for StuckStorage {
        fn get(&self, key: &str) -> Option<String> {
            self.0.get(key)
        }

        fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
            self.0.set(key, value)
        }

        fn clear(&mut self) -> anyhow::Result<()> {
            anyhow::bail!("read-only file system")
        }

        fn entries(&self) -> Vec<(String, String)> {
            self.0.entries()
        }
    }

    #[test]
    fn unauthorized_reports_a_session_that_could_not_be_cleared() {
        let storage = StuckStorage(MemoryStorage::with_entries([
            (KEY_IS_AUTH, "yes"),
            (KEY_AUTH_TOKEN, "t"),
        ]));
        let mut session = Session::restore(Box::new(storage));

        let err = classify(
            &mut session,
            reply(401, "UNAUTHORIZED", json!({"data": {"message": "authorization token expired"}})),
        )
        .unwrap_err();

        assert!(matches!(err, ApiError::Storage(_)));
        assert!(err.message().starts_with("authorization token expired"));
        assert!(err.message().contains("read-only file system"));
        assert!(!session.is_authenticated());
        assert_eq!(session.message(), Some(SESSION_EXPIRED_MESSAGE));
    }

    #[test]
    fn client_strips_trailing_slash() {
        let config = BackendConfig {
            base_url: "http://localhost:5000/".to_string(),
            timeout_secs: 0,
        };
        let client = ApiClient::from_config(&config, ActivityLog::disabled());
        assert_eq!(client.base_url(), "http://localhost:5000");
    }
}
