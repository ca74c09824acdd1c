//! Client-side authentication state.
//!
//! A [`Session`] holds the authenticated flag, the bearer token handed out by
//! the backend, the signed-in user and a pending user-facing message. It is
//! restored from durable [`Storage`] at startup and written back on every
//! change, so a signed-in user stays signed in across runs.
//!
//! The flag is the only gate the client checks. It can go stale when the
//! backend expires a token; the next request then comes back 401 and the API
//! client forces a [`Session::logout`].
//!
//! State transitions:
//!
//! ```text
//! unauthenticated --authenticate(ok)--> authenticated
//! authenticated   --logout(_)---------> unauthenticated
//! authenticated   --any 401-----------> unauthenticated
//! ```

pub mod storage;

use std::fmt;

use anyhow::Result;
use serde_json::{Value, json};

use crate::api::{ApiClient, ApiError};

pub use storage::{FileStorage, MemoryStorage, Storage};

/// Persisted flag; holds `"yes"` while signed in.
pub const KEY_IS_AUTH: &str = "isAuth";
/// Persisted bearer token.
pub const KEY_AUTH_TOKEN: &str = "auth_token";
/// Persisted signed-in username.
pub const KEY_CURRENT_USER: &str = "currentUser";

/// Server text that means the token ran out.
const TOKEN_EXPIRED_TEXT: &str = "authorization token expired";

/// Message shown on the login screen after an expired token.
pub const SESSION_EXPIRED_MESSAGE: &str = "Session expired. Please login again.";

// ---------------------------------------------------------------------------
// Logout reason
// ---------------------------------------------------------------------------

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogoutReason {
    /// The user asked to sign out.
    UserInitiated,
    /// The backend rejected the token as expired.
    TokenExpired,
    /// The backend rejected the request for some other reason.
    ServerForced(String),
}

impl LogoutReason {
    /// Map a 401 message from the backend to a reason.
    ///
    /// Only the exact text `authorization token expired` counts as expiry.
    pub fn from_server_message(message: &str) -> Self {
        if message == TOKEN_EXPIRED_TEXT {
            Self::TokenExpired
        } else {
            Self::ServerForced(message.to_string())
        }
    }

    /// Banner to show on the login screen, if any.
    pub fn user_message(&self) -> Option<&'static str> {
        match self {
            Self::TokenExpired => Some(SESSION_EXPIRED_MESSAGE),
            Self::UserInitiated | Self::ServerForced(_) => None,
        }
    }
}

impl fmt::Display for LogoutReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UserInitiated => write!(f, "user"),
            Self::TokenExpired => write!(f, "token-expired"),
            Self::ServerForced(message) => write!(f, "server ({message})"),
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Authentication state shared by every view.
///
/// Owned by the application shell and lent out by `&mut` to whatever issues
/// requests.
pub struct Session {
    storage: Box<dyn Storage>,
    authenticated: bool,
    token: Option<String>,
    current_user: Option<String>,
    message: Option<String>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("authenticated", &self.authenticated)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("current_user", &self.current_user)
            .field("message", &self.message)
            .finish()
    }
}

impl Session {
    /// Rebuild a session from whatever the storage holds.
    pub fn restore(storage: Box<dyn Storage>) -> Self {
        let authenticated = storage.get(KEY_IS_AUTH).as_deref() == Some("yes");
        let token = storage.get(KEY_AUTH_TOKEN);
        let current_user = storage.get(KEY_CURRENT_USER);
        Self {
            storage,
            authenticated,
            token,
            current_user,
            message: None,
        }
    }

    /// Fresh signed-out session over in-memory storage.
    pub fn in_memory() -> Self {
        Self::restore(Box::new(MemoryStorage::new()))
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn current_user(&self) -> Option<&str> {
        self.current_user.as_deref()
    }

    /// Pending banner for the login screen.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn storage(&self) -> &dyn Storage {
        self.storage.as_ref()
    }

    /// End the session locally.
    ///
    /// Clears every persisted key. Only [`LogoutReason::TokenExpired`] sets a
    /// banner; any other reason, or none, leaves the current message as is.
    pub fn logout(&mut self, reason: Option<&LogoutReason>) -> Result<()> {
        self.authenticated = false;
        self.token = None;
        self.current_user = None;
        if let Some(text) = reason.and_then(LogoutReason::user_message) {
            self.message = Some(text.to_string());
        }
        self.storage.clear()
    }

    /// Adopt the token and profile fields from a successful (200) reply.
    ///
    /// `auth_token` replaces the cached token. Every `userData` entry is copied
    /// into storage; a `currentUser` entry also becomes the signed-in user.
    pub fn adopt_reply(&mut self, body: &Value) -> Result<()> {
        if let Some(token) = body.get("auth_token").and_then(Value::as_str) {
            self.storage.set(KEY_AUTH_TOKEN, token)?;
            self.token = Some(token.to_string());
        }

        if let Some(user_data) = body.get("userData").and_then(Value::as_object) {
            for (key, value) in user_data {
                let text = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                self.storage.set(key, &text)?;
                if key == KEY_CURRENT_USER {
                    self.current_user = Some(text);
                }
            }
        }

        Ok(())
    }

    /// Sign in against `POST /login`.
    ///
    /// Returns whether the session is now authenticated. A rejected login
    /// leaves the reason in [`Session::message`]. Only local storage failures
    /// surface as `Err`.
    pub fn authenticate(
        &mut self,
        client: &ApiClient,
        username: &str,
        password: &str,
        account: &str,
    ) -> Result<bool> {
        let payload = json!({
            "username": username,
            "password": password,
            "account": account,
        });

        match client.post(self, "/login", &[], &payload) {
            Ok(_) => {
                self.authenticated = true;
                self.storage.set(KEY_IS_AUTH, "yes")?;
                if self.current_user.is_none() {
                    self.storage.set(KEY_CURRENT_USER, username)?;
                    self.current_user = Some(username.to_string());
                }
                self.message = None;
                client
                    .log()
                    .record(&format!("login ok user={username} account={account}"));
                Ok(true)
            }
            Err(ApiError::Storage(reason)) => anyhow::bail!("failed to store session: {reason}"),
            Err(error) => {
                self.authenticated = false;
                self.message = Some(error.message().to_string());
                client.log().record(&format!(
                    "login failed user={username} status={} {}",
                    error.status(),
                    error.message()
                ));
                Ok(false)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
