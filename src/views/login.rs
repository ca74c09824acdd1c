//! Login screen.

use anyhow::Result;

use crate::api::ApiClient;
use crate::guard::{self, Route};
use crate::session::Session;

/// Credentials as typed by the user.
#[derive(Clone)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    pub account: String,
}

impl std::fmt::Debug for LoginForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginForm")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("account", &self.account)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginResult {
    /// Signed in; show this route next.
    SignedIn(Route),
    /// The backend said no; banner text.
    Rejected(String),
}

/// The login screen, remembering which protected route sent the user here.
#[derive(Debug, Clone, Default)]
pub struct LoginView {
    from: Option<Route>,
}

impl LoginView {
    pub fn new(from: Option<Route>) -> Self {
        Self { from }
    }

    pub fn from(&self) -> Option<Route> {
        self.from
    }

    /// Banner to show above the form (e.g. after an expired session).
    pub fn banner<'a>(&self, session: &'a Session) -> Option<&'a str> {
        session.message()
    }

    pub fn submit(
        &self,
        client: &ApiClient,
        session: &mut Session,
        form: &LoginForm,
        landing: Route,
    ) -> Result<LoginResult> {
        let ok = session.authenticate(client, &form.username, &form.password, &form.account)?;
        if ok {
            Ok(LoginResult::SignedIn(guard::after_login(self.from, landing)))
        } else {
            Ok(LoginResult::Rejected(
                session.message().unwrap_or("Login failed.").to_string(),
            ))
        }
    }
}
