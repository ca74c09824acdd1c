//! Application shell.
//!
//! Owns the resolved config, the [`Session`] and the [`ApiClient`], and lends
//! them to the screens. Navigation always re-runs the route guard.

use anyhow::Result;

use crate::activity::ActivityLog;
use crate::api::ApiClient;
use crate::config::DashConfig;
use crate::config::schema::expand_home;
use crate::guard::{self, RenderDecision, Route};
use crate::session::{FileStorage, LogoutReason, MemoryStorage, Session, Storage};
use crate::views::queries::{Interval, QueriesView};
use crate::views::usage::UsageView;

pub struct Shell {
    config: DashConfig,
    session: Session,
    client: ApiClient,
}

impl Shell {
    /// Build the shell from config, restoring the persisted session.
    pub fn from_config(config: DashConfig) -> Self {
        let log = ActivityLog::from_config(&config.logging);
        let storage: Box<dyn Storage> = match expand_home(&config.storage.path) {
            Some(path) => Box::new(FileStorage::open(path)),
            None => Box::new(MemoryStorage::new()),
        };
        let client = ApiClient::from_config(&config.backend, log);
        Self::new(config, Session::restore(storage), client)
    }

    pub fn new(config: DashConfig, session: Session, client: ApiClient) -> Self {
        Self {
            config,
            session,
            client,
        }
    }

    pub fn config(&self) -> &DashConfig {
        &self.config
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Client and session together, for controller calls.
    pub fn parts(&mut self) -> (&ApiClient, &mut Session) {
        (&self.client, &mut self.session)
    }

    /// Configured landing route; falls back to `/usage` if the setting does not
    /// name a protected route.
    pub fn landing(&self) -> Route {
        Route::parse(&self.config.views.landing)
            .filter(|r| r.is_protected())
            .unwrap_or(Route::Usage)
    }

    /// Run the guard for `path` against the current session.
    pub fn navigate(&self, path: &str) -> RenderDecision {
        let decision = guard::decide(&self.session, path, self.landing());
        self.client
            .log()
            .record(&format!("navigate {path} -> {decision}"));
        decision
    }

    pub fn queries_view(&self) -> QueriesView {
        let interval = Interval::from_minutes(self.config.views.default_interval_minutes)
            .unwrap_or_default();
        QueriesView::new(interval, self.config.access.privileged_account.clone())
    }

    pub fn usage_view(&self) -> UsageView {
        UsageView::new()
    }

    /// Sign out at the user's request.
    pub fn logout(&mut self) -> Result<()> {
        let reason = LogoutReason::UserInitiated;
        self.session.logout(Some(&reason))?;
        self.client.log().record(&format!("logout reason={reason}"));
        Ok(())
    }
}
