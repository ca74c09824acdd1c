//! View controllers.
//!
//! A controller fetches through the [`ApiClient`](crate::api::ApiClient),
//! turns the JSON into rows, and tracks what the screen should show in a
//! [`ViewState`]. Rendering lives in the CLI.
//!
//! Fetches are ticketed. [`FetchGate::begin`] refuses a second fetch while one
//! is outstanding, and [`FetchGate::accept`] drops completions carrying an old
//! ticket so stale data never overwrites newer state.

pub mod login;
pub mod queries;
pub mod usage;

use crate::api::ApiError;

/// What a data screen currently shows.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewState<T> {
    Loading,
    /// Error banner text.
    Error(String),
    Ready(T),
}

impl<T> Default for ViewState<T> {
    fn default() -> Self {
        Self::Loading
    }
}

impl<T> ViewState<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            Self::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub fn ready_mut(&mut self) -> Option<&mut T> {
        match self {
            Self::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Error(message) => Some(message),
            _ => None,
        }
    }
}

/// How a controller action ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// State updated with fresh data.
    Updated,
    /// State now holds an error banner.
    Failed,
    /// The session was signed out by a 401; the caller should go to login.
    RedirectToLogin,
    /// Another fetch was already running; nothing happened.
    Busy,
    /// The action is not allowed for this user or row.
    Refused,
    /// The completion belonged to an older fetch and was dropped.
    Stale,
}

/// Identifies one in-flight fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket(u64);

/// Re-entrancy guard shared by the controllers.
#[derive(Debug, Default)]
pub struct FetchGate {
    generation: u64,
    in_flight: Option<u64>,
}

impl FetchGate {
    /// Start a fetch, or `None` if one is already outstanding.
    pub fn begin(&mut self) -> Option<FetchTicket> {
        if self.in_flight.is_some() {
            return None;
        }
        self.generation += 1;
        self.in_flight = Some(self.generation);
        Some(FetchTicket(self.generation))
    }

    /// Finish a fetch. Returns `false` unless `ticket` is the one in flight,
    /// so a late or repeated completion is dropped.
    pub fn accept(&mut self, ticket: FetchTicket) -> bool {
        if self.in_flight != Some(ticket.0) {
            return false;
        }
        self.in_flight = None;
        true
    }
}

/// Map a failed request onto view state.
///
/// A 401 has already signed the session out, so the screen goes back to
/// loading and the caller redirects. Anything else becomes an error banner.
pub(crate) fn apply_error<T>(state: &mut ViewState<T>, error: &ApiError) -> FetchOutcome {
    if error.is_unauthorized() {
        *state = ViewState::Loading;
        FetchOutcome::RedirectToLogin
    } else {
        *state = ViewState::Error(error.message().to_string());
        FetchOutcome::Failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_refuses_overlap_and_drops_stale() {
        let mut gate = FetchGate::default();
        let first = gate.begin().unwrap();
        assert!(gate.begin().is_none());
        assert!(gate.accept(first));
        assert!(!gate.accept(first));

        let second = gate.begin().unwrap();
        assert_ne!(first, second);
        assert!(!gate.accept(first));
        assert!(gate.accept(second));
        assert!(gate.begin().is_some());
    }

    #[test]
    fn unauthorized_error_redirects() {
        let mut state: ViewState<()> = ViewState::Ready(());
        let outcome = apply_error(&mut state, &ApiError::Unauthorized("nope".into()));
        assert_eq!(outcome, FetchOutcome::RedirectToLogin);
        assert!(state.is_loading());

        let outcome = apply_error(&mut state, &ApiError::Server("down".into()));
        assert_eq!(outcome, FetchOutcome::Failed);
        assert_eq!(state.error(), Some("down"));
    }
}
