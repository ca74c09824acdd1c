//! Route guard.
//!
//! Every navigation goes through [`decide`]. The guard looks only at the
//! session's authenticated flag, never at token validity, and it is
//! re-evaluated on each navigation because a background 401 can sign the
//! session out between two of them.

use std::fmt;

use crate::session::Session;

pub const LOGIN_PATH: &str = "/login";
pub const QUERIES_PATH: &str = "/queries";
pub const USAGE_PATH: &str = "/usage";

// ---------------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------------

/// A screen the dashboard can show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Login,
    Queries,
    Usage,
}

impl Route {
    /// Parse a path, ignoring any query string and trailing slash.
    pub fn parse(path: &str) -> Option<Self> {
        let path = path.split('?').next().unwrap_or(path);
        let path = match path.trim_end_matches('/') {
            "" => "/",
            p => p,
        };
        match path {
            LOGIN_PATH => Some(Self::Login),
            QUERIES_PATH => Some(Self::Queries),
            USAGE_PATH => Some(Self::Usage),
            _ => None,
        }
    }

    pub fn path(self) -> &'static str {
        match self {
            Self::Login => LOGIN_PATH,
            Self::Queries => QUERIES_PATH,
            Self::Usage => USAGE_PATH,
        }
    }

    /// Whether the route needs a signed-in session.
    pub fn is_protected(self) -> bool {
        !matches!(self, Self::Login)
    }

    /// Navigation entries shown to a signed-in user.
    pub fn nav_entries() -> [Self; 2] {
        [Self::Queries, Self::Usage]
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::Login => "Login",
            Self::Queries => "Queries",
            Self::Usage => "Usage",
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

// ---------------------------------------------------------------------------
// Decisions
// ---------------------------------------------------------------------------

/// Outcome of a navigation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderDecision {
    /// Show the requested screen.
    Allow(Route),
    /// Go elsewhere. `from` remembers the screen originally asked for.
    RedirectTo { target: Route, from: Option<Route> },
    /// Nothing lives at that path.
    NotFound(String),
}

impl fmt::Display for RenderDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allow(route) => write!(f, "allow {route}"),
            Self::RedirectTo {
                target,
                from: Some(from),
            } => write!(f, "redirect {target} (from {from})"),
            Self::RedirectTo { target, from: None } => write!(f, "redirect {target}"),
            Self::NotFound(path) => write!(f, "not found {path}"),
        }
    }
}

/// Decide what to render for `requested`.
///
/// - protected route while signed out → `/login`, remembering the request;
/// - `/login` while signed in → `landing`;
/// - otherwise the requested route.
pub fn decide(session: &Session, requested: &str, landing: Route) -> RenderDecision {
    let Some(route) = Route::parse(requested) else {
        return RenderDecision::NotFound(requested.to_string());
    };

    match (route.is_protected(), session.is_authenticated()) {
        (true, false) => RenderDecision::RedirectTo {
            target: Route::Login,
            from: Some(route),
        },
        (false, true) => RenderDecision::RedirectTo {
            target: landing,
            from: Some(route),
        },
        _ => RenderDecision::Allow(route),
    }
}

/// Where to go right after a successful login.
///
/// Returns to the screen that triggered the login if it was a protected one,
/// otherwise the landing view.
pub fn after_login(from: Option<Route>, landing: Route) -> Route {
    match from {
        Some(route) if route.is_protected() => route,
        _ => landing,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
