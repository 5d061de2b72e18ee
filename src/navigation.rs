//! Navigation policy around authentication state.
//!
//! The client never navigates on its own. After an unrecoverable refresh it
//! calls the [`AuthFailureHook`] it was given, if any. [`LoginRedirect`] is
//! the usual hook; [`guard_route`] is the check a front end runs before
//! showing a view.

use tracing::{debug, info};

pub const LOGIN_PATH: &str = "/login";
pub const HOME_PATH: &str = "/";

/// Views reachable without a session.
pub const PUBLIC_PATHS: [&str; 2] = ["/login", "/register"];

/// Prefixes never guarded: backend calls and static assets.
const UNGUARDED_PREFIXES: [&str; 4] = ["/api", "/_next/static", "/_next/image", "/favicon.ico"];

/// Called once the session has been cleared after a failed refresh.
pub trait AuthFailureHook: Send + Sync {
    fn on_auth_failure(&self);
}

/// Whatever the application uses to move between views.
pub trait Navigator: Send + Sync {
    fn current_path(&self) -> String;
    fn redirect(&self, to: &str);
}

pub fn is_public_path(path: &str) -> bool {
    PUBLIC_PATHS.iter().any(|p| path.starts_with(p))
}

/// Sends the user to the login view unless they are already on an
/// auth-exempt one.
pub struct LoginRedirect<N> {
    navigator: N,
}

impl<N: Navigator> LoginRedirect<N> {
    pub fn new(navigator: N) -> Self {
        Self { navigator }
    }
}

impl<N: Navigator> AuthFailureHook for LoginRedirect<N> {
    fn on_auth_failure(&self) {
        let current = self.navigator.current_path();
        if is_public_path(&current) {
            debug!(path = %current, "Already on a public view, not redirecting");
            return;
        }
        info!(from = %current, "Session lost, redirecting to login");
        self.navigator.redirect(LOGIN_PATH);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    Proceed,
    RedirectToLogin,
    RedirectHome,
}

impl RouteDecision {
    pub fn target(&self) -> Option<&'static str> {
        match self {
            RouteDecision::Proceed => None,
            RouteDecision::RedirectToLogin => Some(LOGIN_PATH),
            RouteDecision::RedirectHome => Some(HOME_PATH),
        }
    }
}

/// Decides whether a view may be shown given whether a token is present.
///
/// Protected views need a token; login and register are pointless once
/// logged in.
pub fn guard_route(path: &str, has_token: bool) -> RouteDecision {
    if UNGUARDED_PREFIXES.iter().any(|p| path.starts_with(p)) {
        return RouteDecision::Proceed;
    }

    match (has_token, is_public_path(path)) {
        (false, false) => RouteDecision::RedirectToLogin,
        (true, true) => RouteDecision::RedirectHome,
        _ => RouteDecision::Proceed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FakeNavigator {
        at: String,
        redirects: Mutex<Vec<String>>,
    }

    impl FakeNavigator {
        fn at(path: &str) -> Self {
            Self {
                at: path.to_string(),
                redirects: Mutex::new(Vec::new()),
            }
        }
    }

    impl Navigator for &FakeNavigator {
        fn current_path(&self) -> String {
            self.at.clone()
        }

        fn redirect(&self, to: &str) {
            self.redirects.lock().unwrap().push(to.to_string());
        }
    }

    #[test]
    fn test_redirects_from_protected_view() {
        let nav = FakeNavigator::at("/owner/bookings");
        LoginRedirect::new(&nav).on_auth_failure();
        assert_eq!(*nav.redirects.lock().unwrap(), vec!["/login".to_string()]);
    }

    #[test]
    fn test_no_redirect_from_login_or_register() {
        for path in ["/login", "/register", "/login?next=/bookings"] {
            let nav = FakeNavigator::at(path);
            LoginRedirect::new(&nav).on_auth_failure();
            assert!(nav.redirects.lock().unwrap().is_empty(), "{path}");
        }
    }

    #[test]
    fn test_guard_route() {
        assert_eq!(guard_route("/bookings", false), RouteDecision::RedirectToLogin);
        assert_eq!(guard_route("/bookings", true), RouteDecision::Proceed);
        assert_eq!(guard_route("/login", false), RouteDecision::Proceed);
        assert_eq!(guard_route("/register", true), RouteDecision::RedirectHome);
        assert_eq!(guard_route("/", false), RouteDecision::RedirectToLogin);
    }

    #[test]
    fn test_assets_and_api_are_never_guarded() {
        assert_eq!(guard_route("/api/vehicles/", false), RouteDecision::Proceed);
        assert_eq!(guard_route("/_next/static/app.js", false), RouteDecision::Proceed);
        assert_eq!(guard_route("/favicon.ico", false), RouteDecision::Proceed);
    }

    #[test]
    fn test_decision_targets() {
        assert_eq!(RouteDecision::RedirectToLogin.target(), Some("/login"));
        assert_eq!(RouteDecision::RedirectHome.target(), Some("/"));
        assert_eq!(RouteDecision::Proceed.target(), None);
    }
}
