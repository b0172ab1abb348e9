use serde::{Deserialize, Serialize};

use crate::auth::AuthSession;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Route {
    Home,
    Login,
    Register,
}

impl Route {
    pub const ALL: [Route; 3] = [Route::Home, Route::Login, Route::Register];

    pub fn path(self) -> &'static str {
        match self {
            Route::Home => "/",
            Route::Login => "/login",
            Route::Register => "/register",
        }
    }

    /// Ignores a query string, a fragment and a trailing slash.
    pub fn from_path(path: &str) -> Option<Route> {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let trimmed = path.trim_end_matches('/');
        let normalized = if trimmed.is_empty() { "/" } else { trimmed };
        Route::ALL.into_iter().find(|r| r.path() == normalized)
    }

    pub fn requires_auth(self) -> bool {
        matches!(self, Route::Home)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouteDecision {
    Render(Route),
    Redirect(Route),
    NotFound,
}

/// Protected routes render only with a signed-in user; everyone else is
/// sent to the login page.
pub fn guard(route: Route, session: &AuthSession) -> RouteDecision {
    if route.requires_auth() && !session.is_authenticated() {
        log::debug!("guard: {} requires auth, redirecting", route.path());
        RouteDecision::Redirect(Route::Login)
    } else {
        RouteDecision::Render(route)
    }
}

pub fn resolve(path: &str, session: &AuthSession) -> RouteDecision {
    match Route::from_path(path) {
        Some(route) => guard(route, session),
        None => RouteDecision::NotFound,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::UserIdentity;
    use harbor_core::MemoryStore;
    use std::sync::Arc;

    #[test]
    fn parses_paths() {
        assert_eq!(Route::from_path("/"), Some(Route::Home));
        assert_eq!(Route::from_path(""), Some(Route::Home));
        assert_eq!(Route::from_path("/login/"), Some(Route::Login));
        assert_eq!(Route::from_path("/register?ref=mail"), Some(Route::Register));
        assert_eq!(Route::from_path("/admin"), None);
        for r in Route::ALL {
            assert_eq!(Route::from_path(r.path()), Some(r));
        }
    }

    #[test]
    fn guard_redirects_until_signed_in() {
        let session = AuthSession::new(Arc::new(MemoryStore::new()));
        assert_eq!(resolve("/", &session), RouteDecision::Redirect(Route::Login));
        assert_eq!(resolve("/register", &session), RouteDecision::Render(Route::Register));
        assert_eq!(resolve("/nope", &session), RouteDecision::NotFound);

        session.login(UserIdentity::with_id(1), None);
        assert_eq!(resolve("/", &session), RouteDecision::Render(Route::Home));
    }
}
