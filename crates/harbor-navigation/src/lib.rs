//! # Navigation
//!
//! A back stack of [`Route`]s where every transition passes through the auth
//! [`guard`]: pushing a protected route while signed out lands on the login
//! page instead. Each entry owns a [`Scope`]; popping an entry disposes it,
//! so loaders, debouncers and other scoped helpers created while rendering
//! that entry are torn down with it.
//!
//! ```rust
//! use std::sync::Arc;
//! use harbor_core::MemoryStore;
//! use harbor_navigation::*;
//!
//! let session = AuthSession::new(Arc::new(MemoryStore::new()));
//! let nav = Navigator::new(Route::Register, session.clone());
//! nav.push(Route::Home);
//! assert_eq!(nav.current(), Route::Login);
//!
//! session.login(UserIdentity::with_id(1), None);
//! nav.clear_and_push(Route::Home);
//! assert_eq!(nav.current(), Route::Home);
//! ```

pub mod auth;
pub mod routes;

use std::cell::RefCell;
use std::rc::Rc;

use harbor_core::{Scope, Signal, signal};

pub use auth::{AUTH_KEY, AuthRecord, AuthSession, UserIdentity};
pub use routes::{Route, RouteDecision, guard, resolve};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TransitionDir {
    None,
    Push,
    Pop,
}

struct Entry {
    id: u64,
    route: Route,
    /// Disposed when the entry is popped, so `scoped_effect` cleanups run on unmount.
    scope: Scope,
}

struct BackState {
    entries: Vec<Entry>,
    next_id: u64,
    last_dir: TransitionDir,
}

impl BackState {
    fn entry(&mut self, route: Route) -> Entry {
        let id = self.next_id;
        self.next_id += 1;
        Entry {
            id,
            route,
            scope: Scope::new(),
        }
    }
}

#[derive(Clone)]
pub struct Navigator {
    inner: Rc<RefCell<BackState>>,
    version: Signal<u64>,
    session: AuthSession,
}

impl Navigator {
    pub fn new(start: Route, session: AuthSession) -> Self {
        let start = Self::admit(&session, start);
        let mut state = BackState {
            entries: Vec::new(),
            next_id: 1,
            last_dir: TransitionDir::None,
        };
        let first = state.entry(start);
        state.entries.push(first);
        Self {
            inner: Rc::new(RefCell::new(state)),
            version: signal(0),
            session,
        }
    }

    /// The route that may actually be shown for a request of `route`.
    fn admit(session: &AuthSession, route: Route) -> Route {
        match guard(route, session) {
            RouteDecision::Render(r) | RouteDecision::Redirect(r) => r,
            RouteDecision::NotFound => Route::Home,
        }
    }

    pub fn current(&self) -> Route {
        self.top().0
    }

    /// Top route, its entry id and its scope.
    pub fn top(&self) -> (Route, u64, Scope) {
        let s = self.inner.borrow();
        // the stack is never empty
        let e = &s.entries[s.entries.len() - 1];
        (e.route, e.id, e.scope.clone())
    }

    pub fn size(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    pub fn last_dir(&self) -> TransitionDir {
        self.inner.borrow().last_dir
    }

    pub fn routes(&self) -> Vec<Route> {
        self.inner.borrow().entries.iter().map(|e| e.route).collect()
    }

    /// Bumped on every change; subscribe to re-render.
    pub fn version(&self) -> Signal<u64> {
        self.version.clone()
    }

    fn bump(&self) {
        let v = self.version.get();
        self.version.set(v.wrapping_add(1));
    }

    pub fn push(&self, route: Route) {
        let route = Self::admit(&self.session, route);
        {
            let mut s = self.inner.borrow_mut();
            let e = s.entry(route);
            s.entries.push(e);
            s.last_dir = TransitionDir::Push;
        }
        self.bump();
    }

    /// Navigate by path; unknown paths are ignored.
    pub fn push_path(&self, path: &str) -> RouteDecision {
        let decision = resolve(path, &self.session);
        match decision {
            RouteDecision::Render(r) | RouteDecision::Redirect(r) => self.push(r),
            RouteDecision::NotFound => log::warn!("navigation: no route for '{path}'"),
        }
        decision
    }

    /// Swap the top entry for `route`; the old entry's scope is disposed.
    pub fn replace(&self, route: Route) {
        let route = Self::admit(&self.session, route);
        let old = {
            let mut s = self.inner.borrow_mut();
            let e = s.entry(route);
            s.last_dir = TransitionDir::Push;
            match s.entries.last_mut() {
                Some(last) => Some(std::mem::replace(last, e)),
                None => {
                    s.entries.push(e);
                    None
                }
            }
        };
        if let Some(old) = old {
            old.scope.dispose();
        }
        self.bump();
    }

    pub fn pop(&self) -> bool {
        // Don't pop if only one entry is present
        let popped = {
            let mut s = self.inner.borrow_mut();
            if s.entries.len() <= 1 {
                return false;
            }
            s.last_dir = TransitionDir::Pop;
            s.entries.pop()
        };
        if let Some(e) = popped {
            e.scope.dispose();
        }
        self.bump();
        true
    }

    pub fn clear_and_push(&self, route: Route) {
        let route = Self::admit(&self.session, route);
        let old = {
            let mut s = self.inner.borrow_mut();
            let old = std::mem::take(&mut s.entries);
            let e = s.entry(route);
            s.entries.push(e);
            s.last_dir = TransitionDir::Push;
            old
        };
        // innermost first
        for e in old.into_iter().rev() {
            e.scope.dispose();
        }
        self.bump();
    }

    /// Sign out and start over at the login page.
    pub fn logout(&self) {
        self.session.logout();
        self.clear_and_push(Route::Login);
    }

    /// Re-check the top entry against the guard (e.g. after the session
    /// changed elsewhere). Returns true if it was replaced.
    pub fn revalidate(&self) -> bool {
        let top = self.current();
        let admitted = Self::admit(&self.session, top);
        if admitted != top {
            self.replace(admitted);
            true
        } else {
            false
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.routes()).unwrap_or("[]".into())
    }

    /// Restore a stack saved with `to_json`. Every restored route goes
    /// through the guard; invalid or empty input is ignored.
    pub fn from_json(&self, json: &str) -> bool {
        let routes = match serde_json::from_str::<Vec<Route>>(json) {
            Ok(r) if !r.is_empty() => r,
            Ok(_) => return false,
            Err(e) => {
                log::warn!("navigation: ignoring saved back stack: {e}");
                return false;
            }
        };
        let old = {
            let mut s = self.inner.borrow_mut();
            let old = std::mem::take(&mut s.entries);
            for r in routes {
                let e = s.entry(Self::admit(&self.session, r));
                s.entries.push(e);
            }
            s.last_dir = TransitionDir::None;
            old
        };
        for e in old.into_iter().rev() {
            e.scope.dispose();
        }
        self.bump();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use harbor_core::{Dispose, MemoryStore, scoped_effect};
    use std::cell::Cell;
    use std::sync::Arc;

    fn signed_in() -> AuthSession {
        let session = AuthSession::new(Arc::new(MemoryStore::new()));
        session.login(UserIdentity::with_id(1), None);
        session
    }

    #[test]
    fn protected_start_redirects_to_login() {
        let session = AuthSession::new(Arc::new(MemoryStore::new()));
        let nav = Navigator::new(Route::Home, session);
        assert_eq!(nav.current(), Route::Login);
    }

    #[test]
    fn pop_disposes_entry_scope() {
        let nav = Navigator::new(Route::Home, signed_in());
        nav.push(Route::Register);
        let (_, _, scope) = nav.top();
        let unmounted = Rc::new(Cell::new(false));
        scope.run(|| {
            let u = unmounted.clone();
            scoped_effect(move || Dispose::new(move || u.set(true)));
        });

        assert!(nav.pop());
        assert!(unmounted.get());
        assert_eq!(nav.last_dir(), TransitionDir::Pop);
        assert!(!nav.pop());
        assert_eq!(nav.size(), 1);
    }

    #[test]
    fn version_bumps_on_every_change() {
        let nav = Navigator::new(Route::Home, signed_in());
        let v = nav.version();
        nav.push(Route::Login);
        nav.replace(Route::Register);
        nav.pop();
        assert_eq!(v.get(), 3);
        assert_eq!(nav.routes(), vec![Route::Home]);
    }

    #[test]
    fn logout_clears_stack_and_revalidate_catches_external_signout() {
        let session = signed_in();
        let nav = Navigator::new(Route::Home, session.clone());
        nav.push(Route::Register);
        nav.logout();
        assert_eq!(nav.routes(), vec![Route::Login]);

        session.login(UserIdentity::with_id(2), None);
        nav.push(Route::Home);
        session.logout();
        assert!(nav.revalidate());
        assert_eq!(nav.current(), Route::Login);
        assert!(!nav.revalidate());
    }

    #[test]
    fn json_round_trip_goes_through_guard() {
        let session = signed_in();
        let nav = Navigator::new(Route::Home, session.clone());
        nav.push(Route::Register);
        let saved = nav.to_json();
        assert_eq!(saved, r#"["Home","Register"]"#);

        session.logout();
        let other = Navigator::new(Route::Register, session);
        assert!(other.from_json(&saved));
        assert_eq!(other.routes(), vec![Route::Login, Route::Register]);
        assert!(!other.from_json("[]"));
        assert!(!other.from_json("nope"));
    }

    #[test]
    fn push_path_reports_decision() {
        let nav = Navigator::new(Route::Login, AuthSession::new(Arc::new(MemoryStore::new())));
        assert_eq!(nav.push_path("/"), RouteDecision::Redirect(Route::Login));
        assert_eq!(nav.push_path("/missing"), RouteDecision::NotFound);
        assert_eq!(nav.size(), 2);
    }
}
