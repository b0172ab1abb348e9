use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::Dispose;

thread_local! {
    static CURRENT_SCOPE: RefCell<Option<Weak<ScopeInner>>> = const { RefCell::new(None) };
}

/// Lifetime of a mounted view. Everything registered on a scope is torn
/// down, children first, when the scope is disposed or dropped.
pub struct Scope {
    inner: Rc<ScopeInner>,
}

struct ScopeInner {
    disposers: RefCell<Vec<Box<dyn FnOnce()>>>,
    children: RefCell<Vec<Scope>>,
    disposed: Cell<bool>,
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl Scope {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(ScopeInner {
                disposers: RefCell::new(Vec::new()),
                children: RefCell::new(Vec::new()),
                disposed: Cell::new(false),
            }),
        }
    }

    pub fn run<R>(&self, f: impl FnOnce() -> R) -> R {
        // Restores the previous scope even if `f` unwinds
        struct Restore(Option<Weak<ScopeInner>>);
        impl Drop for Restore {
            fn drop(&mut self) {
                let prev = self.0.take();
                CURRENT_SCOPE.with(|current| *current.borrow_mut() = prev);
            }
        }

        let prev = CURRENT_SCOPE.with(|current| {
            current
                .borrow_mut()
                .replace(Rc::downgrade(&self.inner))
        });
        let _restore = Restore(prev);
        f()
    }

    /// Disposers added after the scope was disposed run immediately.
    pub fn add_disposer(&self, disposer: impl FnOnce() + 'static) {
        if self.inner.disposed.get() {
            disposer();
            return;
        }
        self.inner.disposers.borrow_mut().push(Box::new(disposer));
    }

    pub fn child(&self) -> Scope {
        let child = Scope::new();
        self.inner.children.borrow_mut().push(child.clone());
        child
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }

    pub fn dispose(self) {
        self.inner.teardown();
    }
}

impl ScopeInner {
    fn teardown(&self) {
        if self.disposed.replace(true) {
            return;
        }
        // Dispose children first
        let children = std::mem::take(&mut *self.children.borrow_mut());
        for child in children {
            child.dispose();
        }

        // Run disposers in reverse registration order
        let disposers = std::mem::take(&mut *self.disposers.borrow_mut());
        for disposer in disposers.into_iter().rev() {
            disposer();
        }
    }
}

impl Clone for Scope {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

pub fn current_scope() -> Option<Scope> {
    CURRENT_SCOPE.with(|current| {
        current
            .borrow()
            .as_ref()
            .and_then(|weak| weak.upgrade().map(|inner| Scope { inner }))
    })
}

/// Scoped effect that auto-cleans up
pub fn scoped_effect<F>(f: F)
where
    F: FnOnce() -> Dispose + 'static,
{
    let cleanup = f();
    if let Some(scope) = current_scope() {
        scope.add_disposer(move || cleanup.run());
    } else {
        log::debug!("scoped_effect outside of a scope; cleanup will not run automatically");
    }
}

impl Drop for ScopeInner {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispose_runs_children_then_own_disposers_once() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let root = Scope::new();
        let child = root.child();
        {
            let log = log.clone();
            root.add_disposer(move || log.borrow_mut().push("root"));
        }
        {
            let log = log.clone();
            child.add_disposer(move || log.borrow_mut().push("child"));
        }

        let again = root.clone();
        root.dispose();
        again.clone().dispose();
        assert_eq!(*log.borrow(), vec!["child", "root"]);
        assert!(again.is_disposed());
    }

    #[test]
    fn scoped_effect_registers_on_current_scope() {
        let ran = Rc::new(Cell::new(false));
        let scope = Scope::new();
        scope.run(|| {
            let ran = ran.clone();
            scoped_effect(move || Dispose::new(move || ran.set(true)));
        });
        assert!(current_scope().is_none());
        assert!(!ran.get());
        scope.dispose();
        assert!(ran.get());
    }

    #[test]
    fn late_disposer_runs_immediately() {
        let scope = Scope::new();
        let handle = scope.clone();
        scope.dispose();
        let ran = Rc::new(Cell::new(false));
        let r = ran.clone();
        handle.add_disposer(move || r.set(true));
        assert!(ran.get());
    }
}
