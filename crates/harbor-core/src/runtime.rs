use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::scope::Scope;

thread_local! {
    pub static COMPOSER: RefCell<Composer> = RefCell::new(Composer::default());
}

#[derive(Default)]
pub struct Composer {
    pub keyed_slots: HashMap<String, Box<dyn Any>>,
}

/// One composition pass: runs `build` inside `scope`, so hooks called from
/// `build` attach their teardown to it.
pub fn compose<R>(scope: &Scope, build: impl FnOnce() -> R) -> R {
    scope.run(build)
}

/// Key-based remember
///
/// `init` runs with the composer released, so it may itself remember.
pub fn remember_with_key<T: 'static>(key: impl Into<String>, init: impl FnOnce() -> T) -> Rc<T> {
    let key = key.into();
    let existing = COMPOSER.with(|c| {
        let c = c.borrow();
        match c.keyed_slots.get(&key) {
            Some(existing) => match existing.downcast_ref::<Rc<T>>() {
                Some(rc) => Some(rc.clone()),
                None => {
                    log::warn!(
                        "remember_with_key: key '{}' reused with a different type; replacing.",
                        key
                    );
                    None
                }
            },
            None => None,
        }
    });
    if let Some(rc) = existing {
        return rc;
    }

    let rc: Rc<T> = Rc::new(init());
    COMPOSER.with(|c| {
        c.borrow_mut().keyed_slots.insert(key, Box::new(rc.clone()));
    });
    rc
}

/// Drop a keyed slot so the next `remember_with_key` re-initializes it.
pub fn forget_key(key: &str) -> bool {
    // dropped after the composer is released; teardown may remember again
    let removed = COMPOSER.with(|c| c.borrow_mut().keyed_slots.remove(key));
    removed.is_some()
}
