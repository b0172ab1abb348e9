//! Composition-friendly constructors.
//!
//! Each `remember_*` helper returns the same instance across composition
//! passes for a given key, and ties the instance's teardown to the scope it
//! was first created in: when that scope is disposed the instance is
//! disposed and its slot forgotten, so a later composition starts fresh.

use std::cell::RefCell;
use std::sync::Arc;
use std::time::Duration;

use crate::debounce::Debounced;
use crate::loader::{FetchResponder, IncrementalLoader, LoaderOptions};
use crate::persist::{Persistable, PersistentValue};
use crate::runtime::{forget_key, remember_with_key};
use crate::scope::current_scope;
use crate::storage::DurableStore;
use crate::timer::Timers;
use crate::visibility::Viewport;

fn on_scope_teardown(slot: String, f: impl FnOnce() + 'static) {
    match current_scope() {
        Some(scope) => scope.add_disposer(move || {
            f();
            forget_key(&slot);
        }),
        None => log::debug!("'{slot}' remembered outside a scope; it lives until forgotten"),
    }
}

/// Storage-backed state, shared by every caller using the same `key`.
pub fn remember_persistent<T: Persistable>(
    store: Arc<dyn DurableStore>,
    key: &str,
    initial: impl FnOnce() -> T,
) -> PersistentValue<T> {
    let slot = format!("persist:{key}");
    let value = remember_with_key(slot.clone(), || {
        let v = PersistentValue::new(store, key, initial());
        on_scope_teardown(slot, || {});
        v
    });
    (*value).clone()
}

/// Debounced copy of `value`. Call it every composition pass with the
/// latest input; the quiet window restarts only when the input or the delay
/// actually changed since the previous pass.
pub fn remember_debounced<T: Clone + PartialEq + 'static>(
    key: &str,
    timers: &Timers,
    value: T,
    delay: Duration,
) -> Debounced<T> {
    let slot = format!("debounce:{key}");
    let entry = remember_with_key(slot.clone(), || {
        let d = Debounced::new(timers.clone(), value.clone(), delay);
        let handle = d.clone();
        on_scope_teardown(slot, move || handle.dispose());
        (d, RefCell::new((value.clone(), delay)))
    });
    let (d, last) = &*entry;
    let (input_changed, delay_changed) = {
        let last = last.borrow();
        (last.0 != value, last.1 != delay)
    };
    if delay_changed {
        d.set_delay(delay);
    }
    if input_changed {
        d.push(value.clone());
    }
    *last.borrow_mut() = (value, delay);
    d.clone()
}

/// Incremental loader for `query_key`. A different `query_key` on a later
/// pass resets the loader instead of creating a second one.
pub fn remember_incremental_loader<C, I>(
    key: &str,
    query_key: &str,
    viewport: &Viewport,
    fetch_page: impl Fn(Option<C>, FetchResponder<C, I>) + 'static,
    options: impl FnOnce() -> LoaderOptions<C, I>,
) -> IncrementalLoader<C, I>
where
    C: Clone + PartialEq + 'static,
    I: Clone + 'static,
{
    let slot = format!("loader:{key}");
    let loader = remember_with_key(slot.clone(), || {
        let l = IncrementalLoader::new(query_key, viewport, fetch_page, options());
        let handle = l.clone();
        on_scope_teardown(slot, move || handle.dispose());
        l
    });
    let loader = (*loader).clone();
    loader.set_query_key(query_key);
    loader
}
