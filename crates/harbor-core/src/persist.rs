//! # Persisted state
//!
//! [`PersistentValue`] is a reactive cell whose value is mirrored into a
//! [`DurableStore`] under a fixed key:
//!
//! ```rust
//! use std::sync::Arc;
//! use harbor_core::*;
//!
//! let store = Arc::new(MemoryStore::new());
//! let theme = PersistentValue::new(store.clone(), "theme", "light".to_string());
//! theme.set("dark".to_string());
//!
//! // A later construction (e.g. after a reload) recovers the last write.
//! let again = PersistentValue::new(store, "theme", "light".to_string());
//! assert_eq!(again.get(), "dark");
//! ```
//!
//! Every commit re-serializes and rewrites the whole value, even when it did
//! not change. The in-memory value is updated first, then persisted, then
//! subscribers are notified.

use std::rc::Rc;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{HarborError, Result};
use crate::signal::{Signal, SubId};
use crate::storage::DurableStore;

pub trait Persistable: Clone + Serialize + DeserializeOwned + 'static {}
impl<T> Persistable for T where T: Clone + Serialize + DeserializeOwned + 'static {}

pub struct PersistentValue<T: Persistable> {
    inner: Rc<Inner<T>>,
}

struct Inner<T: 'static> {
    key: String,
    store: Arc<dyn DurableStore>,
    initial: T,
    value: Signal<T>,
}

impl<T: Persistable> Clone for PersistentValue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

/// Read and decode `key`. `Ok(None)` means the key is absent.
pub fn load<T: DeserializeOwned>(store: &dyn DurableStore, key: &str) -> Result<Option<T>> {
    match store.get(key)? {
        None => Ok(None),
        Some(text) => serde_json::from_str(&text)
            .map(Some)
            .map_err(|source| HarborError::CorruptPersistedState {
                key: key.to_owned(),
                source,
            }),
    }
}

pub fn save<T: Serialize>(store: &dyn DurableStore, key: &str, value: &T) -> Result<()> {
    let text = serde_json::to_string(value).map_err(|source| HarborError::Serialize {
        key: key.to_owned(),
        source,
    })?;
    store.set(key, &text)
}

impl<T: Persistable> PersistentValue<T> {
    /// Recover `key` from the store, falling back to `initial` when the entry
    /// is absent, unreadable or corrupt. A corrupt entry is overwritten.
    pub fn new(store: Arc<dyn DurableStore>, key: impl Into<String>, initial: T) -> Self {
        let key = key.into();
        let start = match load::<T>(store.as_ref(), &key) {
            Ok(Some(v)) => v,
            Ok(None) => initial.clone(),
            Err(e) => {
                log::warn!("{e}; falling back to the initial value");
                initial.clone()
            }
        };
        let this = Self::from_parts(store, key, initial, start);
        this.persist_logged();
        this
    }

    /// Like [`PersistentValue::new`] but fails on an unreadable or corrupt
    /// entry instead of falling back.
    pub fn try_new(store: Arc<dyn DurableStore>, key: impl Into<String>, initial: T) -> Result<Self> {
        let key = key.into();
        let start = load::<T>(store.as_ref(), &key)?.unwrap_or_else(|| initial.clone());
        let this = Self::from_parts(store, key, initial, start);
        this.persist()?;
        Ok(this)
    }

    fn from_parts(store: Arc<dyn DurableStore>, key: String, initial: T, start: T) -> Self {
        Self {
            inner: Rc::new(Inner {
                key,
                store,
                initial,
                value: Signal::new(start),
            }),
        }
    }

    pub fn key(&self) -> &str {
        &self.inner.key
    }

    pub fn get(&self) -> T {
        self.inner.value.get()
    }

    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.inner.value.with(f)
    }

    /// Commit `v`: memory first, then storage, then subscribers. A storage
    /// failure is logged; the in-memory value still changes.
    pub fn set(&self, v: T) {
        if let Err(e) = self.try_set(v) {
            log::warn!("write-through failed: {e}");
        }
    }

    /// [`PersistentValue::set`], reporting the write-through result.
    /// Subscribers are notified either way.
    pub fn try_set(&self, v: T) -> Result<()> {
        self.inner.value.replace(v);
        let written = self.persist();
        self.inner.value.notify();
        written
    }

    pub fn update(&self, f: impl FnOnce(&mut T)) {
        let mut v = self.get();
        f(&mut v);
        self.set(v);
    }

    /// Back to the initial value, persisted like any other commit.
    pub fn reset(&self) {
        self.set(self.inner.initial.clone());
    }

    /// Delete the stored entry and restore the initial value in memory
    /// without writing it back.
    pub fn forget(&self) -> Result<()> {
        self.inner.store.remove(&self.inner.key)?;
        self.inner.value.set(self.inner.initial.clone());
        Ok(())
    }

    pub fn subscribe(&self, f: impl Fn(&T) + 'static) -> SubId {
        self.inner.value.subscribe(f)
    }

    pub fn unsubscribe(&self, id: SubId) -> bool {
        self.inner.value.unsubscribe(id)
    }

    /// The reactive cell backing this value. Writes through the signal skip
    /// persistence; use [`PersistentValue::set`].
    pub fn signal(&self) -> Signal<T> {
        self.inner.value.clone()
    }

    fn persist(&self) -> Result<()> {
        let inner = &self.inner;
        inner
            .value
            .with(|v| save(inner.store.as_ref(), &inner.key, v))
    }

    fn persist_logged(&self) {
        if let Err(e) = self.persist() {
            log::warn!("initial write-through failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use serde::Deserialize;
    use std::cell::{Cell, RefCell};

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct Prefs {
        volume: u8,
        muted: bool,
    }

    fn store() -> Arc<MemoryStore> {
        Arc::new(MemoryStore::new())
    }

    #[test]
    fn absent_key_uses_initial_and_writes_it_through() {
        let s = store();
        let v = PersistentValue::new(s.clone(), "count", 7u32);
        assert_eq!(v.get(), 7);
        assert_eq!(s.get("count").unwrap().as_deref(), Some("7"));
    }

    #[test]
    fn round_trips_structured_values() {
        let s = store();
        let prefs = PersistentValue::new(s.clone(), "prefs", Prefs { volume: 5, muted: false });
        prefs.update(|p| p.muted = true);
        prefs.set(Prefs { volume: 9, muted: true });

        let fresh = PersistentValue::new(s, "prefs", Prefs { volume: 0, muted: false });
        assert_eq!(fresh.get(), Prefs { volume: 9, muted: true });
    }

    #[test]
    fn corrupt_entry_falls_back_and_is_repaired() {
        let s = store();
        s.set("prefs", "{broken").unwrap();
        let v = PersistentValue::new(s.clone(), "prefs", vec![1, 2]);
        assert_eq!(v.get(), vec![1, 2]);
        assert_eq!(s.get("prefs").unwrap().as_deref(), Some("[1,2]"));
    }

    #[test]
    fn try_new_fails_fast_on_corrupt_entry() {
        let s = store();
        s.set("prefs", "nope").unwrap();
        let err = PersistentValue::try_new(s.clone(), "prefs", 0i32).err().unwrap();
        assert!(matches!(err, HarborError::CorruptPersistedState { ref key, .. } if key == "prefs"));
        // untouched on failure
        assert_eq!(s.get("prefs").unwrap().as_deref(), Some("nope"));
    }

    #[test]
    fn subscribers_observe_the_persisted_value() {
        let s = store();
        let v = PersistentValue::new(s.clone(), "n", 0i32);
        let seen = Rc::new(RefCell::new(Vec::new()));
        {
            let seen = seen.clone();
            let s = s.clone();
            v.subscribe(move |n| {
                let stored = s.get("n").unwrap().unwrap();
                seen.borrow_mut().push((*n, stored));
            });
        }
        v.set(3);
        v.set(3);
        assert_eq!(
            *seen.borrow(),
            vec![(3, "3".to_string()), (3, "3".to_string())]
        );
    }

    #[test]
    fn subscriber_can_clamp_by_writing_back() {
        let s = store();
        let v = PersistentValue::new(s.clone(), "vol", 0i32);
        let handle = v.clone();
        v.subscribe(move |n| {
            if *n > 10 {
                handle.set(10);
            }
        });
        v.set(42);
        assert_eq!(v.get(), 10);
        assert_eq!(s.get("vol").unwrap().as_deref(), Some("10"));
    }

    #[test]
    fn one_shot_subscriber_unsubscribes_itself() {
        let v = PersistentValue::new(store(), "n", 0i32);
        let hits = Rc::new(Cell::new(0));
        let own: Rc<Cell<Option<SubId>>> = Rc::new(Cell::new(None));
        let id = {
            let (handle, hits, own) = (v.clone(), hits.clone(), own.clone());
            v.subscribe(move |_| {
                hits.set(hits.get() + 1);
                if let Some(id) = own.take() {
                    handle.unsubscribe(id);
                }
            })
        };
        own.set(Some(id));
        v.set(1);
        v.set(2);
        assert_eq!(hits.get(), 1);
        assert_eq!(v.get(), 2);
    }

    #[test]
    fn reset_and_forget() {
        let s = store();
        let v = PersistentValue::new(s.clone(), "name", String::from("anon"));
        v.set("ada".into());
        v.reset();
        assert_eq!(s.get("name").unwrap().as_deref(), Some("\"anon\""));

        v.set("ada".into());
        v.forget().unwrap();
        assert_eq!(v.get(), "anon");
        assert_eq!(s.get("name").unwrap(), None);
    }

    #[test]
    fn distinct_keys_do_not_interfere() {
        let s = store();
        let a = PersistentValue::new(s.clone(), "a", 1);
        let b = PersistentValue::new(s.clone(), "b", 2);
        a.set(10);
        b.set(20);
        assert_eq!(PersistentValue::new(s.clone(), "a", 0).get(), 10);
        assert_eq!(PersistentValue::new(s, "b", 0).get(), 20);
    }
}
