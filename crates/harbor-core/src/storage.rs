//! # Durable key-value stores
//!
//! Persisted state is written through a [`DurableStore`]: a string-keyed,
//! string-valued store that survives restarts. Values are opaque JSON text
//! to the store; (de)serialization happens in `persist`.
//!
//! - [`MemoryStore`]: process-local map, used by tests and as a fallback.
//! - [`FileStore`]: a single JSON object file on disk, rewritten on every
//!   `set` via a temp file and rename.
//! - `LocalStorage` (wasm32 + `web` feature): the browser's `localStorage`.
//!
//! Stores are `Send + Sync` so a single instance can back every persisted
//! value in the process. Distinct keys never interfere; concurrent writers
//! to the same key are last-writer-wins.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::{HarborError, Result};

pub trait DurableStore: Send + Sync + 'static {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

#[derive(Default)]
pub struct MemoryStore {
    map: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.map.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.lock().is_empty()
    }
}

impl DurableStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.map.lock().get(key).cloned())
    }
    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.map.lock().insert(key.to_owned(), value.to_owned());
        Ok(())
    }
    fn remove(&self, key: &str) -> Result<()> {
        self.map.lock().remove(key);
        Ok(())
    }
}

/// All entries live in one JSON object file, cached in memory and flushed
/// on each write. A missing file is an empty store. The cache only changes
/// once the file has been rewritten, so a failed write leaves both as they
/// were.
pub struct FileStore {
    path: PathBuf,
    cache: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let cache = match fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => BTreeMap::new(),
            Ok(text) => serde_json::from_str(&text).map_err(|source| {
                HarborError::CorruptPersistedState {
                    key: path.display().to_string(),
                    source,
                }
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        log::debug!("file store opened at {} ({} entries)", path.display(), cache.len());
        Ok(Self {
            path,
            cache: Mutex::new(cache),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(dir) = self.path.parent()
            && !dir.as_os_str().is_empty()
        {
            fs::create_dir_all(dir)?;
        }
        let text = serde_json::to_string_pretty(entries).map_err(|source| {
            HarborError::Serialize {
                key: self.path.display().to_string(),
                source,
            }
        })?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, text)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl DurableStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.cache.lock().get(key).cloned())
    }
    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut cache = self.cache.lock();
        let mut next = cache.clone();
        next.insert(key.to_owned(), value.to_owned());
        self.flush(&next)?;
        *cache = next;
        Ok(())
    }
    fn remove(&self, key: &str) -> Result<()> {
        let mut cache = self.cache.lock();
        if !cache.contains_key(key) {
            return Ok(());
        }
        let mut next = cache.clone();
        next.remove(key);
        self.flush(&next)?;
        *cache = next;
        Ok(())
    }
}

#[cfg(all(target_arch = "wasm32", feature = "web"))]
pub use web::LocalStorage;

#[cfg(all(target_arch = "wasm32", feature = "web"))]
mod web {
    use super::DurableStore;
    use crate::error::{HarborError, Result};

    /// `window.localStorage`. The handle is looked up per call: `web_sys`
    /// types are not `Send`, and the browser is single-threaded anyway.
    #[derive(Default)]
    pub struct LocalStorage;

    fn storage(key: &str) -> Result<web_sys::Storage> {
        web_sys::window()
            .and_then(|w| w.local_storage().ok().flatten())
            .ok_or_else(|| HarborError::Storage {
                key: key.to_owned(),
                message: "localStorage is unavailable".into(),
            })
    }

    fn js_err(key: &str, e: wasm_bindgen::JsValue) -> HarborError {
        HarborError::Storage {
            key: key.to_owned(),
            message: format!("{e:?}"),
        }
    }

    impl DurableStore for LocalStorage {
        fn get(&self, key: &str) -> Result<Option<String>> {
            storage(key)?.get_item(key).map_err(|e| js_err(key, e))
        }
        fn set(&self, key: &str, value: &str) -> Result<()> {
            storage(key)?.set_item(key, value).map_err(|e| js_err(key, e))
        }
        fn remove(&self, key: &str) -> Result<()> {
            storage(key)?.remove_item(key).map_err(|e| js_err(key, e))
        }
    }
}
