//! # State, Storage, and Loading
//!
//! Harbor is the state layer of a small single-page application shell. It is
//! single-threaded and event-driven: the host loop delivers timer expiries,
//! viewport changes and fetch completions, and every component reacts to
//! them through explicit events. The main pieces:
//!
//! - `Signal<T>`: observable value with subscribers.
//! - `Scope` / `Dispose`: lifecycle of a mounted view and its cleanups.
//! - `PersistentValue<T>`: a signal mirrored write-through to a
//!   `DurableStore`.
//! - `Debounced<T>`: republishes a value once it has been quiet for a delay.
//! - `IncrementalLoader<C, I>`: infinite-scroll pagination driven by an
//!   `IntersectionObserver` on a sentinel element.
//! - `Portal<V>`: renders content into a named mount point.
//!
//! ## Signals
//!
//! ```rust
//! use harbor_core::*;
//!
//! let count = signal(0);
//! count.set(1);
//! count.update(|v| *v += 1);
//! assert_eq!(count.get(), 2);
//! ```
//!
//! ## Persisted state
//!
//! ```rust
//! use std::sync::Arc;
//! use harbor_core::*;
//!
//! let store: Arc<dyn DurableStore> = Arc::new(MemoryStore::new());
//! let volume = PersistentValue::new(store.clone(), "volume", 5u8);
//! volume.set(8);
//! assert_eq!(PersistentValue::new(store, "volume", 5u8).get(), 8);
//! ```
//!
//! ## Scopes and cleanup
//!
//! Helpers created inside `Scope::run` (directly or through `compose`)
//! register their teardown on that scope:
//!
//! ```rust
//! use harbor_core::*;
//!
//! let scope = Scope::new();
//! scope.run(|| {
//!     scoped_effect(|| {
//!         log::info!("mounted");
//!         on_unmount(|| log::info!("unmounted"))
//!     });
//! });
//! scope.dispose();
//! ```
//!
//! For timers and fetches, prefer the `remember_*` helpers in `hooks`, which
//! dispose their instance when the owning scope goes away.

pub mod clock;
pub mod debounce;
pub mod effects;
pub mod error;
pub mod geometry;
pub mod hooks;
pub mod loader;
pub mod persist;
pub mod portal;
pub mod prelude;
pub mod runtime;
pub mod scope;
pub mod signal;
pub mod storage;
pub mod timer;
pub mod visibility;

pub use clock::*;
pub use debounce::*;
pub use effects::*;
pub use error::{HarborError, Result};
pub use geometry::*;
pub use hooks::*;
pub use loader::*;
pub use persist::*;
pub use portal::*;
pub use prelude::*;
pub use runtime::*;
pub use scope::*;
pub use signal::*;
pub use storage::*;
pub use timer::*;
pub use visibility::*;
