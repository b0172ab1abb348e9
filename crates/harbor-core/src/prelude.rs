pub use crate::clock::{Clock, ManualClock, SystemClock};
pub use crate::debounce::{DEFAULT_DEBOUNCE, Debounced};
pub use crate::effects::{Dispose, on_unmount};
pub use crate::error::{HarborError, Result};
pub use crate::geometry::{Rect, Vec2};
pub use crate::hooks::{remember_debounced, remember_incremental_loader, remember_persistent};
pub use crate::loader::{FetchResponder, IncrementalLoader, LoadStatus, LoaderOptions, Page};
pub use crate::persist::PersistentValue;
pub use crate::portal::{DEFAULT_PORTAL_TARGET, Portal, PortalRoot};
pub use crate::runtime::{compose, forget_key, remember_with_key};
pub use crate::scope::{Scope, current_scope, scoped_effect};
pub use crate::signal::{Signal, signal};
pub use crate::storage::{DurableStore, FileStore, MemoryStore};
pub use crate::timer::Timers;
pub use crate::visibility::{IntersectionObserver, SentinelRef, Viewport};
