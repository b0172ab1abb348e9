//! # Incremental loading
//!
//! [`IncrementalLoader`] drives an infinite-scrolling list: it watches a
//! sentinel element through an [`IntersectionObserver`] and, each time the
//! sentinel becomes fully visible while more pages exist, fetches the next
//! page and appends it.
//!
//! ```text
//! Idle ──visible──▶ Loading ──ok──▶ Success ──visible & has_next──▶ Loading …
//!                      │
//!                      └──err──▶ Error ──visible | retry──▶ Loading (same cursor)
//! ```
//!
//! Guarantees:
//!
//! - at most one fetch is in flight; visibility events while loading are
//!   dropped, not queued. Pages are therefore appended in issuance order.
//! - once the next cursor is `None` no further fetch is issued.
//! - when the sentinel or `has_next_page` changes, the old observer is
//!   released before a new one is bound.
//! - after [`IncrementalLoader::dispose`] the observer is gone and late fetch
//!   completions are discarded without touching observable state.
//!
//! All mutation funnels through [`IncrementalLoader::handle`]. Events raised
//! while an event is being processed (a fetch that resolves synchronously, an
//! observer reporting on bind) are queued and processed in order afterwards.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use serde::{Deserialize, Serialize};

use crate::error::HarborError;
use crate::signal::{Signal, SubId};
use crate::visibility::{ElementId, IntersectionObserver, SentinelRef, Viewport};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Page<C, I> {
    pub items: Vec<I>,
    pub cursor: Option<C>,
}

impl<C, I> Page<C, I> {
    pub fn new(items: Vec<I>, cursor: Option<C>) -> Self {
        Self { items, cursor }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadStatus {
    Idle,
    Loading,
    Success,
    Error,
}

#[derive(Clone, Debug)]
pub struct LoaderState<C, I> {
    pub pages: Vec<Page<C, I>>,
    /// Cursor for the next fetch; `None` before the first page too.
    pub cursor: Option<C>,
    pub status: LoadStatus,
    pub has_next_page: bool,
    pub error: Option<String>,
}

impl<C, I> Default for LoaderState<C, I> {
    fn default() -> Self {
        Self {
            pages: Vec::new(),
            cursor: None,
            status: LoadStatus::Idle,
            has_next_page: true,
            error: None,
        }
    }
}

pub type FetchResult<C, I> = Result<Page<C, I>, HarborError>;
pub type FetchPage<C, I> = Rc<dyn Fn(Option<C>, FetchResponder<C, I>)>;
pub type NextCursor<C, I> = Rc<dyn Fn(&Page<C, I>) -> Option<C>>;

pub struct LoaderOptions<C, I> {
    /// Next cursor after `page`; `None` ends pagination. Defaults to the
    /// page's own cursor.
    pub get_next_cursor: NextCursor<C, I>,
    /// Visible fraction the sentinel must reach to trigger a fetch.
    pub threshold: f32,
    /// Fetch the first page at construction instead of on first visibility.
    pub fetch_on_mount: bool,
    /// End pagination when a page yields a cursor seen before.
    pub stop_on_repeated_cursor: bool,
}

impl<C: Clone + 'static, I: 'static> Default for LoaderOptions<C, I> {
    fn default() -> Self {
        Self {
            get_next_cursor: Rc::new(|page: &Page<C, I>| page.cursor.clone()),
            threshold: 1.0,
            fetch_on_mount: false,
            stop_on_repeated_cursor: true,
        }
    }
}

impl<C: Clone + 'static, I: 'static> LoaderOptions<C, I> {
    pub fn with_next_cursor(mut self, f: impl Fn(&Page<C, I>) -> Option<C> + 'static) -> Self {
        self.get_next_cursor = Rc::new(f);
        self
    }
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }
    pub fn fetch_on_mount(mut self, yes: bool) -> Self {
        self.fetch_on_mount = yes;
        self
    }
    pub fn stop_on_repeated_cursor(mut self, yes: bool) -> Self {
        self.stop_on_repeated_cursor = yes;
        self
    }
}

pub enum LoaderEvent<C, I> {
    /// Observer report; `binding` identifies the observer that produced it.
    Visibility { binding: u64, visible: bool },
    FetchNext,
    Retry,
    FetchDone {
        generation: u64,
        result: FetchResult<C, I>,
    },
    SentinelChanged,
    SetQueryKey(String),
    Dispose,
}

enum Effect<C> {
    Fetch { cursor: Option<C>, generation: u64 },
    Rebind,
}

/// Completes one page request. Dropping it unresolved fails the request so
/// the loader never stays stuck in `Loading`.
pub struct FetchResponder<C: 'static, I: 'static> {
    loader: Weak<Shared<C, I>>,
    generation: u64,
    done: bool,
}

impl<C: Clone + PartialEq + 'static, I: Clone + 'static> FetchResponder<C, I> {
    pub fn resolve(mut self, result: FetchResult<C, I>) {
        self.done = true;
        self.deliver(result);
    }

    pub fn succeed(self, page: Page<C, I>) {
        self.resolve(Ok(page));
    }

    pub fn fail(self, message: impl Into<String>) {
        self.resolve(Err(HarborError::FetchFailure(message.into())));
    }

    /// False once the loader is gone; the result would be discarded anyway.
    pub fn is_wanted(&self) -> bool {
        self.loader
            .upgrade()
            .is_some_and(|s| !s.core.borrow().disposed && s.core.borrow().generation == self.generation)
    }

    fn deliver(&self, result: FetchResult<C, I>) {
        if let Some(shared) = self.loader.upgrade() {
            Shared::handle(
                &shared,
                LoaderEvent::FetchDone {
                    generation: self.generation,
                    result,
                },
            );
        }
    }
}

impl<C: 'static, I: 'static> Drop for FetchResponder<C, I> {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        // generic bounds needed by `deliver` are not available here
        if let Some(shared) = self.loader.upgrade() {
            (shared.abandon)(&shared, self.generation);
        }
    }
}

struct Core<C> {
    query_key: String,
    generation: u64,
    in_flight: bool,
    seen_cursors: Vec<C>,
    observer: Option<IntersectionObserver>,
    /// Identifies the live observer; reports from older ones are stale.
    binding: u64,
    bound_to: Option<(ElementId, bool)>,
    sentinel_sub: Option<SubId>,
    disposed: bool,
}

struct Shared<C: 'static, I: 'static> {
    state: Signal<LoaderState<C, I>>,
    core: RefCell<Core<C>>,
    fetch: FetchPage<C, I>,
    options: LoaderOptions<C, I>,
    viewport: Viewport,
    sentinel: SentinelRef,
    queue: RefCell<VecDeque<LoaderEvent<C, I>>>,
    dispatching: Cell<bool>,
    /// Set when a dispose is queued, before it is processed.
    closing: Cell<bool>,
    abandon: fn(&Rc<Shared<C, I>>, u64),
}

pub struct IncrementalLoader<C: 'static, I: 'static> {
    shared: Rc<Shared<C, I>>,
}

impl<C: 'static, I: 'static> Clone for IncrementalLoader<C, I> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<C: Clone + PartialEq + 'static, I: Clone + 'static> IncrementalLoader<C, I> {
    pub fn new(
        query_key: impl Into<String>,
        viewport: &Viewport,
        fetch_page: impl Fn(Option<C>, FetchResponder<C, I>) + 'static,
        options: LoaderOptions<C, I>,
    ) -> Self {
        let fetch_on_mount = options.fetch_on_mount;
        let shared = Rc::new(Shared {
            state: Signal::new(LoaderState::default()),
            core: RefCell::new(Core {
                query_key: query_key.into(),
                generation: 0,
                in_flight: false,
                seen_cursors: Vec::new(),
                observer: None,
                binding: 0,
                bound_to: None,
                sentinel_sub: None,
                disposed: false,
            }),
            fetch: Rc::new(fetch_page),
            options,
            viewport: viewport.clone(),
            sentinel: SentinelRef::new(),
            queue: RefCell::new(VecDeque::new()),
            dispatching: Cell::new(false),
            closing: Cell::new(false),
            abandon: Shared::abandon,
        });

        let weak = Rc::downgrade(&shared);
        let sub = shared.sentinel.subscribe(move |_| {
            if let Some(shared) = weak.upgrade() {
                Shared::handle(&shared, LoaderEvent::SentinelChanged);
            }
        });
        shared.core.borrow_mut().sentinel_sub = Some(sub);

        if fetch_on_mount {
            Shared::handle(&shared, LoaderEvent::FetchNext);
        }
        Self { shared }
    }

    /// Slot the list view fills with its sentinel element.
    pub fn sentinel(&self) -> SentinelRef {
        self.shared.sentinel.clone()
    }

    pub fn state(&self) -> LoaderState<C, I> {
        self.shared.state.get()
    }

    pub fn signal(&self) -> Signal<LoaderState<C, I>> {
        self.shared.state.clone()
    }

    pub fn subscribe(&self, f: impl Fn(&LoaderState<C, I>) + 'static) -> SubId {
        self.shared.state.subscribe(f)
    }

    pub fn unsubscribe(&self, id: SubId) -> bool {
        self.shared.state.unsubscribe(id)
    }

    pub fn pages(&self) -> Vec<Page<C, I>> {
        self.shared.state.with(|s| s.pages.clone())
    }

    /// All items of all pages, in order.
    pub fn items(&self) -> Vec<I> {
        self.shared
            .state
            .with(|s| s.pages.iter().flat_map(|p| p.items.iter().cloned()).collect())
    }

    pub fn status(&self) -> LoadStatus {
        self.shared.state.with(|s| s.status)
    }

    pub fn has_next_page(&self) -> bool {
        self.shared.state.with(|s| s.has_next_page)
    }

    pub fn is_loading(&self) -> bool {
        self.status() == LoadStatus::Loading
    }

    pub fn is_success(&self) -> bool {
        self.status() == LoadStatus::Success
    }

    pub fn is_error(&self) -> bool {
        self.status() == LoadStatus::Error
    }

    pub fn error(&self) -> Option<String> {
        self.shared.state.with(|s| s.error.clone())
    }

    pub fn query_key(&self) -> String {
        self.shared.core.borrow().query_key.clone()
    }

    /// True as soon as a dispose has been requested.
    pub fn is_disposed(&self) -> bool {
        self.shared.closing.get() || self.shared.core.borrow().disposed
    }

    /// Whether an observer is currently bound to the sentinel.
    pub fn is_observing(&self) -> bool {
        self.shared
            .core
            .borrow()
            .observer
            .as_ref()
            .is_some_and(|o| o.is_connected())
    }

    pub fn fetch_next_page(&self) {
        self.handle(LoaderEvent::FetchNext);
    }

    /// Re-attempt the failed cursor. No-op unless the last fetch failed.
    pub fn retry(&self) {
        self.handle(LoaderEvent::Retry);
    }

    /// Switching to a different key starts over from an empty `Idle` state.
    pub fn set_query_key(&self, key: impl Into<String>) {
        self.handle(LoaderEvent::SetQueryKey(key.into()));
    }

    pub fn dispose(&self) {
        self.handle(LoaderEvent::Dispose);
    }

    pub fn handle(&self, event: LoaderEvent<C, I>) {
        Shared::handle(&self.shared, event);
    }
}

impl<C: Clone + PartialEq + 'static, I: Clone + 'static> Shared<C, I> {
    fn handle(this: &Rc<Self>, event: LoaderEvent<C, I>) {
        if let LoaderEvent::Dispose = event {
            this.closing.set(true);
        }
        this.queue.borrow_mut().push_back(event);
        if this.dispatching.replace(true) {
            return;
        }
        loop {
            let next = this.queue.borrow_mut().pop_front();
            let Some(event) = next else { break };
            for effect in Self::process(this, event) {
                Self::apply(this, effect);
            }
        }
        this.dispatching.set(false);
    }

    fn abandon(this: &Rc<Self>, generation: u64) {
        Self::handle(
            this,
            LoaderEvent::FetchDone {
                generation,
                result: Err(HarborError::FetchFailure(
                    "request dropped without a response".into(),
                )),
            },
        );
    }

    fn process(this: &Rc<Self>, event: LoaderEvent<C, I>) -> Vec<Effect<C>> {
        let mut effects = Vec::new();
        if this.core.borrow().disposed {
            if let LoaderEvent::FetchDone { .. } = event {
                log::debug!("loader: completion after dispose discarded");
            }
            return effects;
        }

        match event {
            LoaderEvent::Visibility { binding, visible } => {
                if binding != this.core.borrow().binding {
                    log::trace!("loader: report from released observer {binding} ignored");
                } else if visible {
                    Self::begin_fetch(this, &mut effects);
                }
            }
            LoaderEvent::FetchNext => Self::begin_fetch(this, &mut effects),
            LoaderEvent::Retry => {
                if this.state.with(|s| s.status) == LoadStatus::Error {
                    Self::begin_fetch(this, &mut effects);
                }
            }
            LoaderEvent::FetchDone { generation, result } => {
                Self::complete(this, generation, result, &mut effects);
            }
            LoaderEvent::SentinelChanged => effects.push(Effect::Rebind),
            LoaderEvent::SetQueryKey(key) => {
                {
                    let mut core = this.core.borrow_mut();
                    if core.query_key == key {
                        return effects;
                    }
                    log::debug!("loader: query key {} -> {}", core.query_key, key);
                    core.query_key = key;
                    core.generation += 1;
                    core.in_flight = false;
                    core.seen_cursors.clear();
                    // force a fresh observer so the new key gets an initial report
                    core.bound_to = None;
                }
                this.state.set(LoaderState::default());
                effects.push(Effect::Rebind);
                if this.options.fetch_on_mount {
                    Self::begin_fetch(this, &mut effects);
                }
            }
            LoaderEvent::Dispose => {
                let (observer, sub) = {
                    let mut core = this.core.borrow_mut();
                    core.disposed = true;
                    core.in_flight = false;
                    core.bound_to = None;
                    core.binding += 1;
                    (core.observer.take(), core.sentinel_sub.take())
                };
                if let Some(o) = observer {
                    o.disconnect();
                }
                if let Some(sub) = sub {
                    this.sentinel.unsubscribe(sub);
                }
                this.queue.borrow_mut().clear();
                log::debug!("loader: disposed");
            }
        }
        effects
    }

    fn begin_fetch(this: &Rc<Self>, effects: &mut Vec<Effect<C>>) {
        let (has_next, cursor) = this.state.with(|s| (s.has_next_page, s.cursor.clone()));
        let generation = {
            let mut core = this.core.borrow_mut();
            if core.in_flight || !has_next {
                return;
            }
            core.in_flight = true;
            core.generation
        };
        this.state.update(|s| {
            s.status = LoadStatus::Loading;
            s.error = None;
        });
        effects.push(Effect::Fetch { cursor, generation });
    }

    fn complete(
        this: &Rc<Self>,
        generation: u64,
        result: FetchResult<C, I>,
        effects: &mut Vec<Effect<C>>,
    ) {
        {
            let mut core = this.core.borrow_mut();
            if generation != core.generation || !core.in_flight {
                log::debug!("loader: stale completion (gen {generation}) discarded");
                return;
            }
            core.in_flight = false;
        }

        match result {
            Ok(page) => {
                let mut next = (this.options.get_next_cursor)(&page);
                if let Some(c) = next.clone() {
                    let mut core = this.core.borrow_mut();
                    if this.options.stop_on_repeated_cursor && core.seen_cursors.contains(&c) {
                        log::warn!(
                            "loader '{}': page returned a cursor seen before; stopping pagination",
                            core.query_key
                        );
                        next = None;
                    } else {
                        core.seen_cursors.push(c);
                    }
                }
                let had_next = this.state.with(|s| s.has_next_page);
                let has_next = next.is_some();
                this.state.update(|s| {
                    s.pages.push(page);
                    s.cursor = next;
                    s.has_next_page = has_next;
                    s.status = LoadStatus::Success;
                    s.error = None;
                });
                if had_next != has_next {
                    effects.push(Effect::Rebind);
                }
            }
            Err(e) => {
                log::warn!("loader '{}': {e}", this.core.borrow().query_key);
                this.state.update(|s| {
                    s.status = LoadStatus::Error;
                    s.error = Some(e.to_string());
                });
            }
        }
    }

    fn apply(this: &Rc<Self>, effect: Effect<C>) {
        // a subscriber may have queued a dispose while this batch was produced
        if this.closing.get() || this.core.borrow().disposed {
            return;
        }
        match effect {
            Effect::Fetch { cursor, generation } => {
                let responder = FetchResponder {
                    loader: Rc::downgrade(this),
                    generation,
                    done: false,
                };
                (this.fetch)(cursor, responder);
            }
            Effect::Rebind => Self::rebind(this),
        }
    }

    /// Release the current observer, then bind a new one to the sentinel if
    /// there is one and more pages may follow.
    fn rebind(this: &Rc<Self>) {
        let sentinel = this.sentinel.current();
        let has_next = this.state.with(|s| s.has_next_page);
        let desired = sentinel.map(|el| (el, has_next));

        let (old, binding) = {
            let mut core = this.core.borrow_mut();
            if core.disposed || (core.bound_to == desired && core.observer.is_some()) {
                return;
            }
            core.binding += 1;
            core.bound_to = desired;
            (core.observer.take(), core.binding)
        };
        if let Some(old) = old {
            old.disconnect();
        }

        let Some(el) = sentinel.filter(|_| has_next) else {
            return;
        };
        let weak = Rc::downgrade(this);
        let observer = IntersectionObserver::new(&this.viewport, this.options.threshold, move |entries| {
            let Some(shared) = weak.upgrade() else { return };
            let visible = entries
                .iter()
                .rev()
                .find(|e| e.target == el)
                .is_some_and(|e| e.is_intersecting);
            Shared::handle(&shared, LoaderEvent::Visibility { binding, visible });
        });
        this.core.borrow_mut().observer = Some(observer);
        // observe after storing so the initial report sees the new binding
        if let Some(o) = this.core.borrow().observer.as_ref() {
            o.observe(el);
        }
    }
}

impl<C: 'static, I: 'static> Drop for Shared<C, I> {
    fn drop(&mut self) {
        let core = self.core.get_mut();
        if let Some(o) = core.observer.take() {
            o.disconnect();
        }
        if let Some(sub) = core.sentinel_sub.take() {
            self.sentinel.unsubscribe(sub);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Rect, Vec2};

    type Pending = Rc<RefCell<Vec<(Option<u32>, FetchResponder<u32, u32>)>>>;

    fn manual_fetch() -> (Pending, impl Fn(Option<u32>, FetchResponder<u32, u32>) + 'static) {
        let pending: Pending = Rc::new(RefCell::new(Vec::new()));
        let p = pending.clone();
        (pending, move |cursor: Option<u32>, responder: FetchResponder<u32, u32>| {
            p.borrow_mut().push((cursor, responder))
        })
    }

    fn viewport_with_sentinel(y: f32) -> (Viewport, ElementId) {
        let vp = Viewport::new(Rect::new(0.0, 0.0, 100.0, 100.0));
        let el = vp.mount_element(Rect::new(0.0, y, 100.0, 1.0));
        (vp, el)
    }

    #[test]
    fn visible_sentinel_triggers_first_fetch() {
        let (vp, el) = viewport_with_sentinel(50.0);
        let (pending, fetch) = manual_fetch();
        let loader = IncrementalLoader::new("feed", &vp, fetch, LoaderOptions::default());
        assert_eq!(loader.status(), LoadStatus::Idle);

        loader.sentinel().set(Some(el));
        assert!(loader.is_loading());
        assert_eq!(pending.borrow().len(), 1);
        assert_eq!(pending.borrow()[0].0, None);

        let (_, r) = pending.borrow_mut().remove(0);
        r.succeed(Page::new(vec![1, 2], Some(10)));
        assert!(loader.is_success());
        assert_eq!(loader.items(), vec![1, 2]);
        assert!(loader.has_next_page());
    }

    #[test]
    fn hidden_sentinel_does_not_fetch() {
        let (vp, el) = viewport_with_sentinel(500.0);
        let (pending, fetch) = manual_fetch();
        let loader = IncrementalLoader::new("feed", &vp, fetch, LoaderOptions::default());
        loader.sentinel().set(Some(el));
        assert!(pending.borrow().is_empty());
        assert!(loader.is_observing());

        vp.scroll_to(Vec2 { x: 0.0, y: 450.0 });
        assert_eq!(pending.borrow().len(), 1);
    }

    #[test]
    fn error_is_retryable_with_same_cursor() {
        let (vp, el) = viewport_with_sentinel(50.0);
        let (pending, fetch) = manual_fetch();
        let loader = IncrementalLoader::new("feed", &vp, fetch, LoaderOptions::default());
        loader.sentinel().set(Some(el));
        let (_, r) = pending.borrow_mut().remove(0);
        r.succeed(Page::new(vec![1], Some(7)));

        loader.fetch_next_page();
        let (cursor, r) = pending.borrow_mut().remove(0);
        assert_eq!(cursor, Some(7));
        r.fail("503");
        assert!(loader.is_error());
        assert_eq!(loader.error().as_deref(), Some("page fetch failed: 503"));

        loader.retry();
        let (cursor, r) = pending.borrow_mut().remove(0);
        assert_eq!(cursor, Some(7));
        r.succeed(Page::new(vec![2], None));
        assert_eq!(loader.items(), vec![1, 2]);
        assert!(!loader.has_next_page());
        assert!(!loader.is_observing());
    }

    #[test]
    fn dispose_from_a_loading_subscriber_cancels_the_fetch() {
        let (vp, _el) = viewport_with_sentinel(50.0);
        let (pending, fetch) = manual_fetch();
        let loader = IncrementalLoader::new("feed", &vp, fetch, LoaderOptions::default());
        let handle = loader.clone();
        loader.subscribe(move |s| {
            if s.status == LoadStatus::Loading {
                handle.dispose();
            }
        });

        loader.fetch_next_page();
        assert!(pending.borrow().is_empty());
        assert!(loader.is_disposed());
        assert!(!loader.is_observing());

        loader.fetch_next_page();
        assert!(pending.borrow().is_empty());
    }

    #[test]
    fn retry_without_error_is_noop() {
        let (vp, _el) = viewport_with_sentinel(50.0);
        let (pending, fetch) = manual_fetch();
        let loader = IncrementalLoader::new("feed", &vp, fetch, LoaderOptions::default());
        loader.retry();
        assert!(pending.borrow().is_empty());
        assert_eq!(loader.status(), LoadStatus::Idle);
    }

    #[test]
    fn dropped_responder_fails_the_request() {
        let (vp, _el) = viewport_with_sentinel(50.0);
        let loader = IncrementalLoader::new(
            "feed",
            &vp,
            |_c: Option<u32>, r: FetchResponder<u32, u32>| drop(r),
            LoaderOptions::default(),
        );
        loader.fetch_next_page();
        assert!(loader.is_error());
    }

    #[test]
    fn synchronous_fetch_is_processed_after_the_trigger() {
        let (vp, el) = viewport_with_sentinel(50.0);
        let calls = Rc::new(Cell::new(0u32));
        let c = calls.clone();
        let loader = IncrementalLoader::new(
            "feed",
            &vp,
            move |cursor: Option<u32>, r: FetchResponder<u32, u32>| {
                c.set(c.get() + 1);
                let n = cursor.unwrap_or(0);
                r.succeed(Page::new(vec![n], (n < 2).then_some(n + 1)));
            },
            LoaderOptions::default(),
        );
        loader.sentinel().set(Some(el));
        // the sentinel stays visible, so each rebind does not re-trigger;
        // only explicit requests advance
        assert_eq!(calls.get(), 1);
        loader.fetch_next_page();
        loader.fetch_next_page();
        loader.fetch_next_page();
        assert_eq!(loader.items(), vec![0, 1, 2]);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn repeated_cursor_stops_pagination() {
        let (vp, _el) = viewport_with_sentinel(50.0);
        let loader = IncrementalLoader::new(
            "feed",
            &vp,
            |_c: Option<u32>, r: FetchResponder<u32, u32>| r.succeed(Page::new(vec![1], Some(5))),
            LoaderOptions::default(),
        );
        loader.fetch_next_page();
        assert!(loader.has_next_page());
        loader.fetch_next_page();
        assert_eq!(loader.pages().len(), 2);
        assert!(!loader.has_next_page());
    }

    #[test]
    fn repeated_cursor_allowed_when_guard_disabled() {
        let (vp, _el) = viewport_with_sentinel(50.0);
        let loader = IncrementalLoader::new(
            "feed",
            &vp,
            |_c: Option<u32>, r: FetchResponder<u32, u32>| r.succeed(Page::new(vec![1], Some(5))),
            LoaderOptions::default().stop_on_repeated_cursor(false),
        );
        for _ in 0..4 {
            loader.fetch_next_page();
        }
        assert_eq!(loader.pages().len(), 4);
        assert!(loader.has_next_page());
    }

    #[test]
    fn custom_next_cursor() {
        let (vp, _el) = viewport_with_sentinel(50.0);
        let loader = IncrementalLoader::new(
            "feed",
            &vp,
            |c: Option<u32>, r: FetchResponder<u32, u32>| {
                let n = c.unwrap_or(1);
                r.succeed(Page::new(vec![n; n as usize], None))
            },
            LoaderOptions::default()
                .with_next_cursor(|p: &Page<u32, u32>| (p.items.len() < 3).then(|| p.items.len() as u32 + 1)),
        );
        loader.fetch_next_page();
        loader.fetch_next_page();
        loader.fetch_next_page();
        loader.fetch_next_page();
        assert_eq!(loader.items(), vec![1, 2, 2, 3, 3, 3]);
    }

    #[test]
    fn query_key_change_discards_in_flight_and_restarts() {
        let (vp, _el) = viewport_with_sentinel(50.0);
        let (pending, fetch) = manual_fetch();
        let loader = IncrementalLoader::new(
            "search:a",
            &vp,
            fetch,
            LoaderOptions::default().fetch_on_mount(true),
        );
        assert_eq!(pending.borrow().len(), 1);
        let (_, stale) = pending.borrow_mut().remove(0);

        loader.set_query_key("search:b");
        assert_eq!(loader.query_key(), "search:b");
        assert!(loader.is_loading());
        assert!(!stale.is_wanted());
        stale.succeed(Page::new(vec![99], None));
        assert!(loader.pages().is_empty());
        assert!(loader.is_loading());

        let (_, fresh) = pending.borrow_mut().remove(0);
        fresh.succeed(Page::new(vec![1], None));
        assert_eq!(loader.items(), vec![1]);
    }
}
