//! # Viewport visibility
//!
//! A small model of the browser's intersection API. The host owns a
//! [`Viewport`] and reports geometry to it (viewport bounds, element rects,
//! scroll offset). [`IntersectionObserver`]s watch elements and are called
//! with a batch of [`IntersectionEntry`]s whenever a watched element crosses
//! the observer's threshold, plus once when observation starts.
//!
//! An element is *intersecting* when `ratio >= threshold` (for a threshold of
//! `0.0`: any overlap). With the usual `1.0` the element must be entirely
//! inside the viewport.
//!
//! Callbacks run with no internal borrow held, so they may observe,
//! unobserve or disconnect. A batch computed for an observer that is
//! disconnected before its turn is dropped, never delivered.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use slotmap::{SlotMap, new_key_type};
use smallvec::SmallVec;

use crate::geometry::{Rect, Vec2};
use crate::signal::{Signal, SubId};

new_key_type! {
    pub struct ElementId;
    pub struct ObserverId;
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IntersectionEntry {
    pub target: ElementId,
    pub ratio: f32,
    pub is_intersecting: bool,
}

pub type EntryBatch = SmallVec<[IntersectionEntry; 4]>;

type Callback = Rc<dyn Fn(&[IntersectionEntry])>;

struct Registration {
    threshold: f32,
    callback: Callback,
    /// Last reported intersecting state per target; `None` until the
    /// initial entry has been delivered.
    targets: HashMap<ElementId, Option<bool>>,
}

struct ViewportInner {
    bounds: Rect,
    scroll: Vec2,
    elements: SlotMap<ElementId, Rect>,
    observers: SlotMap<ObserverId, Registration>,
}

#[derive(Clone)]
pub struct Viewport {
    inner: Rc<RefCell<ViewportInner>>,
}

fn intersecting(ratio: f32, threshold: f32) -> bool {
    if threshold <= 0.0 {
        ratio > 0.0
    } else {
        ratio >= threshold
    }
}

impl Viewport {
    pub fn new(bounds: Rect) -> Self {
        Self {
            inner: Rc::new(RefCell::new(ViewportInner {
                bounds,
                scroll: Vec2::default(),
                elements: SlotMap::with_key(),
                observers: SlotMap::with_key(),
            })),
        }
    }

    pub fn bounds(&self) -> Rect {
        self.inner.borrow().bounds
    }

    pub fn set_bounds(&self, bounds: Rect) {
        self.inner.borrow_mut().bounds = bounds;
        self.flush();
    }

    pub fn scroll_offset(&self) -> Vec2 {
        self.inner.borrow().scroll
    }

    pub fn scroll_to(&self, offset: Vec2) {
        self.inner.borrow_mut().scroll = offset;
        self.flush();
    }

    pub fn scroll_by(&self, dy: f32) {
        let mut off = self.scroll_offset();
        off.y += dy;
        self.scroll_to(off);
    }

    /// Register an element at `rect` (content coordinates).
    pub fn mount_element(&self, rect: Rect) -> ElementId {
        let id = self.inner.borrow_mut().elements.insert(rect);
        self.flush();
        id
    }

    pub fn set_element_rect(&self, id: ElementId, rect: Rect) {
        {
            let mut inner = self.inner.borrow_mut();
            match inner.elements.get_mut(id) {
                Some(r) => *r = rect,
                None => {
                    log::debug!("set_element_rect: unknown element {id:?}");
                    return;
                }
            }
        }
        self.flush();
    }

    /// A removed element reports as not intersecting to anyone still
    /// watching it.
    pub fn remove_element(&self, id: ElementId) {
        self.inner.borrow_mut().elements.remove(id);
        self.flush();
    }

    pub fn is_mounted(&self, id: ElementId) -> bool {
        self.inner.borrow().elements.contains_key(id)
    }

    pub fn visible_ratio(&self, id: ElementId) -> f32 {
        self.inner.borrow().ratio(id)
    }

    pub fn observer_count(&self) -> usize {
        self.inner.borrow().observers.len()
    }

    /// Number of live observers watching `id`.
    pub fn watchers_of(&self, id: ElementId) -> usize {
        self.inner
            .borrow()
            .observers
            .values()
            .filter(|r| r.targets.contains_key(&id))
            .count()
    }

    /// Recompute every observed target and deliver threshold crossings.
    pub fn flush(&self) {
        let batches: Vec<(ObserverId, Callback, EntryBatch)> = {
            let mut inner = self.inner.borrow_mut();
            let ViewportInner {
                bounds,
                scroll,
                elements,
                observers,
            } = &mut *inner;
            let mut out = Vec::new();
            for (oid, reg) in observers.iter_mut() {
                let mut batch = EntryBatch::new();
                for (target, last) in reg.targets.iter_mut() {
                    let ratio = ratio_of(elements, *bounds, *scroll, *target);
                    let now = intersecting(ratio, reg.threshold);
                    if *last != Some(now) {
                        *last = Some(now);
                        batch.push(IntersectionEntry {
                            target: *target,
                            ratio,
                            is_intersecting: now,
                        });
                    }
                }
                if !batch.is_empty() {
                    out.push((oid, reg.callback.clone(), batch));
                }
            }
            out
        };

        for (oid, callback, batch) in batches {
            // an earlier callback may have disconnected this observer
            if !self.inner.borrow().observers.contains_key(oid) {
                continue;
            }
            callback(&batch);
        }
    }

    fn register(&self, threshold: f32, callback: Callback) -> ObserverId {
        self.inner.borrow_mut().observers.insert(Registration {
            threshold: threshold.clamp(0.0, 1.0),
            callback,
            targets: HashMap::new(),
        })
    }

    fn observe(&self, oid: ObserverId, el: ElementId) {
        let added = match self.inner.borrow_mut().observers.get_mut(oid) {
            Some(reg) => reg.targets.insert(el, None).is_none(),
            None => false,
        };
        if added {
            self.flush();
        }
    }

    fn unobserve(&self, oid: ObserverId, el: ElementId) {
        if let Some(reg) = self.inner.borrow_mut().observers.get_mut(oid) {
            reg.targets.remove(&el);
        }
    }

    fn disconnect(&self, oid: ObserverId) -> bool {
        self.inner.borrow_mut().observers.remove(oid).is_some()
    }

    fn is_registered(&self, oid: ObserverId) -> bool {
        self.inner.borrow().observers.contains_key(oid)
    }
}

impl ViewportInner {
    fn ratio(&self, id: ElementId) -> f32 {
        ratio_of(&self.elements, self.bounds, self.scroll, id)
    }
}

fn ratio_of(elements: &SlotMap<ElementId, Rect>, bounds: Rect, scroll: Vec2, id: ElementId) -> f32 {
    elements
        .get(id)
        .map(|r| r.translate(-scroll.x, -scroll.y).visible_ratio(&bounds))
        .unwrap_or(0.0)
}

/// Watches elements of one [`Viewport`]. Dropping the observer disconnects it.
pub struct IntersectionObserver {
    id: ObserverId,
    viewport: Viewport,
}

impl IntersectionObserver {
    pub fn new(
        viewport: &Viewport,
        threshold: f32,
        callback: impl Fn(&[IntersectionEntry]) + 'static,
    ) -> Self {
        let id = viewport.register(threshold, Rc::new(callback));
        Self {
            id,
            viewport: viewport.clone(),
        }
    }

    /// Start watching `el`; the initial state is reported right away.
    pub fn observe(&self, el: ElementId) {
        self.viewport.observe(self.id, el);
    }

    pub fn unobserve(&self, el: ElementId) {
        self.viewport.unobserve(self.id, el);
    }

    pub fn disconnect(&self) {
        if self.viewport.disconnect(self.id) {
            log::trace!("intersection observer {:?} disconnected", self.id);
        }
    }

    pub fn is_connected(&self) -> bool {
        self.viewport.is_registered(self.id)
    }
}

impl Drop for IntersectionObserver {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Slot a view fills with its sentinel element. Consumers only read it and
/// subscribe to changes; the view owns the element's lifecycle.
#[derive(Clone)]
pub struct SentinelRef(Signal<Option<ElementId>>);

impl Default for SentinelRef {
    fn default() -> Self {
        Self(Signal::new(None))
    }
}

impl SentinelRef {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn current(&self) -> Option<ElementId> {
        self.0.get()
    }
    pub fn set(&self, el: Option<ElementId>) {
        if self.0.get() != el {
            self.0.set(el);
        }
    }
    pub fn subscribe(&self, f: impl Fn(&Option<ElementId>) + 'static) -> SubId {
        self.0.subscribe(f)
    }
    pub fn unsubscribe(&self, id: SubId) -> bool {
        self.0.unsubscribe(id)
    }
}
