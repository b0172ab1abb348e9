use std::cell::RefCell;
use std::rc::Rc;

use slotmap::{SlotMap, new_key_type};

new_key_type! {
    pub struct SubId;
}

type Subscriber<T> = Rc<dyn Fn(&T)>;

#[derive(Clone)]
pub struct Signal<T: 'static>(Rc<RefCell<Inner<T>>>);

struct Inner<T> {
    value: T,
    subs: SlotMap<SubId, Subscriber<T>>,
}

impl<T> Signal<T> {
    pub fn new(value: T) -> Self {
        Self(Rc::new(RefCell::new(Inner {
            value,
            subs: SlotMap::with_key(),
        })))
    }
    /// Borrow the current value without cloning it.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.0.borrow().value)
    }
    /// Replace the value without notifying; pair with [`Signal::notify`]
    /// when a side effect must land between the write and the fan-out.
    pub fn replace(&self, v: T) -> T {
        std::mem::replace(&mut self.0.borrow_mut().value, v)
    }
    /// Subscribers run after the write with nothing borrowed, so they may
    /// write the signal back or (un)subscribe.
    pub fn subscribe(&self, f: impl Fn(&T) + 'static) -> SubId {
        self.0.borrow_mut().subs.insert(Rc::new(f))
    }
    pub fn unsubscribe(&self, id: SubId) -> bool {
        self.0.borrow_mut().subs.remove(id).is_some()
    }
    pub fn subscriber_count(&self) -> usize {
        self.0.borrow().subs.len()
    }
}

impl<T: Clone> Signal<T> {
    pub fn get(&self) -> T {
        self.0.borrow().value.clone()
    }
    pub fn set(&self, v: T) {
        self.0.borrow_mut().value = v;
        self.notify();
    }
    pub fn update<F: FnOnce(&mut T)>(&self, f: F) {
        f(&mut self.0.borrow_mut().value);
        self.notify();
    }

    pub fn notify(&self) {
        // every subscriber sees the value as of this write
        let (value, subs): (T, Vec<(SubId, Subscriber<T>)>) = {
            let inner = self.0.borrow();
            let subs = inner.subs.iter().map(|(id, s)| (id, s.clone())).collect();
            (inner.value.clone(), subs)
        };
        for (id, s) in subs {
            // removed by an earlier subscriber
            if !self.0.borrow().subs.contains_key(id) {
                continue;
            }
            s(&value);
        }
    }
}

pub fn signal<T>(t: T) -> Signal<T> {
    Signal::new(t)
}
