//! Debounced values.
//!
//! A [`Debounced`] republishes its input only after the input has been
//! quiet for `delay`. Each new input cancels the armed timer and re-arms it,
//! so a burst emits only its last value, no earlier than `delay` after that
//! last input.

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;

use crate::signal::{Signal, SubId};
use crate::timer::{TimerId, Timers};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DebouncePhase {
    /// Nothing waiting; the output equals the last input.
    Settled,
    /// An input arrived and the timer is armed.
    Pending,
    Disposed,
}

pub enum DebounceEvent<T> {
    Input(T),
    /// Timer expiry for the given generation.
    Fire(u64),
    SetDelay(Duration),
    Dispose,
}

pub struct Debounced<T: Clone + 'static> {
    shared: Rc<Shared<T>>,
}

struct Shared<T: 'static> {
    state: RefCell<State<T>>,
    output: Signal<T>,
}

struct State<T> {
    timers: Timers,
    delay: Duration,
    armed: Option<TimerId>,
    latest: Option<T>,
    generation: u64,
    disposed: bool,
}

impl<T: Clone + 'static> Clone for Debounced<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T: Clone + 'static> Debounced<T> {
    pub fn new(timers: Timers, initial: T, delay: Duration) -> Self {
        Self {
            shared: Rc::new(Shared {
                state: RefCell::new(State {
                    timers,
                    delay,
                    armed: None,
                    latest: None,
                    generation: 0,
                    disposed: false,
                }),
                output: Signal::new(initial),
            }),
        }
    }

    /// The debounced output.
    pub fn get(&self) -> T {
        self.shared.output.get()
    }

    pub fn push(&self, value: T) {
        self.handle(DebounceEvent::Input(value));
    }

    pub fn set_delay(&self, delay: Duration) {
        self.handle(DebounceEvent::SetDelay(delay));
    }

    pub fn dispose(&self) {
        self.handle(DebounceEvent::Dispose);
    }

    pub fn phase(&self) -> DebouncePhase {
        let st = self.shared.state.borrow();
        if st.disposed {
            DebouncePhase::Disposed
        } else if st.armed.is_some() {
            DebouncePhase::Pending
        } else {
            DebouncePhase::Settled
        }
    }

    pub fn subscribe(&self, f: impl Fn(&T) + 'static) -> SubId {
        self.shared.output.subscribe(f)
    }

    pub fn unsubscribe(&self, id: SubId) -> bool {
        self.shared.output.unsubscribe(id)
    }

    pub fn signal(&self) -> Signal<T> {
        self.shared.output.clone()
    }

    /// Every transition goes through here.
    pub fn handle(&self, event: DebounceEvent<T>) {
        Shared::handle(&self.shared, event);
    }
}

impl<T: Clone + 'static> Shared<T> {
    fn handle(this: &Rc<Self>, event: DebounceEvent<T>) {
        let emit = {
            let mut st = this.state.borrow_mut();
            if st.disposed {
                return;
            }
            match event {
                DebounceEvent::Input(v) => {
                    st.latest = Some(v);
                    Self::arm(this, &mut st);
                    None
                }
                DebounceEvent::SetDelay(d) => {
                    st.delay = d;
                    if st.armed.is_some() {
                        Self::arm(this, &mut st);
                    }
                    None
                }
                DebounceEvent::Fire(generation) => {
                    if generation != st.generation || st.armed.is_none() {
                        log::trace!("debounce: stale timer (gen {generation}) ignored");
                        None
                    } else {
                        st.armed = None;
                        st.latest.take()
                    }
                }
                DebounceEvent::Dispose => {
                    if let Some(id) = st.armed.take() {
                        st.timers.clear_timeout(id);
                    }
                    st.latest = None;
                    st.disposed = true;
                    None
                }
            }
        };
        if let Some(v) = emit {
            this.output.set(v);
        }
    }

    /// Cancel any armed timer and start a fresh quiet window.
    fn arm(this: &Rc<Self>, st: &mut State<T>) {
        if let Some(id) = st.armed.take() {
            st.timers.clear_timeout(id);
        }
        st.generation += 1;
        let generation = st.generation;
        let weak: Weak<Self> = Rc::downgrade(this);
        let id = st.timers.set_timeout(st.delay, move || {
            if let Some(this) = weak.upgrade() {
                Self::handle(&this, DebounceEvent::Fire(generation));
            }
        });
        st.armed = Some(id);
    }
}

impl<T: 'static> Drop for Shared<T> {
    fn drop(&mut self) {
        let st = self.state.get_mut();
        if let Some(id) = st.armed.take() {
            st.timers.clear_timeout(id);
        }
    }
}
