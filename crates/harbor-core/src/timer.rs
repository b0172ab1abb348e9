//! Single-threaded timer queue.
//!
//! `Timers` is the `setTimeout`/`clearTimeout` half of the host event loop.
//! Nothing fires on its own: the loop calls [`Timers::run_due`] each turn and
//! every timer whose deadline has passed runs exactly once, in deadline
//! order. Cancelling a timer that already fired is a no-op.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use slotmap::{SlotMap, new_key_type};
use web_time::Instant;

use crate::clock::{Clock, SystemClock};

new_key_type! {
    pub struct TimerId;
}

struct Entry {
    deadline: Instant,
    seq: u64,
    callback: Box<dyn FnOnce()>,
}

struct Queue {
    entries: SlotMap<TimerId, Entry>,
    next_seq: u64,
}

#[derive(Clone)]
pub struct Timers {
    clock: Rc<dyn Clock>,
    queue: Rc<RefCell<Queue>>,
}

impl Default for Timers {
    fn default() -> Self {
        Self::new(Rc::new(SystemClock))
    }
}

impl Timers {
    pub fn new(clock: Rc<dyn Clock>) -> Self {
        Self {
            clock,
            queue: Rc::new(RefCell::new(Queue {
                entries: SlotMap::with_key(),
                next_seq: 0,
            })),
        }
    }

    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    pub fn set_timeout(&self, delay: Duration, f: impl FnOnce() + 'static) -> TimerId {
        let deadline = self.clock.now() + delay;
        let mut q = self.queue.borrow_mut();
        let seq = q.next_seq;
        q.next_seq += 1;
        q.entries.insert(Entry {
            deadline,
            seq,
            callback: Box::new(f),
        })
    }

    /// Returns true if the timer was still armed.
    pub fn clear_timeout(&self, id: TimerId) -> bool {
        self.queue.borrow_mut().entries.remove(id).is_some()
    }

    pub fn is_armed(&self, id: TimerId) -> bool {
        self.queue.borrow().entries.contains_key(id)
    }

    pub fn pending(&self) -> usize {
        self.queue.borrow().entries.len()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.queue.borrow().entries.values().map(|e| e.deadline).min()
    }

    /// Fire every timer whose deadline is at or before now. Timers armed by a
    /// callback are considered on the same pass if they are already due.
    /// Returns the number of callbacks run.
    pub fn run_due(&self) -> usize {
        let mut fired = 0;
        loop {
            let now = self.clock.now();
            let next = {
                let q = self.queue.borrow();
                q.entries
                    .iter()
                    .filter(|(_, e)| e.deadline <= now)
                    .min_by_key(|(_, e)| (e.deadline, e.seq))
                    .map(|(id, _)| id)
            };
            let Some(id) = next else { break };
            // callback runs with the queue unborrowed so it can re-arm
            let entry = self.queue.borrow_mut().entries.remove(id);
            if let Some(entry) = entry {
                (entry.callback)();
                fired += 1;
            }
        }
        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::cell::RefCell;

    fn timers() -> (ManualClock, Timers) {
        let clock = ManualClock::new();
        let timers = Timers::new(Rc::new(clock.clone()));
        (clock, timers)
    }

    #[test]
    fn fires_in_deadline_order() {
        let (clock, timers) = timers();
        let out = Rc::new(RefCell::new(Vec::new()));
        for (ms, tag) in [(30, "c"), (10, "a"), (20, "b")] {
            let out = out.clone();
            timers.set_timeout(Duration::from_millis(ms), move || out.borrow_mut().push(tag));
        }
        clock.advance(Duration::from_millis(15));
        assert_eq!(timers.run_due(), 1);
        clock.advance(Duration::from_millis(20));
        assert_eq!(timers.run_due(), 2);
        assert_eq!(*out.borrow(), vec!["a", "b", "c"]);
    }

    #[test]
    fn cleared_timer_never_fires() {
        let (clock, timers) = timers();
        let hit = Rc::new(RefCell::new(false));
        let h = hit.clone();
        let id = timers.set_timeout(Duration::from_millis(5), move || *h.borrow_mut() = true);
        assert!(timers.clear_timeout(id));
        assert!(!timers.clear_timeout(id));
        clock.advance(Duration::from_millis(10));
        assert_eq!(timers.run_due(), 0);
        assert!(!*hit.borrow());
    }

    #[test]
    fn callback_can_rearm() {
        let (clock, timers) = timers();
        let count = Rc::new(RefCell::new(0));
        let t2 = timers.clone();
        let c = count.clone();
        timers.set_timeout(Duration::ZERO, move || {
            *c.borrow_mut() += 1;
            let c = c.clone();
            t2.set_timeout(Duration::from_millis(1), move || *c.borrow_mut() += 1);
        });
        assert_eq!(timers.run_due(), 1);
        assert_eq!(timers.pending(), 1);
        clock.advance(Duration::from_millis(1));
        assert_eq!(timers.run_due(), 1);
        assert_eq!(*count.borrow(), 2);
    }
}
