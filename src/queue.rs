//! Thread-safe shared mailbox of addressed packs.
//!
//! One `PackQueue` instance is shared by every worker of an agency. Delivery
//! order is strict FIFO: elements leave from the front only, except for the
//! bulk [`drop_for`](PackQueue::drop_for) eviction used when a worker is
//! killed, which removes interior elements while preserving the relative
//! order of the rest.
//!
//! The [`hold`](PackQueue::hold) guard exposes the queue's own lock for the
//! peek-then-act sequence worker loops depend on: no other thread can slip in
//! between inspecting the front pack and consuming it.

use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::pack::Pack;

struct Inner<T> {
    packs: VecDeque<Pack<T>>,
    finished: bool,
}

/// Mutex/condvar-guarded FIFO of [`Pack`]s.
pub struct PackQueue<T> {
    inner: Mutex<Inner<T>>,
    available: Condvar,
}

impl<T> Default for PackQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> PackQueue<T> {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                packs: VecDeque::new(),
                finished: false,
            }),
            available: Condvar::new(),
        }
    }

    /// Append a pack at the back and wake one blocked consumer.
    ///
    /// Never fails and never blocks the producer.
    pub fn produce(&self, pack: Pack<T>) {
        let mut inner = self.inner.lock();
        inner.packs.push_back(pack);
        self.available.notify_one();
    }

    /// Pop the front pack without blocking. `None` when the queue is empty.
    pub fn consume(&self) -> Option<Pack<T>> {
        self.inner.lock().packs.pop_front()
    }

    /// Pop the front pack, blocking until one is available.
    ///
    /// Returns `None` (without an element) once [`finish`](Self::finish) has
    /// been called and the queue is empty, so blocked waiters can shut down
    /// cleanly.
    pub fn consume_sync(&self) -> Option<Pack<T>> {
        let mut inner = self.inner.lock();
        while inner.packs.is_empty() {
            if inner.finished {
                return None;
            }
            self.available.wait(&mut inner);
        }
        inner.packs.pop_front()
    }

    /// Acquire the queue's internal lock for a multi-step peek-then-act
    /// sequence. The lock is released when the returned guard drops.
    pub fn hold(&self) -> Held<'_, T> {
        Held {
            guard: self.inner.lock(),
        }
    }

    /// Remove every pack addressed to `recipient`, preserving the relative
    /// order of the remaining packs. Used when a worker is killed so that
    /// mail no one will ever read stops clogging the mailbox.
    pub fn drop_for(&self, recipient: &str) {
        self.inner.lock().packs.retain(|pack| pack.recipient != recipient);
    }

    /// Signal all blocked [`consume_sync`](Self::consume_sync) callers to
    /// wake up and return `None` once the queue empties.
    pub fn finish(&self) {
        let mut inner = self.inner.lock();
        inner.finished = true;
        self.available.notify_all();
    }

    /// Pop everything currently queued. Used by the agency's shutdown drain.
    pub fn drain(&self) -> Vec<Pack<T>> {
        self.inner.lock().packs.drain(..).collect()
    }

    /// Number of packs currently queued.
    pub fn len(&self) -> usize {
        self.inner.lock().packs.len()
    }

    /// Whether the queue is currently empty.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().packs.is_empty()
    }
}

/// Exclusive hold on the mailbox, released on drop.
pub struct Held<'a, T> {
    guard: MutexGuard<'a, Inner<T>>,
}

impl<T> Held<'_, T> {
    /// Non-owning view of the front pack, or `None` when empty.
    pub fn peek(&self) -> Option<&Pack<T>> {
        self.guard.packs.front()
    }

    /// Pop the front pack while the hold is kept.
    pub fn consume(&mut self) -> Option<Pack<T>> {
        self.guard.packs.pop_front()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
