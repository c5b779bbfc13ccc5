//! Thread-safe double-ended queue with blocking wait.
//!
//! `TsQueue` bridges the network I/O thread and application threads. Every
//! operation takes the same internal lock, so each one is atomic with respect
//! to every other operation on the same queue.
//!
//! # Usage
//!
//! ```
//! use framelink_core::TsQueue;
//! use std::sync::Arc;
//! use std::thread;
//!
//! let queue = Arc::new(TsQueue::new());
//!
//! let producer = {
//!     let queue = Arc::clone(&queue);
//!     thread::spawn(move || queue.push_back(42u32))
//! };
//!
//! queue.wait();
//! assert_eq!(queue.pop_front(), Some(42));
//! producer.join().unwrap();
//! ```

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::time::Duration;

/// Thread-safe deque shared between I/O and application threads.
///
/// Pops return `None` on an empty queue. Callers that need a value should
/// check [`is_empty`](Self::is_empty) or block in [`wait`](Self::wait) first.
#[derive(Debug)]
pub struct TsQueue<T> {
    deque: Mutex<VecDeque<T>>,
    not_empty: Condvar,
}

impl<T> TsQueue<T> {
    pub fn new() -> Self {
        Self {
            deque: Mutex::new(VecDeque::new()),
            not_empty: Condvar::new(),
        }
    }

    /// Push to the front. Returns `true` if the queue was empty before the push.
    pub fn push_front(&self, item: T) -> bool {
        let mut deque = self.deque.lock();
        let was_empty = deque.is_empty();
        deque.push_front(item);
        self.not_empty.notify_one();
        was_empty
    }

    /// Push to the back. Returns `true` if the queue was empty before the push.
    ///
    /// The emptiness check and the insertion happen under one lock, so exactly
    /// one of several concurrent pushers onto an empty queue observes `true`.
    pub fn push_back(&self, item: T) -> bool {
        let mut deque = self.deque.lock();
        let was_empty = deque.is_empty();
        deque.push_back(item);
        self.not_empty.notify_one();
        was_empty
    }

    pub fn pop_front(&self) -> Option<T> {
        self.deque.lock().pop_front()
    }

    pub fn pop_back(&self) -> Option<T> {
        self.deque.lock().pop_back()
    }

    pub fn is_empty(&self) -> bool {
        self.deque.lock().is_empty()
    }

    pub fn count(&self) -> usize {
        self.deque.lock().len()
    }

    pub fn clear(&self) {
        self.deque.lock().clear();
    }

    /// Block the calling thread until the queue holds at least one item.
    ///
    /// Returns immediately if the queue is already non-empty. Must not be
    /// called from inside an async task.
    pub fn wait(&self) {
        let mut deque = self.deque.lock();
        while deque.is_empty() {
            self.not_empty.wait(&mut deque);
        }
    }

    /// Like [`wait`](Self::wait), but gives up after `timeout`.
    ///
    /// Returns `true` if the queue is non-empty on return.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut deque = self.deque.lock();
        if deque.is_empty() {
            let _ = self
                .not_empty
                .wait_while_for(&mut deque, |d| d.is_empty(), timeout);
        }
        !deque.is_empty()
    }
}

impl<T: Clone> TsQueue<T> {
    /// Clone of the front item, if any.
    pub fn front(&self) -> Option<T> {
        self.deque.lock().front().cloned()
    }

    /// Clone of the back item, if any.
    pub fn back(&self) -> Option<T> {
        self.deque.lock().back().cloned()
    }
}

impl<T> Default for TsQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
