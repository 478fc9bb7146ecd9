//! Blocking producer-consumer channel for sampled values
//!
//! Decouples producer cadence from consumer cadence under bounded memory,
//! without ever blocking a producer. A bounded channel that is full evicts
//! its oldest element to make room (drop-oldest backpressure); consumers
//! block in [`SampleChannel::pop`] until a value arrives or the channel is
//! finished.
//!
//! ```
//! use profd::channel::SampleChannel;
//!
//! let channel = SampleChannel::unbounded();
//! channel.push(1);
//! channel.push(2);
//! channel.finish();
//! assert_eq!(channel.pop(), Some(1));
//! assert_eq!(channel.pop(), Some(2));
//! assert_eq!(channel.pop(), None);
//! ```

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard};

struct ChannelState<T> {
    queue: VecDeque<T>,
    // Monotonic: false -> true only, never reset.
    finished: bool,
}

/// A thread-safe FIFO queue of sampled values, optionally bounded.
///
/// Any number of producer and consumer threads may share one channel. A
/// single lock plus a condition variable serializes all operations; both the
/// "pushed into an empty queue" and "finish" transitions wake *all* waiting
/// consumers so no wakeup can be missed.
pub struct SampleChannel<T> {
    state: Mutex<ChannelState<T>>,
    available: Condvar,
    max_len: Option<usize>,
}

impl<T> Default for SampleChannel<T> {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl<T> SampleChannel<T> {
    /// Create a channel that grows without limit.
    #[must_use]
    pub fn unbounded() -> Self {
        Self::with_capacity(None)
    }

    /// Create a channel holding at most `max_len` elements. Once full, each
    /// push evicts the oldest buffered element.
    ///
    /// # Panics
    /// Panics if `max_len` is zero; a zero-capacity channel is a programmer
    /// error, not a runtime condition.
    #[must_use]
    pub fn bounded(max_len: usize) -> Self {
        assert!(max_len > 0, "bounded channel capacity must be positive");
        Self::with_capacity(Some(max_len))
    }

    fn with_capacity(max_len: Option<usize>) -> Self {
        Self {
            state: Mutex::new(ChannelState { queue: VecDeque::new(), finished: false }),
            available: Condvar::new(),
            max_len,
        }
    }

    fn lock(&self) -> MutexGuard<'_, ChannelState<T>> {
        // A panicking producer must not take consumers down with it; the
        // queue itself is still structurally sound.
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Append a value to the tail of the queue.
    ///
    /// Returns `false` and discards the value if the channel is finished.
    /// Never blocks: if the channel is bounded and full, the oldest element
    /// is evicted first.
    pub fn push(&self, value: T) -> bool {
        let mut state = self.lock();
        if state.finished {
            return false;
        }

        if state.queue.is_empty() {
            self.available.notify_all();
        }

        // Removes oldest data to make room for value.
        if let Some(max_len) = self.max_len {
            if state.queue.len() >= max_len {
                debug_assert_eq!(state.queue.len(), max_len);
                state.queue.pop_front();
            }
        }

        state.queue.push_back(value);
        true
    }

    /// Remove and return the oldest buffered value.
    ///
    /// Blocks the calling thread while the queue is empty and the channel is
    /// not finished. Returns `None` exactly when the queue is empty *and*
    /// finished, so consumers can drain with `while let Some(v) = ch.pop()`.
    pub fn pop(&self) -> Option<T> {
        let mut state = self.lock();
        while !state.finished && state.queue.is_empty() {
            state = self
                .available
                .wait(state)
                .unwrap_or_else(std::sync::PoisonError::into_inner);
        }
        state.queue.pop_front()
    }

    /// Atomically remove and return everything currently buffered, in
    /// arrival order. The channel remains usable afterwards.
    pub fn drain(&self) -> Vec<T> {
        let mut state = self.lock();
        state.queue.drain(..).collect()
    }

    /// Mark the channel finished and wake every blocked consumer.
    ///
    /// Idempotent. Afterwards `push` always rejects; `pop` first drains the
    /// remaining backlog, then reports closed.
    pub fn finish(&self) {
        let mut state = self.lock();
        state.finished = true;
        self.available.notify_all();
    }

    /// Whether [`SampleChannel::finish`] has been called.
    pub fn is_finished(&self) -> bool {
        self.lock().finished
    }

    /// Number of currently buffered elements.
    pub fn len(&self) -> usize {
        self.lock().queue.len()
    }

    /// Whether the queue is currently empty.
    pub fn is_empty(&self) -> bool {
        self.lock().queue.is_empty()
    }
}
