//! # Bounded Blocking Buffer
//!
//! Fixed-capacity FIFO shared by any number of producer and consumer
//! threads.
//!
//! ## Architecture
//!
//! ```text
//!   Producer 1 ──┐                                  ┌──> Consumer 1
//!   Producer 2 ──┼──> put ──> [ Mutex<VecDeque> ] ──> get ──┼──> Consumer 2
//!   Producer N ──┘                 │ Condvar │              └──> Consumer M
//!                                  └─────────┘
//!                          notify_all on every change
//! ```
//!
//! ## State Machine
//!
//! ```text
//!            put             put (len+1 < cap)        put (len+1 == cap)
//!   EMPTY ─────────> PARTIAL ─────────────────> PARTIAL ─────────────────> FULL
//!   EMPTY <───────── PARTIAL <───────────────── PARTIAL <───────────────── FULL
//!         get (len==1)        get (len-1 > 0)                  get
//! ```
//!
//! `put` on FULL and `get` on EMPTY suspend instead of transitioning.
//!
//! ## Wakeup Discipline
//!
//! - Producers and consumers share ONE condition variable.
//! - Every successful `put`/`get` wakes ALL waiters (`notify_all`).
//! - Every waiter re-checks its condition in a `while` loop after waking.
//!
//! A single `if` check or `notify_one` would lose wakeups when producers and
//! consumers wait at the same time.

use crate::config::{BufferConfig, DEFAULT_CAPACITY};
use crate::error::{BufferError, BufferResult};
use crate::sync::interrupt::{Parked, WakeTarget};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::collections::VecDeque;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::{Arc, Weak};

/// Coarse fill state of a buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BufferState {
    /// No elements held. `get` suspends.
    Empty,
    /// At least one element held, room for more.
    Partial,
    /// `capacity` elements held. `put` suspends.
    Full,
}

impl BufferState {
    /// Classifies a length against a capacity.
    #[inline]
    #[must_use]
    pub const fn classify(len: usize, capacity: usize) -> Self {
        if len == 0 {
            Self::Empty
        } else if len >= capacity {
            Self::Full
        } else {
            Self::Partial
        }
    }
}

/// Counters for a buffer, updated under the buffer lock.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BufferStats {
    /// Successful `put` calls.
    pub total_puts: u64,
    /// Successful `get` calls.
    pub total_gets: u64,
    /// `put` calls that found the buffer full and had to suspend.
    pub producer_waits: u64,
    /// `get` calls that found the buffer empty and had to suspend.
    pub consumer_waits: u64,
    /// Waits aborted by an interrupt.
    pub interrupted: u64,
    /// Largest length ever observed.
    pub high_water_mark: usize,
}

#[derive(Clone, Copy, Debug)]
enum Role {
    Producer,
    Consumer,
}

struct Inner<T> {
    items: VecDeque<T>,
    stats: BufferStats,
}

/// Thread-safe bounded FIFO with blocking `put` and `get`.
///
/// Created behind an [`Arc`] so it can be shared between threads and so
/// interrupted waiters can be woken.
///
/// ## Usage
///
/// ```rust
/// use handoff_core::BoundedBuffer;
/// use std::sync::Arc;
/// use std::thread;
///
/// let buffer = BoundedBuffer::new(2);
///
/// let producer = {
///     let buffer = Arc::clone(&buffer);
///     thread::spawn(move || {
///         for i in 0..10 {
///             buffer.put(i).unwrap();
///         }
///     })
/// };
///
/// let received: Vec<i32> = (0..10).map(|_| buffer.get().unwrap()).collect();
/// producer.join().unwrap();
/// assert_eq!(received, (0..10).collect::<Vec<_>>());
/// ```
///
/// ## Element Bound
///
/// Construction and the blocking operations require `T: Send + 'static`.
/// A suspended thread publishes a type-erased [`Weak`] reference to the
/// buffer in its thread-local interrupt state, and that reference cannot
/// carry a borrow. A buffer of references into a `std::thread::scope`
/// stack frame therefore does not compile; move owned values (or `Arc`s)
/// through it instead.
pub struct BoundedBuffer<T> {
    /// Queued elements and counters. Only touched under this lock.
    inner: Mutex<Inner<T>>,
    /// Signaled (broadcast) after every change to `inner.items`.
    changed: Condvar,
    /// Fixed at construction.
    capacity: usize,
}

impl<T: Send + 'static> BoundedBuffer<T> {
    /// Creates an empty buffer holding at most `capacity` elements.
    ///
    /// # Panics
    ///
    /// Panics if capacity is zero.
    #[must_use]
    pub fn new(capacity: usize) -> Arc<Self> {
        assert!(capacity > 0, "Capacity must be greater than zero");
        Self::build(capacity)
    }

    /// Creates an empty buffer holding at most [`DEFAULT_CAPACITY`]
    /// elements.
    #[must_use]
    pub fn with_default_capacity() -> Arc<Self> {
        Self::build(DEFAULT_CAPACITY)
    }

    /// Creates an empty buffer holding at most `capacity` elements.
    #[must_use]
    pub fn with_capacity(capacity: NonZeroUsize) -> Arc<Self> {
        Self::build(capacity.get())
    }

    /// Creates an empty buffer from a config.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::InvalidConfig`] if the configured capacity is
    /// zero.
    pub fn from_config(config: &BufferConfig) -> BufferResult<Arc<Self>> {
        let capacity = config.non_zero_capacity()?;
        Ok(Self::with_capacity(capacity))
    }

    fn build(capacity: usize) -> Arc<Self> {
        tracing::debug!(capacity, "bounded buffer created");
        Arc::new(Self {
            inner: Mutex::new(Inner {
                items: VecDeque::with_capacity(capacity),
                stats: BufferStats::default(),
            }),
            changed: Condvar::new(),
            capacity,
        })
    }

    /// Appends `value` at the tail, suspending while the buffer is full.
    ///
    /// Wakes every waiting producer and consumer once the value is in.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::Interrupted`] if the calling thread is
    /// interrupted while suspended. The value is dropped and the buffer is
    /// left untouched.
    pub fn put(self: &Arc<Self>, value: T) -> BufferResult<()> {
        let mut inner = self.inner.lock();

        self.wait_while(&mut inner, Role::Producer, |items| {
            items.len() == self.capacity
        })?;

        inner.items.push_back(value);
        debug_assert!(inner.items.len() <= self.capacity);

        let len = inner.items.len();
        inner.stats.total_puts += 1;
        inner.stats.high_water_mark = inner.stats.high_water_mark.max(len);

        self.changed.notify_all();
        Ok(())
    }

    /// Removes and returns the oldest element, suspending while the buffer
    /// is empty.
    ///
    /// Wakes every waiting producer and consumer once the value is out.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::Interrupted`] if the calling thread is
    /// interrupted while suspended. Nothing is removed.
    pub fn get(self: &Arc<Self>) -> BufferResult<T> {
        let mut inner = self.inner.lock();

        self.wait_while(&mut inner, Role::Consumer, VecDeque::is_empty)?;

        let Some(value) = inner.items.pop_front() else {
            unreachable!("wait_while returned on an empty buffer");
        };
        inner.stats.total_gets += 1;

        self.changed.notify_all();
        Ok(value)
    }

    /// Suspends on `changed` until `blocked` is false.
    ///
    /// The lock is released while suspended and re-acquired before every
    /// re-check.
    fn wait_while(
        self: &Arc<Self>,
        inner: &mut MutexGuard<'_, Inner<T>>,
        role: Role,
        blocked: impl Fn(&VecDeque<T>) -> bool,
    ) -> BufferResult<()> {
        if !blocked(&inner.items) {
            return Ok(());
        }

        match role {
            Role::Producer => inner.stats.producer_waits += 1,
            Role::Consumer => inner.stats.consumer_waits += 1,
        }

        let target: Weak<dyn WakeTarget> = Arc::<Self>::downgrade(self);
        let parked = Parked::on(target);

        while blocked(&inner.items) {
            if parked.take_interrupt() {
                inner.stats.interrupted += 1;
                tracing::warn!(?role, len = inner.items.len(), "wait aborted by interrupt");
                return Err(BufferError::Interrupted);
            }

            tracing::trace!(?role, len = inner.items.len(), "suspending");
            self.changed.wait(inner);
            tracing::trace!(?role, len = inner.items.len(), "woke up");
        }

        Ok(())
    }
}

impl<T> BoundedBuffer<T> {
    /// Returns the fixed capacity.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of elements currently held.
    ///
    /// The value may be stale as soon as the lock is released.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    /// Returns whether the buffer currently holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().items.is_empty()
    }

    /// Returns whether the buffer is currently at capacity.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.inner.lock().items.len() == self.capacity
    }

    /// Returns the current fill state.
    #[must_use]
    pub fn state(&self) -> BufferState {
        BufferState::classify(self.inner.lock().items.len(), self.capacity)
    }

    /// Returns a snapshot of the counters.
    #[must_use]
    pub fn stats(&self) -> BufferStats {
        self.inner.lock().stats.clone()
    }
}

impl<T: Send> WakeTarget for BoundedBuffer<T> {
    fn wake_all(&self) {
        let _guard = self.inner.lock();
        self.changed.notify_all();
    }
}

impl<T> fmt::Debug for BoundedBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("BoundedBuffer")
            .field("capacity", &self.capacity)
            .field("len", &inner.items.len())
            .field("stats", &inner.stats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::interrupt;
    use std::thread;
    use std::time::{Duration, Instant};

    fn wait_until(mut condition: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while !condition() {
            assert!(Instant::now() < deadline, "condition not reached in time");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_buffer_creation() {
        let buffer: Arc<BoundedBuffer<u32>> = BoundedBuffer::new(4);
        assert_eq!(buffer.capacity(), 4);
        assert_eq!(buffer.len(), 0);
        assert!(buffer.is_empty());
        assert!(!buffer.is_full());
        assert_eq!(buffer.state(), BufferState::Empty);
        assert_eq!(buffer.stats(), BufferStats::default());
    }

    #[test]
    fn test_default_capacity_matches_default_config() {
        let buffer: Arc<BoundedBuffer<u32>> = BoundedBuffer::with_default_capacity();
        assert_eq!(buffer.capacity(), DEFAULT_CAPACITY);
        assert_eq!(buffer.capacity(), BufferConfig::default().capacity);
        assert_eq!(buffer.state(), BufferState::Empty);

        for i in 0..10 {
            buffer.put(i).unwrap();
        }
        assert!(buffer.is_full());
    }

    #[test]
    #[should_panic(expected = "Capacity must be greater than zero")]
    fn test_zero_capacity_panics() {
        let _buffer: Arc<BoundedBuffer<u32>> = BoundedBuffer::new(0);
    }

    #[test]
    fn test_from_config() {
        let buffer: Arc<BoundedBuffer<u8>> =
            BoundedBuffer::from_config(&BufferConfig::default()).unwrap();
        assert_eq!(buffer.capacity(), 10);

        let err = BoundedBuffer::<u8>::from_config(&BufferConfig::with_capacity(0)).unwrap_err();
        assert!(matches!(err, BufferError::InvalidConfig(_)));
    }

    #[test]
    fn test_state_transitions() {
        let buffer = BoundedBuffer::new(2);

        buffer.put('a').unwrap();
        assert_eq!(buffer.state(), BufferState::Partial);

        buffer.put('b').unwrap();
        assert_eq!(buffer.state(), BufferState::Full);
        assert!(buffer.is_full());

        assert_eq!(buffer.get().unwrap(), 'a');
        assert_eq!(buffer.state(), BufferState::Partial);

        assert_eq!(buffer.get().unwrap(), 'b');
        assert_eq!(buffer.state(), BufferState::Empty);
    }

    #[test]
    fn test_classify() {
        assert_eq!(BufferState::classify(0, 1), BufferState::Empty);
        assert_eq!(BufferState::classify(1, 1), BufferState::Full);
        assert_eq!(BufferState::classify(3, 5), BufferState::Partial);
    }

    #[test]
    fn test_fifo_single_thread() {
        let buffer = BoundedBuffer::new(5);
        for i in 0..5 {
            buffer.put(i).unwrap();
        }
        let out: Vec<_> = (0..5).map(|_| buffer.get().unwrap()).collect();
        assert_eq!(out, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_stats_count_operations() {
        let buffer = BoundedBuffer::new(3);
        buffer.put(1).unwrap();
        buffer.put(2).unwrap();
        let _ = buffer.get().unwrap();
        buffer.put(3).unwrap();

        let stats = buffer.stats();
        assert_eq!(stats.total_puts, 3);
        assert_eq!(stats.total_gets, 1);
        assert_eq!(stats.high_water_mark, 2);
        assert_eq!(stats.producer_waits, 0);
        assert_eq!(stats.consumer_waits, 0);
    }

    #[test]
    fn test_consumer_wait_is_counted() {
        let buffer: Arc<BoundedBuffer<u8>> = BoundedBuffer::new(1);
        let consumer = {
            let buffer = Arc::clone(&buffer);
            thread::spawn(move || buffer.get())
        };

        wait_until(|| buffer.stats().consumer_waits == 1);
        buffer.put(7).unwrap();

        assert_eq!(consumer.join().unwrap(), Ok(7));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_interrupted_put_leaves_buffer_unchanged() {
        let buffer = BoundedBuffer::new(1);
        buffer.put(1).unwrap();

        let (handle_tx, handle_rx) = crossbeam_channel::bounded(1);
        let producer = {
            let buffer = Arc::clone(&buffer);
            thread::spawn(move || {
                handle_tx.send(interrupt::handle()).unwrap();
                buffer.put(2)
            })
        };

        let handle = handle_rx.recv().unwrap();
        wait_until(|| buffer.stats().producer_waits == 1);
        handle.interrupt();

        assert_eq!(producer.join().unwrap(), Err(BufferError::Interrupted));
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.stats().interrupted, 1);
        assert_eq!(buffer.get().unwrap(), 1);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_debug_output() {
        let buffer = BoundedBuffer::new(2);
        buffer.put("x").unwrap();
        let text = format!("{buffer:?}");
        assert!(text.contains("capacity: 2"));
        assert!(text.contains("len: 1"));
    }
}
