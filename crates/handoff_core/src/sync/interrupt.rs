//! # Thread Interruption
//!
//! Cancels a thread that is suspended inside [`BoundedBuffer::put`] or
//! [`BoundedBuffer::get`].
//!
//! Every thread owns a lazily created interrupt state: a flag plus the
//! buffer it is currently parked on. A thread hands out an
//! [`InterruptHandle`] (via [`handle`]) to whoever may need to cancel it.
//!
//! ```text
//!   Canceller                         Parked thread
//!   ─────────                         ─────────────
//!   handle.interrupt()                lock(buffer)
//!     flag = true                     parked_on = buffer
//!     target = parked_on              while blocked {
//!     lock(buffer)                        if take(flag) -> Interrupted
//!     notify_all                          wait(condvar)      // unlocks
//!     unlock(buffer)                  }
//! ```
//!
//! The canceller takes the buffer lock before notifying, and the parked
//! thread publishes `parked_on` and reads the flag while holding that same
//! lock. Either the parked thread sees the flag before it waits, or the
//! notification reaches it while it waits.
//!
//! ## Semantics
//!
//! - The flag is only consulted when an operation actually has to wait.
//!   `put` into a non-full buffer and `get` from a non-empty one succeed
//!   even with an interrupt pending.
//! - A pending interrupt makes the next wait fail immediately.
//! - Reporting [`BufferError::Interrupted`] clears the flag.
//!
//! [`BoundedBuffer::put`]: crate::BoundedBuffer::put
//! [`BoundedBuffer::get`]: crate::BoundedBuffer::get
//! [`BufferError::Interrupted`]: crate::BufferError::Interrupted

use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// Something a parked thread can be woken from.
pub(crate) trait WakeTarget: Send + Sync {
    /// Wakes every thread waiting on this target.
    ///
    /// Must acquire the lock the waiters check their condition under.
    fn wake_all(&self);
}

struct InterruptState {
    flag: AtomicBool,
    parked_on: Mutex<Option<Weak<dyn WakeTarget>>>,
}

impl InterruptState {
    fn new() -> Self {
        Self {
            flag: AtomicBool::new(false),
            parked_on: Mutex::new(None),
        }
    }
}

thread_local! {
    static CURRENT: Arc<InterruptState> = Arc::new(InterruptState::new());
}

fn current() -> Arc<InterruptState> {
    CURRENT.with(Arc::clone)
}

/// Returns a handle that can interrupt the calling thread.
///
/// Handles are cheap to clone and may be sent to any thread.
#[must_use]
pub fn handle() -> InterruptHandle {
    let thread = std::thread::current();
    InterruptHandle {
        state: current(),
        thread_name: thread.name().map(str::to_owned),
    }
}

/// Returns whether an interrupt is pending for the calling thread.
#[must_use]
pub fn is_interrupted() -> bool {
    CURRENT.with(|state| state.flag.load(Ordering::SeqCst))
}

/// Clears a pending interrupt for the calling thread.
///
/// Returns whether one was pending.
pub fn clear() -> bool {
    CURRENT.with(|state| state.flag.swap(false, Ordering::SeqCst))
}

/// Handle to another thread's interrupt state.
#[derive(Clone)]
pub struct InterruptHandle {
    state: Arc<InterruptState>,
    thread_name: Option<String>,
}

impl InterruptHandle {
    /// Interrupts the thread this handle was created on.
    ///
    /// If that thread is suspended in `put` or `get`, the call returns
    /// [`BufferError::Interrupted`](crate::BufferError::Interrupted).
    /// Otherwise the interrupt stays pending until its next wait, or until
    /// it calls [`clear`].
    pub fn interrupt(&self) {
        self.state.flag.store(true, Ordering::SeqCst);

        // Guard is released before waking: waiters lock buffer -> parked_on.
        let target = self.state.parked_on.lock().as_ref().and_then(Weak::upgrade);

        tracing::debug!(
            thread = self.thread_name.as_deref().unwrap_or("<unnamed>"),
            parked = target.is_some(),
            "interrupt delivered"
        );

        if let Some(target) = target {
            target.wake_all();
        }
    }

    /// Returns whether an interrupt is pending for the target thread.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        self.state.flag.load(Ordering::SeqCst)
    }

    /// Returns the name of the target thread, if it had one.
    #[must_use]
    pub fn thread_name(&self) -> Option<&str> {
        self.thread_name.as_deref()
    }
}

impl fmt::Debug for InterruptHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterruptHandle")
            .field("thread_name", &self.thread_name)
            .field("interrupted", &self.is_interrupted())
            .finish()
    }
}

/// Registration of the calling thread as parked on a wake target.
///
/// Must be created and dropped while the target's lock is held.
pub(crate) struct Parked {
    state: Arc<InterruptState>,
}

impl Parked {
    /// Marks the calling thread as parked on `target`.
    pub(crate) fn on(target: Weak<dyn WakeTarget>) -> Self {
        let state = current();
        *state.parked_on.lock() = Some(target);
        Self { state }
    }

    /// Consumes a pending interrupt, if any.
    pub(crate) fn take_interrupt(&self) -> bool {
        self.state.flag.swap(false, Ordering::SeqCst)
    }
}

impl Drop for Parked {
    fn drop(&mut self) {
        *self.state.parked_on.lock() = None;
    }
}
