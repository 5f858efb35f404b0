//! # Synchronization Primitives for Producer/Consumer Hand-off
//!
//! ## The Problem
//!
//! ```text
//! Producers:  put(value)   ──┐
//!                            ├──> shared sequence, at most `capacity` long
//! Consumers:  get() -> value ──┘
//!
//! Without synchronization: RACE CONDITION → lost or duplicated values
//! With busy polling:       BURNED CPU while the buffer is full or empty
//! ```
//!
//! ## The Solution: Lock + Broadcast Condition Variable
//!
//! One mutex guards the sequence. Threads that cannot proceed sleep on one
//! condition variable and re-check after every wakeup. Every change wakes
//! everyone.
//!
//! Waits can be cancelled from another thread through [`interrupt`].

mod bounded_buffer;
pub mod interrupt;

pub use bounded_buffer::{BoundedBuffer, BufferState, BufferStats};
pub use interrupt::InterruptHandle;
