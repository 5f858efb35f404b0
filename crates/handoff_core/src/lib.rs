//! # HANDOFF Core
//!
//! Bounded blocking buffer for handing values between threads:
//! - Any number of producers and consumers
//! - Fixed capacity, FIFO order
//! - Blocking `put` / `get`, cancellable by interrupt
//!
//! ## Guarantees
//!
//! 1. **Capacity** - `0 <= len <= capacity` whenever the lock is free
//! 2. **FIFO** - values leave in the order they entered, exactly once
//! 3. **Progress** - a `put` wakes waiting consumers, a `get` wakes waiting
//!    producers, even with many waiters of both kinds
//!
//! No fairness between waiters: whichever thread wins the lock proceeds.
//!
//! ## Example
//!
//! ```rust
//! use handoff_core::{BoundedBuffer, BufferConfig};
//!
//! let config = BufferConfig::from_toml_str("capacity = 4")?;
//! let buffer = BoundedBuffer::from_config(&config)?;
//!
//! buffer.put("hello")?;
//! assert_eq!(buffer.get()?, "hello");
//! # Ok::<(), handoff_core::BufferError>(())
//! ```

#![deny(missing_docs)]
#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod error;
pub mod sync;

pub use config::{BufferConfig, DEFAULT_CAPACITY};
pub use error::{BufferError, BufferResult};
pub use sync::{interrupt, BoundedBuffer, BufferState, BufferStats, InterruptHandle};
