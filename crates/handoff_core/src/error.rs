//! # Buffer Error Types
//!
//! All errors that can occur while building or using a buffer.

use thiserror::Error;

/// Errors that can occur in the buffer system.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BufferError {
    /// The calling thread was interrupted while suspended in `put` or `get`.
    ///
    /// The operation had no effect on the buffer.
    #[error("interrupted while waiting on buffer")]
    Interrupted,

    /// Invalid configuration file or value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for buffer operations.
pub type BufferResult<T> = Result<T, BufferError>;
