//! # Buffer Configuration
//!
//! Loaded once at startup from TOML:
//!
//! ```toml
//! capacity = 10
//! ```
//!
//! Missing keys fall back to [`BufferConfig::default`].

use crate::error::{BufferError, BufferResult};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::Path;

/// Capacity used when none is configured.
pub const DEFAULT_CAPACITY: usize = 10;

/// Configuration for a [`BoundedBuffer`](crate::BoundedBuffer).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BufferConfig {
    /// Maximum number of elements held at once. Must be at least 1.
    pub capacity: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
        }
    }
}

impl BufferConfig {
    /// Creates a config with the given capacity.
    #[must_use]
    pub const fn with_capacity(capacity: usize) -> Self {
        Self { capacity }
    }

    /// Parses and validates a config from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::InvalidConfig`] if the text is not valid TOML,
    /// contains unknown keys, or fails [`validate`](Self::validate).
    pub fn from_toml_str(text: &str) -> BufferResult<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| BufferError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a config from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::InvalidConfig`] if the file cannot be read or
    /// its contents are rejected by [`from_toml_str`](Self::from_toml_str).
    pub fn load(path: impl AsRef<Path>) -> BufferResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            BufferError::InvalidConfig(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    /// Checks that the capacity is usable.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::InvalidConfig`] if `capacity` is zero.
    pub fn validate(&self) -> BufferResult<()> {
        self.non_zero_capacity().map(|_| ())
    }

    /// Returns the validated capacity.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::InvalidConfig`] if `capacity` is zero.
    pub fn non_zero_capacity(&self) -> BufferResult<NonZeroUsize> {
        NonZeroUsize::new(self.capacity).ok_or_else(|| {
            BufferError::InvalidConfig("capacity must be greater than zero".to_string())
        })
    }
}
