//! Configuration for the deduplication gate.
//!
//! [`DedupConfig`] is cheap to clone and serializable so it can be bound from
//! JSON, TOML, or YAML application config.
//!
//! ```rust
//! use branchstore::DedupConfig;
//!
//! let config = DedupConfig::default()
//!     .with_similarity_threshold(0.9)
//!     .with_max_cache_size(256);
//! config.validate().expect("invalid dedup configuration");
//! ```
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::DedupError;

/// Runtime knobs for a [`Deduplicator`](crate::Deduplicator) instance.
///
/// Both values are fixed for the lifetime of the deduplicator built from
/// them. Validation happens at construction, so a bad config never produces
/// a half-working cache.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct DedupConfig {
    /// Cosine score at or above which an incoming vector counts as a
    /// duplicate of a cached one. Must lie in `(0, 1]`.
    pub similarity_threshold: f32,
    /// Upper bound on cached embeddings; the least-recently-used entry is
    /// evicted beyond this. Must be at least 1.
    pub max_cache_size: usize,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.95,
            max_cache_size: 512,
        }
    }
}

impl DedupConfig {
    pub fn with_similarity_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    pub fn with_max_cache_size(mut self, size: usize) -> Self {
        self.max_cache_size = size;
        self
    }

    /// Check the configured values against their allowed ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.similarity_threshold > 0.0 && self.similarity_threshold <= 1.0) {
            return Err(ConfigError::SimilarityThreshold(self.similarity_threshold));
        }
        if self.max_cache_size == 0 {
            return Err(ConfigError::MaxCacheSize);
        }
        Ok(())
    }
}

/// Validation failures for [`DedupConfig`].
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum ConfigError {
    /// Threshold outside `(0, 1]`. NaN lands here too since it fails every
    /// range comparison.
    #[error("similarity_threshold must be in (0, 1], got {0}")]
    SimilarityThreshold(f32),
    /// Zero-capacity cache can never admit an entry.
    #[error("max_cache_size must be at least 1")]
    MaxCacheSize,
}

impl From<ConfigError> for DedupError {
    fn from(value: ConfigError) -> Self {
        match value {
            ConfigError::SimilarityThreshold(t) => DedupError::InvalidThreshold(t),
            ConfigError::MaxCacheSize => DedupError::InvalidCacheSize(0),
        }
    }
}
