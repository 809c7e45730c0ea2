//! Engine configuration
//!
//! Loaded from TOML; every field has a default so an empty file is valid.
//!
//! ```toml
//! batch_size = 500
//! worker_threads = 4
//! collections = ["unit", "objectgroup"]
//!
//! [cache]
//! max_capacity = 200000
//! time_to_idle_secs = 120
//! ```

use crate::error::GraphError;
use arbor_model::Collection;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Graph computation settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphComputeConfig {
    /// Candidate documents per batch
    pub batch_size: usize,
    /// Threads of the aggregation pool
    pub worker_threads: usize,
    /// Ancestor cache bounds
    pub cache: AncestorCacheConfig,
    /// Collections processed by a full build, in order
    pub collections: Vec<Collection>,
}

impl GraphComputeConfig {
    /// Parse and validate TOML configuration
    ///
    /// # Errors
    /// Returns `GraphError::Config` on syntax errors or invalid values.
    pub fn from_toml_str(input: &str) -> Result<Self, GraphError> {
        let config: Self =
            toml::from_str(input).map_err(|e| GraphError::config(format!("invalid toml: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    ///
    /// # Errors
    /// Returns `GraphError::Config` if the file cannot be read or is invalid.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, GraphError> {
        let path = path.as_ref();
        let input = std::fs::read_to_string(path)
            .map_err(|e| GraphError::config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml_str(&input)
    }

    /// Check value ranges
    ///
    /// # Errors
    /// Returns `GraphError::Config` naming the first invalid field.
    pub fn validate(&self) -> Result<(), GraphError> {
        if self.batch_size == 0 {
            return Err(GraphError::config("batch_size must be greater than 0"));
        }
        if self.worker_threads == 0 {
            return Err(GraphError::config("worker_threads must be greater than 0"));
        }
        if self.cache.max_capacity == 0 {
            return Err(GraphError::config("cache.max_capacity must be greater than 0"));
        }
        if self.collections.is_empty() {
            return Err(GraphError::config("collections must not be empty"));
        }
        // Object groups read unit results, so units come first and each phase runs once
        if !self.collections.windows(2).all(|pair| pair[0] < pair[1]) {
            return Err(GraphError::config(format!(
                "collections must be distinct and list unit before objectgroup, got {:?}",
                self.collections
            )));
        }
        Ok(())
    }

    /// With batch size
    #[inline]
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// With worker thread count
    #[inline]
    #[must_use]
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads;
        self
    }

    /// With cache bounds
    #[inline]
    #[must_use]
    pub fn with_cache(mut self, cache: AncestorCacheConfig) -> Self {
        self.cache = cache;
        self
    }

    /// With managed collections
    #[inline]
    #[must_use]
    pub fn with_collections(mut self, collections: Vec<Collection>) -> Self {
        self.collections = collections;
        self
    }
}

impl Default for GraphComputeConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            worker_threads: std::thread::available_parallelism().map_or(4, usize::from),
            cache: AncestorCacheConfig::default(),
            collections: Collection::ALL.to_vec(),
        }
    }
}

/// Ancestor cache bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AncestorCacheConfig {
    /// Maximum number of cached projections
    pub max_capacity: u64,
    /// Evict entries not read for this many seconds
    pub time_to_idle_secs: u64,
}

impl AncestorCacheConfig {
    /// Idle eviction delay
    #[inline]
    #[must_use]
    pub fn time_to_idle(&self) -> Duration {
        Duration::from_secs(self.time_to_idle_secs)
    }
}

impl Default for AncestorCacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 100_000,
            time_to_idle_secs: 300,
        }
    }
}
