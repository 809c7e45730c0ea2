//! Read-through ancestor projection cache using moka
//!
//! Entries are immutable once loaded and shared as `Arc`s across the
//! aggregation workers. The cache is bounded by entry count and evicts
//! entries idle for longer than the configured delay.
//!
//! Entries are only trusted within one compute run: the orchestrator calls
//! [`AncestorLookup::invalidate_all`] before each collection phase.

use crate::config::AncestorCacheConfig;
use crate::error::GraphError;
use crate::store::MetadataStore;
use arbor_model::{AncestorProjection, DocumentId};
use moka::sync::Cache;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Cache port used by prefetch and aggregation
pub trait AncestorLookup: Send + Sync {
    /// Projection of one unit, `None` if the unit does not exist
    ///
    /// # Errors
    /// Returns `GraphError::CacheLoad` if the store read fails.
    fn get(&self, id: &DocumentId) -> Result<Option<Arc<AncestorProjection>>, GraphError>;

    /// Projections of several units; misses are loaded in one store round-trip
    ///
    /// Unknown ids are absent from the result.
    ///
    /// # Errors
    /// Returns `GraphError::CacheLoad` if the store read fails.
    fn get_all(
        &self,
        ids: &[DocumentId],
    ) -> Result<HashMap<DocumentId, Arc<AncestorProjection>>, GraphError>;

    /// Drop every cached entry
    fn invalidate_all(&self);

    /// Counters since creation
    fn stats(&self) -> CacheStats;
}

/// Statistics for cache performance monitoring
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of entries in cache
    pub entry_count: u64,
    /// Lookups served from memory
    pub hits: u64,
    /// Lookups that needed the store
    pub misses: u64,
    /// Store round-trips issued
    pub loads: u64,
}

impl CacheStats {
    /// Ratio of hits over all lookups
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Ancestor cache backed by the primary store
pub struct AncestorCache {
    inner: Cache<DocumentId, Arc<AncestorProjection>>,
    store: Arc<dyn MetadataStore>,
    hits: AtomicU64,
    misses: AtomicU64,
    loads: AtomicU64,
}

impl AncestorCache {
    /// Create cache with the given bounds
    #[must_use]
    pub fn new(store: Arc<dyn MetadataStore>, config: AncestorCacheConfig) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(config.max_capacity)
                .time_to_idle(config.time_to_idle())
                .build(),
            store,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            loads: AtomicU64::new(0),
        }
    }

    /// Get approximate entry count
    #[inline]
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }

    /// Apply pending evictions
    pub fn run_pending_tasks(&self) {
        self.inner.run_pending_tasks();
    }

    fn load(
        &self,
        ids: &[DocumentId],
    ) -> Result<HashMap<DocumentId, Arc<AncestorProjection>>, GraphError> {
        self.loads.fetch_add(1, Ordering::Relaxed);
        let projections = self
            .store
            .find_unit_projections(ids)
            .map_err(|source| GraphError::CacheLoad { source })?;

        Ok(projections
            .into_iter()
            .map(|projection| {
                let projection = Arc::new(projection);
                self.inner
                    .insert(projection.id.clone(), Arc::clone(&projection));
                (projection.id.clone(), projection)
            })
            .collect())
    }
}

impl AncestorLookup for AncestorCache {
    fn get(&self, id: &DocumentId) -> Result<Option<Arc<AncestorProjection>>, GraphError> {
        if let Some(hit) = self.inner.get(id) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Some(hit));
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        let mut loaded = self.load(std::slice::from_ref(id))?;
        Ok(loaded.remove(id))
    }

    fn get_all(
        &self,
        ids: &[DocumentId],
    ) -> Result<HashMap<DocumentId, Arc<AncestorProjection>>, GraphError> {
        let mut found = HashMap::with_capacity(ids.len());
        let mut missing = BTreeSet::new();

        for id in ids {
            if found.contains_key(id) || missing.contains(id) {
                continue;
            }
            match self.inner.get(id) {
                Some(hit) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    found.insert(id.clone(), hit);
                }
                None => {
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    missing.insert(id.clone());
                }
            }
        }

        if !missing.is_empty() {
            let missing: Vec<DocumentId> = missing.into_iter().collect();
            found.extend(self.load(&missing)?);
        }
        Ok(found)
    }

    fn invalidate_all(&self) {
        self.inner.invalidate_all();
    }

    fn stats(&self) -> CacheStats {
        self.inner.run_pending_tasks();
        CacheStats {
            entry_count: self.inner.entry_count(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            loads: self.loads.load(Ordering::Relaxed),
        }
    }
}

impl fmt::Debug for AncestorCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AncestorCache")
            .field("entry_count", &self.inner.entry_count())
            .field("hits", &self.hits.load(Ordering::Relaxed))
            .field("misses", &self.misses.load(Ordering::Relaxed))
            .field("loads", &self.loads.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
