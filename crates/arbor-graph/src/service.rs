//! Graph compute orchestrator
//!
//! Runs the batch pipeline for one or more collections:
//!
//! ```text
//! select → prefetch → traverse + aggregate (rayon pool) → bulk write → next batch
//! ```
//!
//! At most one build runs at a time. The guard is a single atomic flag
//! (`IDLE → RUNNING → IDLE`); a call made while a build is running returns
//! [`BuildOutcome::AlreadyRunning`] immediately and is not queued.

use crate::aggregate::{
    ObjectGroupAggregation, ObjectGroupAggregator, UnitAggregation, UnitGraphAggregator,
};
use crate::cache::{AncestorCache, AncestorLookup};
use crate::config::GraphComputeConfig;
use crate::error::{DocumentFailure, GraphError};
use crate::prefetch::AncestorSnapshot;
use crate::store::{MetadataStore, Selector};
use crate::traversal::{GraphTraversal, WorkQueueTraversal};
use crate::writer::{BulkWriter, StoreBulkWriter};
use arbor_model::{Collection, DerivedUpdate, DocumentId, GraphCandidate};
use chrono::Utc;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Result of a build request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "report", rename_all = "camelCase")]
pub enum BuildOutcome<T> {
    /// The build ran to completion
    Completed(T),
    /// Another build was running; nothing was done
    AlreadyRunning,
}

impl<T> BuildOutcome<T> {
    /// Report of a completed build
    #[inline]
    pub fn completed(self) -> Option<T> {
        match self {
            Self::Completed(report) => Some(report),
            Self::AlreadyRunning => None,
        }
    }

    /// Check if the build ran
    #[inline]
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

/// Counts for one collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionReport {
    /// Collection processed
    pub collection: Collection,
    /// Documents whose derived fields were written
    pub computed: usize,
    /// Batches processed
    pub batches: usize,
    /// Documents that could not be computed
    pub failures: Vec<DocumentFailure>,
}

impl CollectionReport {
    /// Report with nothing processed
    #[must_use]
    pub fn new(collection: Collection) -> Self {
        Self {
            collection,
            computed: 0,
            batches: 0,
            failures: Vec::new(),
        }
    }

    /// Check if every selected document was computed
    #[inline]
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Counts for a multi-collection build
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphComputeReport {
    /// Unit phase
    pub units: CollectionReport,
    /// Object group phase
    pub object_groups: CollectionReport,
}

impl GraphComputeReport {
    /// Documents computed across both phases
    #[inline]
    #[must_use]
    pub fn total_computed(&self) -> usize {
        self.units.computed + self.object_groups.computed
    }

    fn phase_mut(&mut self, collection: Collection) -> &mut CollectionReport {
        match collection {
            Collection::Unit => &mut self.units,
            Collection::ObjectGroup => &mut self.object_groups,
        }
    }
}

impl Default for GraphComputeReport {
    fn default() -> Self {
        Self {
            units: CollectionReport::new(Collection::Unit),
            object_groups: CollectionReport::new(Collection::ObjectGroup),
        }
    }
}

/// Releases the in-progress flag when dropped
struct RunGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Result of one collection phase
struct Phase {
    report: CollectionReport,
    attached_object_groups: BTreeSet<DocumentId>,
}

/// Outcome of one batch before persistence
struct BatchOutcome {
    computed: usize,
    failures: Vec<DocumentFailure>,
}

/// Graph compute orchestrator
///
/// Owns the ancestor cache, the pipeline stages and the worker pool. All of
/// them are injected or built at construction; nothing is global.
pub struct GraphComputeService {
    config: GraphComputeConfig,
    store: Arc<dyn MetadataStore>,
    cache: Arc<dyn AncestorLookup>,
    traversal: Arc<dyn GraphTraversal>,
    unit_aggregation: Arc<dyn UnitAggregation>,
    object_group_aggregation: Arc<dyn ObjectGroupAggregation>,
    writer: Arc<dyn BulkWriter>,
    pool: rayon::ThreadPool,
    running: AtomicBool,
}

impl GraphComputeService {
    /// Create service with the default pipeline stages
    ///
    /// # Errors
    /// Returns `GraphError::Config` for invalid settings and
    /// `GraphError::WorkerPool` if the pool cannot be started.
    pub fn new(store: Arc<dyn MetadataStore>, config: GraphComputeConfig) -> Result<Self, GraphError> {
        Self::builder(store).with_config(config).build()
    }

    /// Start building a service with custom stages
    #[must_use]
    pub fn builder(store: Arc<dyn MetadataStore>) -> GraphComputeServiceBuilder {
        GraphComputeServiceBuilder::new(store)
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &GraphComputeConfig {
        &self.config
    }

    /// Check if a build is running
    #[inline]
    #[must_use]
    pub fn is_in_progress(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Compute every pending document of every managed collection
    ///
    /// # Errors
    /// Returns the `GraphError` of the first batch that aborts.
    pub fn build_graph(&self) -> Result<BuildOutcome<GraphComputeReport>, GraphError> {
        let Some(_guard) = self.try_start() else {
            tracing::info!("Graph build skipped: another build is in progress");
            return Ok(BuildOutcome::AlreadyRunning);
        };

        tracing::info!("Graph build started for {:?}", self.config.collections);
        let mut report = GraphComputeReport::default();
        for &collection in &self.config.collections {
            let phase = self.run_collection(collection, &Selector::Pending)?;
            *report.phase_mut(collection) = phase.report;
        }
        tracing::info!("Graph build completed: {} documents computed", report.total_computed());
        Ok(BuildOutcome::Completed(report))
    }

    /// Compute the documents of one collection matched by `selector`
    ///
    /// # Errors
    /// Returns the `GraphError` of the first batch that aborts.
    pub fn build_graph_for(
        &self,
        collection: Collection,
        selector: &Selector,
    ) -> Result<BuildOutcome<CollectionReport>, GraphError> {
        let Some(_guard) = self.try_start() else {
            tracing::info!("Graph build for {} skipped: another build is in progress", collection);
            return Ok(BuildOutcome::AlreadyRunning);
        };

        let phase = self.run_collection(collection, selector)?;
        Ok(BuildOutcome::Completed(phase.report))
    }

    /// Compute the given documents
    ///
    /// With `include_object_groups` on a unit request, the object groups
    /// attached to those units are recomputed afterwards in the same run.
    ///
    /// # Errors
    /// Returns the `GraphError` of the first batch that aborts.
    pub fn build_graph_for_ids<I, T>(
        &self,
        collection: Collection,
        ids: I,
        include_object_groups: bool,
    ) -> Result<BuildOutcome<GraphComputeReport>, GraphError>
    where
        I: IntoIterator<Item = T>,
        T: Into<DocumentId>,
    {
        let Some(_guard) = self.try_start() else {
            tracing::info!("Graph build for {} skipped: another build is in progress", collection);
            return Ok(BuildOutcome::AlreadyRunning);
        };

        let selector = Selector::ids(ids);
        let mut report = GraphComputeReport::default();
        let phase = self.run_collection(collection, &selector)?;
        *report.phase_mut(collection) = phase.report;

        if include_object_groups
            && collection == Collection::Unit
            && !phase.attached_object_groups.is_empty()
        {
            let selector = Selector::Ids(phase.attached_object_groups);
            report.object_groups = self.run_collection(Collection::ObjectGroup, &selector)?.report;
        }
        Ok(BuildOutcome::Completed(report))
    }

    fn try_start(&self) -> Option<RunGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunGuard {
                flag: &self.running,
            })
    }

    fn run_collection(&self, collection: Collection, selector: &Selector) -> Result<Phase, GraphError> {
        let span = tracing::info_span!("build_graph", %collection);
        let _enter = span.enter();

        // Projections loaded by an earlier phase may predate its writes
        self.cache.invalidate_all();

        let mut phase = Phase {
            report: CollectionReport::new(collection),
            attached_object_groups: BTreeSet::new(),
        };
        let mut after: Option<DocumentId> = None;

        loop {
            let candidates = self
                .store
                .select_candidates(collection, selector, after.clone(), self.config.batch_size)
                .map_err(|source| GraphError::Selection { collection, source })?;
            let Some(last) = candidates.last() else {
                break;
            };
            after = Some(last.id.clone());
            phase
                .attached_object_groups
                .extend(candidates.iter().filter_map(|c| c.object_group.clone()));

            let batch = match self.process_batch(collection, &candidates) {
                Ok(batch) => batch,
                Err(e) => {
                    tracing::error!(
                        "Batch {} of {} aborted ({} candidates): {}",
                        phase.report.batches + 1,
                        collection,
                        candidates.len(),
                        e
                    );
                    return Err(e);
                }
            };

            phase.report.batches += 1;
            phase.report.computed += batch.computed;
            phase.report.failures.extend(batch.failures);

            if candidates.len() < self.config.batch_size {
                break;
            }
        }

        let cache = self.cache.stats();
        tracing::info!(
            "{} phase completed: {} computed, {} failed, {} batches, cache hit rate {:.2} over {} loads",
            collection,
            phase.report.computed,
            phase.report.failures.len(),
            phase.report.batches,
            cache.hit_rate(),
            cache.loads
        );
        Ok(phase)
    }

    fn process_batch(
        &self,
        collection: Collection,
        candidates: &[GraphCandidate],
    ) -> Result<BatchOutcome, GraphError> {
        let computed_at = Utc::now();
        let parents = candidates.iter().flat_map(|c| c.up.iter());

        let snapshot = match collection {
            Collection::Unit => AncestorSnapshot::prefetch(self.cache.as_ref(), parents)?,
            Collection::ObjectGroup => AncestorSnapshot::load_direct(self.cache.as_ref(), parents)?,
        };
        tracing::debug!(
            "Batch of {} {} candidates: {} ancestors prefetched in {} round-trips",
            candidates.len(),
            collection,
            snapshot.len(),
            snapshot.layers()
        );

        let results: Vec<Result<DerivedUpdate, DocumentFailure>> = self.pool.install(|| {
            candidates
                .par_iter()
                .map(|candidate| {
                    let result = match collection {
                        Collection::Unit => self
                            .traversal
                            .traverse(candidate, &snapshot)
                            .and_then(|relations| {
                                self.unit_aggregation
                                    .aggregate(candidate, &relations, computed_at)
                            }),
                        Collection::ObjectGroup => self
                            .object_group_aggregation
                            .aggregate(candidate, &snapshot, computed_at),
                    };
                    result.map_err(|e| DocumentFailure::new(candidate.id.clone(), e))
                })
                .collect()
        });

        let mut updates = Vec::with_capacity(results.len());
        let mut failures = Vec::new();
        for result in results {
            match result {
                Ok(update) => updates.push(update),
                Err(failure) => {
                    tracing::warn!("Graph computation failed for {} {}: {}", collection, failure.id, failure.error);
                    failures.push(failure);
                }
            }
        }

        let outcome = self.writer.write(collection, updates)?;
        Ok(BatchOutcome {
            computed: outcome.matched,
            failures,
        })
    }
}

impl std::fmt::Debug for GraphComputeService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphComputeService")
            .field("config", &self.config)
            .field("running", &self.is_in_progress())
            .finish_non_exhaustive()
    }
}

/// Builder for [`GraphComputeService`]
///
/// Every stage defaults to the bundled implementation over the given store.
pub struct GraphComputeServiceBuilder {
    store: Arc<dyn MetadataStore>,
    config: GraphComputeConfig,
    cache: Option<Arc<dyn AncestorLookup>>,
    traversal: Option<Arc<dyn GraphTraversal>>,
    unit_aggregation: Option<Arc<dyn UnitAggregation>>,
    object_group_aggregation: Option<Arc<dyn ObjectGroupAggregation>>,
    writer: Option<Arc<dyn BulkWriter>>,
}

impl GraphComputeServiceBuilder {
    /// Create builder over a store
    #[must_use]
    pub fn new(store: Arc<dyn MetadataStore>) -> Self {
        Self {
            store,
            config: GraphComputeConfig::default(),
            cache: None,
            traversal: None,
            unit_aggregation: None,
            object_group_aggregation: None,
            writer: None,
        }
    }

    /// With configuration
    #[must_use]
    pub fn with_config(mut self, config: GraphComputeConfig) -> Self {
        self.config = config;
        self
    }

    /// With ancestor lookup
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn AncestorLookup>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// With traversal
    #[must_use]
    pub fn with_traversal(mut self, traversal: Arc<dyn GraphTraversal>) -> Self {
        self.traversal = Some(traversal);
        self
    }

    /// With unit aggregation
    #[must_use]
    pub fn with_unit_aggregation(mut self, aggregation: Arc<dyn UnitAggregation>) -> Self {
        self.unit_aggregation = Some(aggregation);
        self
    }

    /// With object group aggregation
    #[must_use]
    pub fn with_object_group_aggregation(
        mut self,
        aggregation: Arc<dyn ObjectGroupAggregation>,
    ) -> Self {
        self.object_group_aggregation = Some(aggregation);
        self
    }

    /// With bulk writer
    #[must_use]
    pub fn with_writer(mut self, writer: Arc<dyn BulkWriter>) -> Self {
        self.writer = Some(writer);
        self
    }

    /// Validate configuration and start the worker pool
    ///
    /// # Errors
    /// Returns `GraphError::Config` for invalid settings and
    /// `GraphError::WorkerPool` if the pool cannot be started.
    pub fn build(self) -> Result<GraphComputeService, GraphError> {
        self.config.validate()?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.worker_threads)
            .thread_name(|i| format!("arbor-graph-{i}"))
            .build()
            .map_err(|e| GraphError::WorkerPool(e.to_string()))?;

        let store = self.store;
        let cache = self.cache.unwrap_or_else(|| {
            Arc::new(AncestorCache::new(Arc::clone(&store), self.config.cache))
        });
        let writer = self
            .writer
            .unwrap_or_else(|| Arc::new(StoreBulkWriter::new(Arc::clone(&store))));

        Ok(GraphComputeService {
            config: self.config,
            store,
            cache,
            traversal: self
                .traversal
                .unwrap_or_else(|| Arc::new(WorkQueueTraversal::new())),
            unit_aggregation: self
                .unit_aggregation
                .unwrap_or_else(|| Arc::new(UnitGraphAggregator::new())),
            object_group_aggregation: self
                .object_group_aggregation
                .unwrap_or_else(|| Arc::new(ObjectGroupAggregator::new())),
            writer,
            pool,
            running: AtomicBool::new(false),
        })
    }
}
