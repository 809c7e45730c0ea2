use arbor_graph::{
    AggregationError, BulkWriteOutcome, GraphComputeService, GraphError, InMemoryMetadataStore,
    MetadataStore, Selector, StoreError,
};
use arbor_model::{AncestorProjection, Collection, DerivedUpdate, DocumentId, GraphCandidate, Unit};
use arbor_test_utils::{
    create_object_group, create_unit, setup_chain_store, setup_service, setup_store, test_config,
    unit_graph,
};
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Store whose reads or writes can be switched to failing
struct FlakyStore {
    inner: Arc<InMemoryMetadataStore>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl FlakyStore {
    fn new(inner: Arc<InMemoryMetadataStore>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
        })
    }
}

impl MetadataStore for FlakyStore {
    fn find_unit_projections(&self, ids: &[DocumentId]) -> Result<Vec<AncestorProjection>, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Read("replica lagging".to_string()));
        }
        self.inner.find_unit_projections(ids)
    }

    fn select_candidates(
        &self,
        collection: Collection,
        selector: &Selector,
        after: Option<DocumentId>,
        limit: usize,
    ) -> Result<Vec<GraphCandidate>, StoreError> {
        self.inner.select_candidates(collection, selector, after, limit)
    }

    fn apply_bulk(
        &self,
        collection: Collection,
        updates: &[DerivedUpdate],
    ) -> Result<BulkWriteOutcome, StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Write("bulk request timed out".to_string()));
        }
        self.inner.apply_bulk(collection, updates)
    }

    fn find_units(&self, ids: &[DocumentId]) -> Result<Vec<Unit>, StoreError> {
        self.inner.find_units(ids)
    }
}

#[test]
fn test_malformed_documents_are_isolated() {
    let mut orphan = create_unit("no-agency", "X", &[]);
    orphan.originating_agency = None;
    let store = setup_store(
        vec![
            create_unit("u1", "A1", &[]),
            create_unit("u2", "A2", &["u1"]),
            create_unit("dangling", "A2", &["missing"]),
            orphan,
            create_unit("below-orphan", "A3", &["no-agency"]),
        ],
        Vec::new(),
    );

    let report = setup_service(store.clone())
        .build_graph()
        .unwrap()
        .completed()
        .unwrap();

    assert_eq!(report.units.computed, 2);
    let mut failures: Vec<(String, AggregationError)> = report
        .units
        .failures
        .iter()
        .map(|f| (f.id.to_string(), f.error.clone()))
        .collect();
    failures.sort_by(|a, b| a.0.cmp(&b.0));
    assert_eq!(
        failures,
        vec![
            (
                "below-orphan".to_string(),
                AggregationError::MissingAgency("no-agency".into())
            ),
            (
                "dangling".to_string(),
                AggregationError::DanglingParent {
                    child: "dangling".into(),
                    parent: "missing".into(),
                }
            ),
            (
                "no-agency".to_string(),
                AggregationError::MissingAgency("no-agency".into())
            ),
        ]
    );
    assert_eq!(unit_graph(&store, "u2").max_depth, 2);
    assert!(store.unit(&"dangling".into()).unwrap().graph.is_none());
}

#[test]
fn test_object_group_of_failed_unit_is_reported() {
    let store = setup_store(
        vec![create_unit("bad", "A", &["missing"])],
        vec![create_object_group("og1", &["bad"])],
    );
    let report = setup_service(store.clone())
        .build_graph()
        .unwrap()
        .completed()
        .unwrap();

    assert_eq!(report.object_groups.computed, 0);
    assert_eq!(
        report.object_groups.failures[0].error,
        AggregationError::ParentGraphMissing {
            object_group: "og1".into(),
            unit: "bad".into(),
        }
    );
}

#[test]
fn test_persistence_failure_leaves_documents_untouched() {
    let inner = setup_chain_store(3);
    let store = FlakyStore::new(inner.clone());
    let service = GraphComputeService::new(store.clone(), test_config()).unwrap();

    store.fail_writes.store(true, Ordering::SeqCst);
    let err = service.build_graph().unwrap_err();
    assert!(matches!(
        err,
        GraphError::Persistence {
            collection: Collection::Unit,
            ..
        }
    ));
    assert!(err.is_retryable());
    assert!(!service.is_in_progress());
    assert!(inner.snapshot().units.iter().all(|u| u.graph.is_none()));

    // Retrying the same run succeeds and yields the full result
    store.fail_writes.store(false, Ordering::SeqCst);
    let report = service.build_graph().unwrap().completed().unwrap();
    assert_eq!(report.units.computed, 3);
    assert_eq!(unit_graph(&inner, "u2").max_depth, 3);
}

#[test]
fn test_cache_load_failure_aborts_batch() {
    let inner = setup_chain_store(3);
    let store = FlakyStore::new(inner.clone());
    let service = GraphComputeService::new(store.clone(), test_config()).unwrap();

    store.fail_reads.store(true, Ordering::SeqCst);
    let err = service
        .build_graph_for(Collection::Unit, &Selector::Pending)
        .unwrap_err();
    assert!(matches!(err, GraphError::CacheLoad { .. }));
    assert!(!service.is_in_progress());
    assert_eq!(inner.stats().bulk_writes, 0);

    store.fail_reads.store(false, Ordering::SeqCst);
    assert!(service.build_graph().unwrap().is_completed());
    assert_eq!(unit_graph(&inner, "u2").originating_agencies.len(), 3);
}

#[test]
fn test_mismatched_update_is_rejected_by_store() {
    let store = setup_store(vec![create_unit("u1", "A", &[])], Vec::new());
    let update = DerivedUpdate::object_group(
        "u1".into(),
        arbor_model::ObjectGroupGraph {
            originating_agencies: Default::default(),
            last_computed_at: chrono::Utc::now(),
        },
    );
    let err = store.apply_bulk(Collection::Unit, &[update]).unwrap_err();
    assert!(matches!(err, StoreError::Write(_)));
}
