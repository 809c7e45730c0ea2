use arbor_graph::{
    BuildOutcome, BulkWriteOutcome, GraphComputeService, InMemoryMetadataStore, MetadataStore,
    Selector, StoreError,
};
use arbor_model::{AncestorProjection, Collection, DerivedUpdate, DocumentId, GraphCandidate, Unit};
use arbor_test_utils::{create_unit, setup_chain_store, test_config, unit_graph};
use crossbeam::channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Store that parks the first candidate selection until released
struct SlowStore {
    inner: Arc<InMemoryMetadataStore>,
    entered: Sender<()>,
    release: Receiver<()>,
    parked: AtomicBool,
    selections: AtomicUsize,
}

impl SlowStore {
    fn new(inner: Arc<InMemoryMetadataStore>) -> (Arc<Self>, Receiver<()>, Sender<()>) {
        let (entered_tx, entered_rx) = bounded(1);
        let (release_tx, release_rx) = bounded(1);
        let store = Arc::new(Self {
            inner,
            entered: entered_tx,
            release: release_rx,
            parked: AtomicBool::new(false),
            selections: AtomicUsize::new(0),
        });
        (store, entered_rx, release_tx)
    }
}

impl MetadataStore for SlowStore {
    fn find_unit_projections(&self, ids: &[DocumentId]) -> Result<Vec<AncestorProjection>, StoreError> {
        self.inner.find_unit_projections(ids)
    }

    fn select_candidates(
        &self,
        collection: Collection,
        selector: &Selector,
        after: Option<DocumentId>,
        limit: usize,
    ) -> Result<Vec<GraphCandidate>, StoreError> {
        self.selections.fetch_add(1, Ordering::SeqCst);
        if !self.parked.swap(true, Ordering::SeqCst) {
            self.entered
                .send(())
                .map_err(|e| StoreError::Unavailable(e.to_string()))?;
            self.release
                .recv()
                .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        }
        self.inner.select_candidates(collection, selector, after, limit)
    }

    fn apply_bulk(
        &self,
        collection: Collection,
        updates: &[DerivedUpdate],
    ) -> Result<BulkWriteOutcome, StoreError> {
        self.inner.apply_bulk(collection, updates)
    }

    fn find_units(&self, ids: &[DocumentId]) -> Result<Vec<Unit>, StoreError> {
        self.inner.find_units(ids)
    }
}

#[test]
fn test_second_build_is_rejected_while_running() {
    let inner = setup_chain_store(4);
    let (store, entered, release) = SlowStore::new(inner.clone());
    let service = Arc::new(GraphComputeService::new(store.clone(), test_config()).unwrap());

    let first = {
        let service = Arc::clone(&service);
        thread::spawn(move || service.build_graph())
    };
    entered
        .recv_timeout(Duration::from_secs(10))
        .expect("first build never reached the store");

    assert!(service.is_in_progress());
    assert_eq!(service.build_graph().unwrap(), BuildOutcome::AlreadyRunning);
    assert!(!service
        .build_graph_for(Collection::Unit, &Selector::Pending)
        .unwrap()
        .is_completed());

    release.send(()).unwrap();
    let report = first.join().unwrap().unwrap().completed().unwrap();

    assert_eq!(report.units.computed, 4);
    assert!(!service.is_in_progress());
    // Unit phase + object group phase, nothing from the rejected calls
    assert_eq!(store.selections.load(Ordering::SeqCst), 2);
    assert_eq!(unit_graph(&inner, "u3").max_depth, 4);
}

#[test]
fn test_many_concurrent_callers_run_once() {
    let inner = setup_chain_store(3);
    let (store, entered, release) = SlowStore::new(inner.clone());
    let service = Arc::new(GraphComputeService::new(store, test_config()).unwrap());

    let first = {
        let service = Arc::clone(&service);
        thread::spawn(move || service.build_graph())
    };
    entered.recv_timeout(Duration::from_secs(10)).unwrap();

    let rejected: Vec<_> = (0..8)
        .map(|_| {
            let service = Arc::clone(&service);
            thread::spawn(move || service.build_graph().unwrap())
        })
        .collect();
    for handle in rejected {
        assert_eq!(handle.join().unwrap(), BuildOutcome::AlreadyRunning);
    }

    release.send(()).unwrap();
    assert!(first.join().unwrap().unwrap().is_completed());
}

#[test]
fn test_parallel_workers_share_one_snapshot() {
    let inner = Arc::new(InMemoryMetadataStore::new());
    inner.insert_unit(create_unit("root", "A", &[]));
    for i in 0..200 {
        inner.insert_unit(create_unit(&format!("child-{i:03}"), "B", &["root"]));
    }
    let service =
        GraphComputeService::new(inner.clone(), test_config().with_batch_size(64).with_worker_threads(4))
            .unwrap();

    let report = service
        .build_graph_for(Collection::Unit, &Selector::Pending)
        .unwrap()
        .completed()
        .unwrap();
    assert_eq!(report.computed, 201);
    assert_eq!(report.batches, 4);
    for i in [0, 63, 64, 199] {
        let graph = unit_graph(&inner, &format!("child-{i:03}"));
        assert_eq!(graph.max_depth, 2);
        assert_eq!(graph.originating_agencies.len(), 2);
    }
}
