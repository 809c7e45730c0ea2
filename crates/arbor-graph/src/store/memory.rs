//! In-memory metadata store

use super::{BulkWriteOutcome, MetadataStore, Selector};
use crate::error::StoreError;
use arbor_model::{
    AncestorProjection, Collection, DerivedFields, DerivedUpdate, DocumentId, GraphCandidate,
    ObjectGroup, Snapshot, Unit,
};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, Ordering};

/// Round-trip counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    /// Projection reads (`find_unit_projections`)
    pub projection_reads: u64,
    /// Candidate selections
    pub candidate_reads: u64,
    /// Batched writes
    pub bulk_writes: u64,
    /// Full unit reads
    pub unit_reads: u64,
}

/// Thread-safe store keeping documents in id order
#[derive(Debug, Default)]
pub struct InMemoryMetadataStore {
    units: RwLock<BTreeMap<DocumentId, Unit>>,
    object_groups: RwLock<BTreeMap<DocumentId, ObjectGroup>>,
    projection_reads: AtomicU64,
    candidate_reads: AtomicU64,
    bulk_writes: AtomicU64,
    unit_reads: AtomicU64,
}

impl InMemoryMetadataStore {
    /// Create empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create store holding the documents of a snapshot
    #[must_use]
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let store = Self::new();
        for unit in snapshot.units {
            store.insert_unit(unit);
        }
        for object_group in snapshot.object_groups {
            store.insert_object_group(object_group);
        }
        store
    }

    /// Export every document
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            units: self.units.read().values().cloned().collect(),
            object_groups: self.object_groups.read().values().cloned().collect(),
        }
    }

    /// Insert or replace a unit
    pub fn insert_unit(&self, unit: Unit) {
        self.units.write().insert(unit.id.clone(), unit);
    }

    /// Insert or replace an object group
    pub fn insert_object_group(&self, object_group: ObjectGroup) {
        self.object_groups
            .write()
            .insert(object_group.id.clone(), object_group);
    }

    /// Unit by id
    #[must_use]
    pub fn unit(&self, id: &DocumentId) -> Option<Unit> {
        self.units.read().get(id).cloned()
    }

    /// Object group by id
    #[must_use]
    pub fn object_group(&self, id: &DocumentId) -> Option<ObjectGroup> {
        self.object_groups.read().get(id).cloned()
    }

    /// Number of units
    #[must_use]
    pub fn unit_count(&self) -> usize {
        self.units.read().len()
    }

    /// Round-trip counters
    #[must_use]
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            projection_reads: self.projection_reads.load(Ordering::Relaxed),
            candidate_reads: self.candidate_reads.load(Ordering::Relaxed),
            bulk_writes: self.bulk_writes.load(Ordering::Relaxed),
            unit_reads: self.unit_reads.load(Ordering::Relaxed),
        }
    }

    /// Reset round-trip counters
    pub fn reset_stats(&self) {
        self.projection_reads.store(0, Ordering::Relaxed);
        self.candidate_reads.store(0, Ordering::Relaxed);
        self.bulk_writes.store(0, Ordering::Relaxed);
        self.unit_reads.store(0, Ordering::Relaxed);
    }
}

fn matches_query<T: Serialize>(
    document: &T,
    query: &serde_json::Map<String, serde_json::Value>,
) -> Result<bool, StoreError> {
    let value = serde_json::to_value(document).map_err(|e| StoreError::Query(e.to_string()))?;
    let Some(object) = value.as_object() else {
        return Ok(false);
    };
    Ok(query
        .iter()
        .all(|(field, expected)| object.get(field) == Some(expected)))
}

fn select_from<T, F>(
    documents: &BTreeMap<DocumentId, T>,
    selector: &Selector,
    after: Option<&DocumentId>,
    limit: usize,
    is_pending: impl Fn(&T) -> bool,
    candidate: F,
) -> Result<Vec<GraphCandidate>, StoreError>
where
    T: Serialize,
    F: Fn(&T) -> GraphCandidate,
{
    let lower = after.map_or(Bound::Unbounded, Bound::Excluded);
    let mut selected = Vec::new();

    for (id, document) in documents.range::<DocumentId, _>((lower, Bound::Unbounded)) {
        if selected.len() == limit {
            break;
        }
        let matched = match selector {
            Selector::Pending => is_pending(document),
            Selector::Ids(ids) => ids.contains(id),
            Selector::Query(query) => matches_query(document, query)?,
        };
        if matched {
            selected.push(candidate(document));
        }
    }
    Ok(selected)
}

impl MetadataStore for InMemoryMetadataStore {
    fn find_unit_projections(&self, ids: &[DocumentId]) -> Result<Vec<AncestorProjection>, StoreError> {
        self.projection_reads.fetch_add(1, Ordering::Relaxed);
        let units = self.units.read();
        Ok(ids
            .iter()
            .filter_map(|id| units.get(id))
            .map(Unit::projection)
            .collect())
    }

    fn select_candidates(
        &self,
        collection: Collection,
        selector: &Selector,
        after: Option<DocumentId>,
        limit: usize,
    ) -> Result<Vec<GraphCandidate>, StoreError> {
        self.candidate_reads.fetch_add(1, Ordering::Relaxed);
        match collection {
            Collection::Unit => select_from(
                &*self.units.read(),
                selector,
                after.as_ref(),
                limit,
                |u: &Unit| u.graph.is_none(),
                Unit::candidate,
            ),
            Collection::ObjectGroup => select_from(
                &*self.object_groups.read(),
                selector,
                after.as_ref(),
                limit,
                |og: &ObjectGroup| og.graph.is_none(),
                ObjectGroup::candidate,
            ),
        }
    }

    fn apply_bulk(
        &self,
        collection: Collection,
        updates: &[DerivedUpdate],
    ) -> Result<BulkWriteOutcome, StoreError> {
        self.bulk_writes.fetch_add(1, Ordering::Relaxed);

        // Validate the whole batch before touching any document
        if let Some(foreign) = updates.iter().find(|u| u.collection() != collection) {
            return Err(StoreError::Write(format!(
                "update for {} targets {}, batch targets {collection}",
                foreign.id,
                foreign.collection()
            )));
        }

        let mut outcome = BulkWriteOutcome::default();
        match collection {
            Collection::Unit => {
                let mut units = self.units.write();
                for update in updates {
                    match (units.get_mut(&update.id), &update.fields) {
                        (Some(unit), DerivedFields::Unit(graph)) => {
                            unit.graph = Some(graph.clone());
                            outcome.matched += 1;
                        }
                        _ => outcome.missing.push(update.id.clone()),
                    }
                }
            }
            Collection::ObjectGroup => {
                let mut object_groups = self.object_groups.write();
                for update in updates {
                    match (object_groups.get_mut(&update.id), &update.fields) {
                        (Some(og), DerivedFields::ObjectGroup(graph)) => {
                            og.graph = Some(graph.clone());
                            outcome.matched += 1;
                        }
                        _ => outcome.missing.push(update.id.clone()),
                    }
                }
            }
        }
        Ok(outcome)
    }

    fn find_units(&self, ids: &[DocumentId]) -> Result<Vec<Unit>, StoreError> {
        self.unit_reads.fetch_add(1, Ordering::Relaxed);
        let units = self.units.read();
        Ok(ids.iter().filter_map(|id| units.get(id)).cloned().collect())
    }
}
