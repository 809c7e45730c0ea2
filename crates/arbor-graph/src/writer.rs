//! Bulk persistence of derived fields
//!
//! One batch of updates becomes one store operation. A failed operation
//! leaves the batch indeterminate; retrying the same batch is safe because
//! recomputation from an unchanged hierarchy yields the same fields.

use crate::error::GraphError;
use crate::store::{BulkWriteOutcome, MetadataStore};
use arbor_model::{Collection, DerivedUpdate};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Persistence port
pub trait BulkWriter: Send + Sync {
    /// Submit the updates of one collection as a single batched write
    ///
    /// # Errors
    /// Returns `GraphError::MismatchedUpdate` if an update targets another
    /// collection, `GraphError::Persistence` if the write fails.
    fn write(
        &self,
        collection: Collection,
        updates: Vec<DerivedUpdate>,
    ) -> Result<BulkWriteOutcome, GraphError>;
}

/// Writer issuing one `apply_bulk` per batch
#[derive(Clone)]
pub struct StoreBulkWriter {
    store: Arc<dyn MetadataStore>,
}

impl StoreBulkWriter {
    /// Create writer
    #[must_use]
    pub fn new(store: Arc<dyn MetadataStore>) -> Self {
        Self { store }
    }
}

impl std::fmt::Debug for StoreBulkWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreBulkWriter").finish_non_exhaustive()
    }
}

impl BulkWriter for StoreBulkWriter {
    fn write(
        &self,
        collection: Collection,
        updates: Vec<DerivedUpdate>,
    ) -> Result<BulkWriteOutcome, GraphError> {
        if let Some(foreign) = updates.iter().find(|u| u.collection() != collection) {
            return Err(GraphError::MismatchedUpdate {
                id: foreign.id.clone(),
                expected: collection,
                actual: foreign.collection(),
            });
        }

        // Last update per id wins
        let updates: Vec<DerivedUpdate> = updates
            .into_iter()
            .map(|u| (u.id.clone(), u))
            .collect::<BTreeMap<_, _>>()
            .into_values()
            .collect();
        if updates.is_empty() {
            return Ok(BulkWriteOutcome::default());
        }

        let outcome = self
            .store
            .apply_bulk(collection, &updates)
            .map_err(|source| GraphError::Persistence { collection, source })?;

        tracing::debug!("Bulk write on {}: {} documents matched", collection, outcome.matched);
        for id in &outcome.missing {
            tracing::warn!("Derived update skipped, {} {} does not exist", collection, id);
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::store::MockMetadataStore;
    use arbor_model::{ObjectGroupGraph, UnitGraph};
    use chrono::Utc;
    use std::collections::BTreeSet;

    fn unit_update(id: &str, max_depth: u32) -> DerivedUpdate {
        DerivedUpdate::unit(
            id.into(),
            UnitGraph {
                ancestor_unit_ids: BTreeSet::new(),
                depth_by_agency: BTreeMap::new(),
                min_depth: 1,
                max_depth,
                agency_edges: BTreeSet::new(),
                originating_agencies: BTreeSet::new(),
                ancestor_ids_by_agency: BTreeMap::new(),
                last_computed_at: Utc::now(),
            },
        )
    }

    #[test]
    fn one_store_call_per_batch_with_last_update_winning() {
        let mut store = MockMetadataStore::new();
        store
            .expect_apply_bulk()
            .times(1)
            .withf(|collection, updates| {
                *collection == Collection::Unit
                    && updates.len() == 2
                    && matches!(&updates[0].fields, arbor_model::DerivedFields::Unit(g) if g.max_depth == 3)
            })
            .returning(|_, updates| {
                Ok(BulkWriteOutcome {
                    matched: updates.len(),
                    missing: Vec::new(),
                })
            });
        let writer = StoreBulkWriter::new(Arc::new(store));

        let outcome = writer
            .write(
                Collection::Unit,
                vec![unit_update("u1", 2), unit_update("u2", 1), unit_update("u1", 3)],
            )
            .unwrap();
        assert_eq!(outcome.matched, 2);
    }

    #[test]
    fn empty_batch_skips_store() {
        let mut store = MockMetadataStore::new();
        store.expect_apply_bulk().never();
        let writer = StoreBulkWriter::new(Arc::new(store));

        let outcome = writer.write(Collection::Unit, Vec::new()).unwrap();
        assert_eq!(outcome, BulkWriteOutcome::default());
    }

    #[test]
    fn foreign_update_is_rejected_before_writing() {
        let mut store = MockMetadataStore::new();
        store.expect_apply_bulk().never();
        let writer = StoreBulkWriter::new(Arc::new(store));

        let update = DerivedUpdate::object_group(
            "og1".into(),
            ObjectGroupGraph {
                originating_agencies: BTreeSet::new(),
                last_computed_at: Utc::now(),
            },
        );
        let err = writer.write(Collection::Unit, vec![update]).unwrap_err();
        assert!(matches!(err, GraphError::MismatchedUpdate { .. }));
    }

    #[test]
    fn store_failure_maps_to_persistence() {
        let mut store = MockMetadataStore::new();
        store
            .expect_apply_bulk()
            .returning(|_, _| Err(StoreError::Write("partial batch".to_string())));
        let writer = StoreBulkWriter::new(Arc::new(store));

        let err = writer
            .write(Collection::Unit, vec![unit_update("u1", 1)])
            .unwrap_err();
        assert!(matches!(
            err,
            GraphError::Persistence {
                collection: Collection::Unit,
                ..
            }
        ));
    }
}
