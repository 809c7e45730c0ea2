//! Primary document store port
//!
//! The engine only ever talks to the store through [`MetadataStore`]:
//! batched projection reads, cursor-paginated candidate selection and
//! batched update-if-exists writes. [`InMemoryMetadataStore`] is the
//! bundled implementation used by the CLI and the tests.

mod memory;

pub use memory::{InMemoryMetadataStore, StoreStats};

use crate::error::StoreError;
use arbor_model::{AncestorProjection, Collection, DerivedUpdate, DocumentId, GraphCandidate, Unit};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Pre-compiled document filter supplied by the calling workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Selector {
    /// Documents whose derived fields were never computed
    Pending,
    /// Explicit document ids
    Ids(BTreeSet<DocumentId>),
    /// Opaque store-native filter
    Query(serde_json::Map<String, serde_json::Value>),
}

impl Selector {
    /// Selector matching the given ids
    #[must_use]
    pub fn ids<I, T>(ids: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<DocumentId>,
    {
        Self::Ids(ids.into_iter().map(Into::into).collect())
    }
}

/// Result of a batched write
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkWriteOutcome {
    /// Updates applied to an existing document
    pub matched: usize,
    /// Update targets that do not exist (nothing was created)
    pub missing: Vec<DocumentId>,
}

/// Primary document store
#[cfg_attr(test, mockall::automock)]
pub trait MetadataStore: Send + Sync {
    /// Load ancestor projections of units in one round-trip
    ///
    /// Unknown ids are absent from the result.
    ///
    /// # Errors
    /// Returns `StoreError` if the read fails.
    fn find_unit_projections(&self, ids: &[DocumentId]) -> Result<Vec<AncestorProjection>, StoreError>;

    /// Select up to `limit` candidates with an id greater than `after`, ordered by id
    ///
    /// # Errors
    /// Returns `StoreError::Query` if the selector cannot be evaluated.
    fn select_candidates(
        &self,
        collection: Collection,
        selector: &Selector,
        after: Option<DocumentId>,
        limit: usize,
    ) -> Result<Vec<GraphCandidate>, StoreError>;

    /// Replace derived fields of existing documents in one batched operation
    ///
    /// # Errors
    /// Returns `StoreError::Write` if the batch fails; the outcome of the
    /// batch is then unknown.
    fn apply_bulk(
        &self,
        collection: Collection,
        updates: &[DerivedUpdate],
    ) -> Result<BulkWriteOutcome, StoreError>;

    /// Load full unit documents in one round-trip
    ///
    /// # Errors
    /// Returns `StoreError` if the read fails.
    fn find_units(&self, ids: &[DocumentId]) -> Result<Vec<Unit>, StoreError>;
}
