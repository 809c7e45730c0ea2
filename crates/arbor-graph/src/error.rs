//! Error types for the graph engine
//!
//! Two levels:
//! - [`GraphError`] aborts the current batch (store reads, writes, setup)
//! - [`AggregationError`] fails a single document; the rest of the batch
//!   proceeds and the failure is reported with the document id

use arbor_model::{Collection, DocumentId};
use serde::Serialize;

/// Errors reported by the primary document store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Store cannot be reached
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Read request failed
    #[error("read failed: {0}")]
    Read(String),

    /// Write request failed or applied partially
    #[error("write failed: {0}")]
    Write(String),

    /// Selector cannot be evaluated
    #[error("invalid selector: {0}")]
    Query(String),
}

/// Run-level errors of the graph engine
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// Ancestor projections could not be loaded
    #[error("cache load failed: {source}")]
    CacheLoad {
        /// Underlying store failure
        #[source]
        source: StoreError,
    },

    /// Candidate documents could not be selected
    #[error("candidate selection failed for {collection}: {source}")]
    Selection {
        /// Collection being processed
        collection: Collection,
        /// Underlying store failure
        #[source]
        source: StoreError,
    },

    /// Batched write failed; nothing of the batch may be assumed persisted
    #[error("persistence failed for {collection}: {source}")]
    Persistence {
        /// Collection being written
        collection: Collection,
        /// Underlying store failure
        #[source]
        source: StoreError,
    },

    /// An update does not belong to the collection of its batch
    #[error("update for {id} targets {actual}, batch targets {expected}")]
    MismatchedUpdate {
        /// Document id
        id: DocumentId,
        /// Batch collection
        expected: Collection,
        /// Update collection
        actual: Collection,
    },

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Worker pool could not be created
    #[error("worker pool error: {0}")]
    WorkerPool(String),
}

impl GraphError {
    /// Check if retrying the same batch may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::CacheLoad { .. } | Self::Selection { .. } | Self::Persistence { .. }
        )
    }

    /// Create configuration error
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

/// Per-document computation failures
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(rename_all = "camelCase")]
pub enum AggregationError {
    /// Document (or one of its ancestors) has no originating agency
    #[error("document {0} has no originating agency")]
    MissingAgency(DocumentId),

    /// A parent id does not resolve to a unit
    #[error("unit {child} references unknown parent {parent}")]
    DanglingParent {
        /// Referencing document
        child: DocumentId,
        /// Unknown parent
        parent: DocumentId,
    },

    /// An object group references a unit whose graph is not computed
    #[error("object group {object_group} references unit {unit} without computed graph")]
    ParentGraphMissing {
        /// Object group
        object_group: DocumentId,
        /// Referenced unit
        unit: DocumentId,
    },
}

/// Failed document of a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentFailure {
    /// Document id
    pub id: DocumentId,
    /// Cause
    pub error: AggregationError,
}

impl DocumentFailure {
    /// Create failure record
    #[inline]
    #[must_use]
    pub fn new(id: DocumentId, error: AggregationError) -> Self {
        Self { id, error }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graph_error_display() {
        let err = GraphError::CacheLoad {
            source: StoreError::Read("timeout".to_string()),
        };
        assert_eq!(err.to_string(), "cache load failed: read failed: timeout");
    }

    #[test]
    fn graph_error_is_retryable() {
        assert!(GraphError::Persistence {
            collection: Collection::Unit,
            source: StoreError::Write("partial".to_string()),
        }
        .is_retryable());
        assert!(!GraphError::config("batch_size").is_retryable());
    }

    #[test]
    fn aggregation_error_names_document() {
        let err = AggregationError::DanglingParent {
            child: "u2".into(),
            parent: "u9".into(),
        };
        assert_eq!(err.to_string(), "unit u2 references unknown parent u9");
    }
}
