//! Error types for rule resolution

use arbor_graph::StoreError;
use arbor_model::DocumentId;

/// Rule resolution errors
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// Unit does not exist
    #[error("unit not found: {0}")]
    UnitNotFound(DocumentId),

    /// Unit has no computed ancestor graph yet
    #[error("ancestor graph of unit {0} has not been computed")]
    GraphNotComputed(DocumentId),

    /// Store read failed
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl ResolveError {
    /// Check if retrying may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Store(_) | Self::GraphNotComputed(_))
    }
}
