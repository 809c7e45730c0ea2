//! Arbor graph engine
//!
//! Derives and persists the ancestor graph of every Unit and ObjectGroup.
//!
//! # Pipeline
//!
//! ```text
//! select batch → prefetch ancestors → traverse + aggregate (worker pool) → bulk write
//!                      ↑
//!                AncestorCache (read-through, moka)
//! ```
//!
//! Each stage sits behind a narrow trait so it can be replaced in tests:
//! [`AncestorLookup`], [`GraphTraversal`], [`UnitAggregation`],
//! [`ObjectGroupAggregation`] and [`BulkWriter`]. The
//! [`GraphComputeService`] owns one instance of each plus the worker pool,
//! and allows a single build at a time.
//!
//! # Example
//!
//! ```rust,ignore
//! use arbor_graph::{GraphComputeConfig, GraphComputeService, InMemoryMetadataStore};
//! use std::sync::Arc;
//!
//! let store = Arc::new(InMemoryMetadataStore::new());
//! let service = GraphComputeService::new(store, GraphComputeConfig::default())?;
//!
//! if let Some(report) = service.build_graph()?.completed() {
//!     println!("computed {} units", report.units.computed);
//! }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod aggregate;
pub mod cache;
pub mod config;
pub mod error;
pub mod prefetch;
pub mod service;
pub mod store;
pub mod traversal;
pub mod writer;

pub use aggregate::{
    ObjectGroupAggregation, ObjectGroupAggregator, UnitAggregation, UnitGraphAggregator,
    FIXED_MIN_DEPTH,
};
pub use cache::{AncestorCache, AncestorLookup, CacheStats};
pub use config::{AncestorCacheConfig, GraphComputeConfig};
pub use error::{AggregationError, DocumentFailure, GraphError, StoreError};
pub use prefetch::AncestorSnapshot;
pub use service::{
    BuildOutcome, CollectionReport, GraphComputeReport, GraphComputeService,
    GraphComputeServiceBuilder,
};
pub use store::{BulkWriteOutcome, InMemoryMetadataStore, MetadataStore, Selector, StoreStats};
pub use traversal::{GraphTraversal, WorkQueueTraversal};
pub use writer::{BulkWriter, StoreBulkWriter};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for running graph computations
    pub use crate::{
        BuildOutcome, GraphComputeConfig, GraphComputeReport, GraphComputeService, GraphError,
        InMemoryMetadataStore, MetadataStore, Selector,
    };
    pub use arbor_model::{Collection, DocumentId, ObjectGroup, Unit};
}
