//! Derived-field aggregation
//!
//! - [`UnitGraphAggregator`] folds the relations of one unit into a
//!   complete [`UnitGraph`](arbor_model::UnitGraph)
//! - [`ObjectGroupAggregator`] unions the already-computed agencies of the
//!   units referencing an object group
//!
//! Both produce a replace-style [`DerivedUpdate`] and never touch the store.

mod object_group;
mod unit;

pub use object_group::ObjectGroupAggregator;
pub use unit::{UnitGraphAggregator, FIXED_MIN_DEPTH};

use crate::error::AggregationError;
use crate::prefetch::AncestorSnapshot;
use arbor_model::{DerivedUpdate, GraphCandidate, GraphRelation};
use chrono::{DateTime, Utc};

/// Unit aggregation port
pub trait UnitAggregation: Send + Sync {
    /// Fold relations discovered from `root` into its derived fields
    ///
    /// # Errors
    /// Returns `AggregationError::MissingAgency` if the root has no agency.
    fn aggregate(
        &self,
        root: &GraphCandidate,
        relations: &[GraphRelation],
        computed_at: DateTime<Utc>,
    ) -> Result<DerivedUpdate, AggregationError>;
}

/// Object group aggregation port
pub trait ObjectGroupAggregation: Send + Sync {
    /// Union the computed agencies of the units referencing `object_group`
    ///
    /// # Errors
    /// Returns `AggregationError` if a referenced unit is unknown or has no
    /// computed graph yet.
    fn aggregate(
        &self,
        object_group: &GraphCandidate,
        units: &AncestorSnapshot,
        computed_at: DateTime<Utc>,
    ) -> Result<DerivedUpdate, AggregationError>;
}
