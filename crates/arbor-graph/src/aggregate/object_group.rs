//! Object group attribute aggregation

use super::ObjectGroupAggregation;
use crate::error::AggregationError;
use crate::prefetch::AncestorSnapshot;
use arbor_model::{DerivedUpdate, GraphCandidate, ObjectGroupGraph};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

/// Union of referencing units' originating agencies
///
/// Object groups are leaves: the referenced units must already carry their
/// computed agencies, nothing is traversed here.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObjectGroupAggregator;

impl ObjectGroupAggregator {
    /// Create aggregator
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ObjectGroupAggregation for ObjectGroupAggregator {
    fn aggregate(
        &self,
        object_group: &GraphCandidate,
        units: &AncestorSnapshot,
        computed_at: DateTime<Utc>,
    ) -> Result<DerivedUpdate, AggregationError> {
        let mut originating_agencies = BTreeSet::new();

        for unit_id in &object_group.up {
            let unit = units
                .get(unit_id)
                .ok_or_else(|| AggregationError::DanglingParent {
                    child: object_group.id.clone(),
                    parent: unit_id.clone(),
                })?;
            let agencies = unit.originating_agencies.as_ref().ok_or_else(|| {
                AggregationError::ParentGraphMissing {
                    object_group: object_group.id.clone(),
                    unit: unit_id.clone(),
                }
            })?;
            originating_agencies.extend(agencies.iter().cloned());
        }

        Ok(DerivedUpdate::object_group(
            object_group.id.clone(),
            ObjectGroupGraph {
                originating_agencies,
                last_computed_at: computed_at,
            },
        ))
    }
}
