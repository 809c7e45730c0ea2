//! Unit attribute aggregation

use super::UnitAggregation;
use crate::error::AggregationError;
use arbor_model::{DerivedUpdate, GraphCandidate, GraphRelation, UnitGraph};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};

/// Value stored in `min_depth` for every unit
///
/// Relation depths never change it. Whether it should track the smallest
/// observed depth is an open product question, so it stays a constant.
pub const FIXED_MIN_DEPTH: u32 = 1;

/// Pure fold of relations into unit derived fields
#[derive(Debug, Clone, Copy, Default)]
pub struct UnitGraphAggregator;

impl UnitGraphAggregator {
    /// Create aggregator
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl UnitAggregation for UnitGraphAggregator {
    fn aggregate(
        &self,
        root: &GraphCandidate,
        relations: &[GraphRelation],
        computed_at: DateTime<Utc>,
    ) -> Result<DerivedUpdate, AggregationError> {
        let own_agency = root
            .originating_agency
            .clone()
            .ok_or_else(|| AggregationError::MissingAgency(root.id.clone()))?;

        let mut graph = UnitGraph {
            ancestor_unit_ids: BTreeSet::new(),
            depth_by_agency: BTreeMap::new(),
            min_depth: FIXED_MIN_DEPTH,
            max_depth: 1,
            agency_edges: BTreeSet::new(),
            originating_agencies: BTreeSet::from([own_agency]),
            ancestor_ids_by_agency: BTreeMap::new(),
            last_computed_at: computed_at,
        };

        let mut deepest = 0;
        for relation in relations {
            graph.ancestor_unit_ids.insert(relation.parent_id.clone());
            graph.agency_edges.insert(relation.agency_edge());
            graph
                .originating_agencies
                .insert(relation.parent_agency.clone());
            graph
                .ancestor_ids_by_agency
                .entry(relation.parent_agency.clone())
                .or_default()
                .insert(relation.parent_id.clone());
            graph
                .depth_by_agency
                .entry(relation.parent_agency.clone())
                .and_modify(|d| *d = (*d).min(relation.depth))
                .or_insert(relation.depth);
            deepest = deepest.max(relation.depth);
        }
        graph.max_depth = deepest + 1;

        Ok(DerivedUpdate::unit(root.id.clone(), graph))
    }
}
