//! Unit and ObjectGroup documents
//!
//! Documents are created by ingest with only their own fields populated.
//! The `graph` block holds the derived fields and stays `None` until the
//! first graph computation; it is always replaced as a whole.

use crate::graph::{AgencyEdge, AncestorProjection, GraphCandidate};
use crate::id::{AgencyId, DocumentId};
use crate::rules::Management;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Archive unit: a node of the description hierarchy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Unit {
    /// Unit id
    pub id: DocumentId,
    /// Direct parent unit ids
    #[serde(default)]
    pub up: Vec<DocumentId>,
    /// Agency that produced the unit
    #[serde(default)]
    pub originating_agency: Option<AgencyId>,
    /// Attached object group
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_group: Option<DocumentId>,
    /// Ingest operation that created the unit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    /// Descriptive title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Local management rules
    #[serde(default)]
    pub management: Management,
    /// Derived graph fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graph: Option<UnitGraph>,
}

impl Unit {
    /// Create root unit for an agency
    #[must_use]
    pub fn new(id: impl Into<DocumentId>, agency: impl Into<AgencyId>) -> Self {
        Self {
            id: id.into(),
            up: Vec::new(),
            originating_agency: Some(agency.into()),
            object_group: None,
            operation: None,
            title: None,
            management: Management::default(),
            graph: None,
        }
    }

    /// With parents
    #[must_use]
    pub fn with_up<I, T>(mut self, up: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<DocumentId>,
    {
        self.up = up.into_iter().map(Into::into).collect();
        self
    }

    /// With attached object group
    #[must_use]
    pub fn with_object_group(mut self, object_group: impl Into<DocumentId>) -> Self {
        self.object_group = Some(object_group.into());
        self
    }

    /// With ingest operation id
    #[must_use]
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    /// With management rules
    #[must_use]
    pub fn with_management(mut self, management: Management) -> Self {
        self.management = management;
        self
    }

    /// Ancestor projection of this unit
    #[must_use]
    pub fn projection(&self) -> AncestorProjection {
        AncestorProjection {
            id: self.id.clone(),
            up: self.up.clone(),
            originating_agency: self.originating_agency.clone(),
            originating_agencies: self
                .graph
                .as_ref()
                .map(|g| g.originating_agencies.clone()),
        }
    }

    /// Candidate view of this unit
    #[must_use]
    pub fn candidate(&self) -> GraphCandidate {
        GraphCandidate {
            id: self.id.clone(),
            up: self.up.clone(),
            originating_agency: self.originating_agency.clone(),
            object_group: self.object_group.clone(),
        }
    }
}

/// Derived ancestor-graph fields of a unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitGraph {
    /// All reachable ancestor unit ids
    pub ancestor_unit_ids: BTreeSet<DocumentId>,
    /// Smallest depth at which each agency is first encountered
    pub depth_by_agency: BTreeMap<AgencyId, u32>,
    /// Minimal depth
    pub min_depth: u32,
    /// Maximal depth
    pub max_depth: u32,
    /// Agency-to-agency edges
    pub agency_edges: BTreeSet<AgencyEdge>,
    /// Own agency plus every ancestor agency
    pub originating_agencies: BTreeSet<AgencyId>,
    /// Ancestor unit ids grouped by their agency
    pub ancestor_ids_by_agency: BTreeMap<AgencyId, BTreeSet<DocumentId>>,
    /// When the fields were computed
    pub last_computed_at: DateTime<Utc>,
}

impl UnitGraph {
    /// Compare every derived field except the computation timestamp
    #[must_use]
    pub fn same_ancestry(&self, other: &UnitGraph) -> bool {
        self.ancestor_unit_ids == other.ancestor_unit_ids
            && self.depth_by_agency == other.depth_by_agency
            && self.min_depth == other.min_depth
            && self.max_depth == other.max_depth
            && self.agency_edges == other.agency_edges
            && self.originating_agencies == other.originating_agencies
            && self.ancestor_ids_by_agency == other.ancestor_ids_by_agency
    }
}

/// Object group: leaf bundling binary content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectGroup {
    /// Object group id
    pub id: DocumentId,
    /// Units referencing this object group
    #[serde(default)]
    pub up: Vec<DocumentId>,
    /// Agency that produced the object group
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub originating_agency: Option<AgencyId>,
    /// Ingest operation that created the object group
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    /// Derived graph fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graph: Option<ObjectGroupGraph>,
}

impl ObjectGroup {
    /// Create object group referenced by the given units
    #[must_use]
    pub fn new<I, T>(id: impl Into<DocumentId>, up: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<DocumentId>,
    {
        Self {
            id: id.into(),
            up: up.into_iter().map(Into::into).collect(),
            originating_agency: None,
            operation: None,
            graph: None,
        }
    }

    /// Candidate view of this object group
    #[must_use]
    pub fn candidate(&self) -> GraphCandidate {
        GraphCandidate {
            id: self.id.clone(),
            up: self.up.clone(),
            originating_agency: self.originating_agency.clone(),
            object_group: None,
        }
    }
}

/// Derived fields of an object group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectGroupGraph {
    /// Union of the referencing units' originating agencies
    pub originating_agencies: BTreeSet<AgencyId>,
    /// When the fields were computed
    pub last_computed_at: DateTime<Utc>,
}

/// Serializable content of a metadata store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Units
    #[serde(default)]
    pub units: Vec<Unit>,
    /// Object groups
    #[serde(default)]
    pub object_groups: Vec<ObjectGroup>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_unit_has_no_graph() {
        let unit = Unit::new("u1", "AG1").with_up(["u0"]);
        assert!(unit.graph.is_none());
        assert_eq!(unit.projection().originating_agencies, None);
        assert_eq!(unit.candidate().up, vec![DocumentId::from("u0")]);
    }

    #[test]
    fn snapshot_parses_minimal_documents() {
        let json = r#"{
            "units": [{"id": "u1", "originatingAgency": "AG1"}],
            "objectGroups": [{"id": "og1", "up": ["u1"]}]
        }"#;
        let snapshot: Snapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.units.len(), 1);
        assert_eq!(snapshot.object_groups[0].up, vec![DocumentId::from("u1")]);
    }

    #[test]
    fn same_ancestry_ignores_timestamp() {
        let a = UnitGraph {
            ancestor_unit_ids: BTreeSet::new(),
            depth_by_agency: BTreeMap::new(),
            min_depth: 1,
            max_depth: 1,
            agency_edges: BTreeSet::new(),
            originating_agencies: BTreeSet::from([AgencyId::from("AG1")]),
            ancestor_ids_by_agency: BTreeMap::new(),
            last_computed_at: Utc::now(),
        };
        let mut b = a.clone();
        b.last_computed_at = a.last_computed_at + chrono::Duration::seconds(5);
        assert!(a.same_ancestry(&b));
        assert_ne!(a, b);
    }
}
