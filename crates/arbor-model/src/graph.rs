//! Graph traversal values
//!
//! [`AncestorProjection`] is the minimal view of a unit the traversal needs;
//! [`GraphRelation`] is one edge discovered while walking a root document's
//! ancestry. Relations are transient and never persisted.

use crate::id::{AgencyId, DocumentId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Minimal ancestor projection `{id, up, originatingAgency, originatingAgencies}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AncestorProjection {
    /// Unit id
    pub id: DocumentId,
    /// Direct parent ids
    #[serde(default)]
    pub up: Vec<DocumentId>,
    /// Agency that produced the unit
    #[serde(default)]
    pub originating_agency: Option<AgencyId>,
    /// Persisted aggregated agencies, `None` until the unit graph is computed
    #[serde(default)]
    pub originating_agencies: Option<BTreeSet<AgencyId>>,
}

impl AncestorProjection {
    /// Create projection for a unit that has not been computed yet
    #[must_use]
    pub fn new(
        id: impl Into<DocumentId>,
        up: Vec<DocumentId>,
        originating_agency: Option<AgencyId>,
    ) -> Self {
        Self {
            id: id.into(),
            up,
            originating_agency,
            originating_agencies: None,
        }
    }

    /// With computed originating agencies
    #[must_use]
    pub fn with_originating_agencies(mut self, agencies: BTreeSet<AgencyId>) -> Self {
        self.originating_agencies = Some(agencies);
        self
    }
}

/// Document selected for (re)computation in a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphCandidate {
    /// Document id
    pub id: DocumentId,
    /// Direct parent unit ids
    #[serde(default)]
    pub up: Vec<DocumentId>,
    /// Agency that produced the document
    #[serde(default)]
    pub originating_agency: Option<AgencyId>,
    /// Attached object group (units only)
    #[serde(default)]
    pub object_group: Option<DocumentId>,
}

impl GraphCandidate {
    /// Create candidate
    #[must_use]
    pub fn new(
        id: impl Into<DocumentId>,
        up: Vec<DocumentId>,
        originating_agency: Option<AgencyId>,
    ) -> Self {
        Self {
            id: id.into(),
            up,
            originating_agency,
            object_group: None,
        }
    }
}

/// One edge `(child, childAgency) -> (parent, parentAgency)` found at `depth`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GraphRelation {
    /// Child unit id
    pub child_id: DocumentId,
    /// Child originating agency
    pub child_agency: AgencyId,
    /// Parent unit id
    pub parent_id: DocumentId,
    /// Parent originating agency
    pub parent_agency: AgencyId,
    /// Hops from the root document to the parent (direct parents are at 1)
    pub depth: u32,
}

impl GraphRelation {
    /// Agency edge carried by this relation
    #[inline]
    #[must_use]
    pub fn agency_edge(&self) -> AgencyEdge {
        AgencyEdge::new(self.child_agency.clone(), self.parent_agency.clone())
    }
}

/// Directed edge between two originating agencies
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AgencyEdge {
    /// Agency of the child unit
    pub child: AgencyId,
    /// Agency of the parent unit
    pub parent: AgencyId,
}

impl AgencyEdge {
    /// Create edge
    #[inline]
    #[must_use]
    pub fn new(child: AgencyId, parent: AgencyId) -> Self {
        Self { child, parent }
    }
}

impl fmt::Display for AgencyEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.child, self.parent)
    }
}
