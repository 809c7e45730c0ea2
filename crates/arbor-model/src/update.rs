//! Replace-style partial updates of derived fields

use crate::collection::Collection;
use crate::document::{ObjectGroupGraph, UnitGraph};
use crate::id::DocumentId;
use serde::{Deserialize, Serialize};

/// Complete derived-field set for one document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DerivedFields {
    /// Unit graph fields
    Unit(UnitGraph),
    /// Object group graph fields
    ObjectGroup(ObjectGroupGraph),
}

impl DerivedFields {
    /// Collection these fields belong to
    #[inline]
    #[must_use]
    pub fn collection(&self) -> Collection {
        match self {
            DerivedFields::Unit(_) => Collection::Unit,
            DerivedFields::ObjectGroup(_) => Collection::ObjectGroup,
        }
    }
}

/// Partial update keyed by document id
///
/// Applying the update replaces the whole derived block of an existing
/// document and never creates a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedUpdate {
    /// Target document
    pub id: DocumentId,
    /// Replacement fields
    pub fields: DerivedFields,
}

impl DerivedUpdate {
    /// Update for a unit
    #[inline]
    #[must_use]
    pub fn unit(id: DocumentId, graph: UnitGraph) -> Self {
        Self {
            id,
            fields: DerivedFields::Unit(graph),
        }
    }

    /// Update for an object group
    #[inline]
    #[must_use]
    pub fn object_group(id: DocumentId, graph: ObjectGroupGraph) -> Self {
        Self {
            id,
            fields: DerivedFields::ObjectGroup(graph),
        }
    }

    /// Collection targeted by the update
    #[inline]
    #[must_use]
    pub fn collection(&self) -> Collection {
        self.fields.collection()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::BTreeSet;

    #[test]
    fn update_reports_target_collection() {
        let update = DerivedUpdate::object_group(
            "og1".into(),
            ObjectGroupGraph {
                originating_agencies: BTreeSet::new(),
                last_computed_at: Utc::now(),
            },
        );
        assert_eq!(update.collection(), Collection::ObjectGroup);
    }
}
