//! Arbor data model
//!
//! Shared types for the archival description hierarchy:
//! - **Units**: description nodes linked to their parents through `up`
//! - **ObjectGroups**: leaves bundling binary content, referenced by units
//! - **Derived graph fields**: the persisted ancestor closure of a document
//! - **Management rules**: retention/access/classification policies and
//!   their inherited form
//!
//! Derived fields are owned by the graph engine (`arbor-graph`) and are
//! never edited by hand. Everything in this crate is plain data.

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod collection;
pub mod document;
pub mod error;
pub mod graph;
pub mod id;
pub mod rules;
pub mod update;

pub use collection::Collection;
pub use document::{ObjectGroup, ObjectGroupGraph, Snapshot, Unit, UnitGraph};
pub use error::ModelError;
pub use graph::{AgencyEdge, AncestorProjection, GraphCandidate, GraphRelation};
pub use id::{AgencyId, DocumentId, RuleId};
pub use rules::{
    CategoryRules, FinalAction, Inheritance, InheritedPropertyModel, InheritedRuleModel,
    Management, PropertyName, PropertyValue, ResolvedRules, RuleCategory, RuleConflict,
    RuleDeclaration,
};
pub use update::{DerivedFields, DerivedUpdate};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with the archival model
    pub use crate::{
        AgencyId, AncestorProjection, Collection, DerivedFields, DerivedUpdate, DocumentId,
        GraphCandidate, GraphRelation, ObjectGroup, RuleCategory, RuleId, Unit, UnitGraph,
    };
}
