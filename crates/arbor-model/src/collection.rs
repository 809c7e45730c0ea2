//! Managed metadata collections

use crate::error::ModelError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Document collection holding graph-computed documents
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    /// Archive units
    Unit,
    /// Object groups
    ObjectGroup,
}

impl Collection {
    /// All managed collections, units first
    ///
    /// Object groups aggregate unit results, so units must be processed first.
    pub const ALL: [Collection; 2] = [Collection::Unit, Collection::ObjectGroup];

    /// Stable lowercase name
    #[inline]
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Collection::Unit => "unit",
            Collection::ObjectGroup => "objectgroup",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Collection {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "unit" | "units" => Ok(Collection::Unit),
            "objectgroup" | "objectgroups" | "object_group" => Ok(Collection::ObjectGroup),
            _ => Err(ModelError::UnknownCollection(s.to_string())),
        }
    }
}
