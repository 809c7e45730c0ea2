//! Error types for the archival model

/// Errors raised while building model values
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// Identifier is empty or whitespace
    #[error("invalid {kind} id: '{value}'")]
    InvalidId {
        /// Identifier kind (document, agency, rule)
        kind: &'static str,
        /// Rejected value
        value: String,
    },

    /// Collection name is not one of the managed collections
    #[error("unknown collection: '{0}'")]
    UnknownCollection(String),

    /// Rule category name is not supported
    #[error("unknown rule category: '{0}'")]
    UnknownRuleCategory(String),
}
