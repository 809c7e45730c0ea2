//! Arbor inherited rule resolution
//!
//! Computes the management rules in force on a unit from its own
//! declarations and those of its ancestors, using the ancestor ids already
//! persisted by the graph engine. No hierarchy traversal against the store
//! happens here.
//!
//! Precedence, per category and rule id:
//! 1. a declaration on the unit itself
//! 2. otherwise the declaring ancestor closest to the unit
//! 3. equal-depth declarations by distinct ancestors are reported as
//!    conflicts, not decided
//!
//! `PreventInheritance` and `PreventRulesId` stop rules from flowing
//! through the unit that sets them.

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod error;
pub mod resolver;

pub use error::ResolveError;
pub use resolver::{resolve_rules, RuleResolver};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
