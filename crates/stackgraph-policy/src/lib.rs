//! stackgraph-policy: capability statements, documents, and identities.
//!
//! A statement grants (or denies) a set of actions over a set of resource
//! patterns. Documents are ordered bundles of statements; identities carry a
//! trust relationship plus named inline documents and references to managed
//! capability bundles defined elsewhere.

pub mod document;
pub mod identity;
pub mod lint;
pub mod statement;

pub use document::{CapabilityDocument, Decision};
pub use identity::{Identity, ASSUME_ACTION};
pub use lint::{lint, Finding, FindingKind};
pub use statement::{CapabilityStatement, Conditions, Effect};
