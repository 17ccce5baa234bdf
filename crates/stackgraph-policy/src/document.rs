//! Capability documents: ordered bundles of statements.
//!
//! Evaluation is a union over statements with explicit DENY winning, so
//! statement order carries no meaning beyond deterministic serialization.

use crate::statement::{CapabilityStatement, Effect};
use serde::Serialize;
use stackgraph_core::{Error, Result};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
    /// No statement speaks to the request (an implicit deny).
    NotApplicable,
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Decision::Allow => f.write_str("ALLOW"),
            Decision::Deny => f.write_str("DENY"),
            Decision::NotApplicable => f.write_str("NOT_APPLICABLE"),
        }
    }
}

impl Decision {
    /// Combine two decisions: DENY beats ALLOW beats NOT_APPLICABLE.
    pub fn and(self, other: Decision) -> Decision {
        match (self, other) {
            (Decision::Deny, _) | (_, Decision::Deny) => Decision::Deny,
            (Decision::Allow, _) | (_, Decision::Allow) => Decision::Allow,
            _ => Decision::NotApplicable,
        }
    }

    pub fn is_allowed(&self) -> bool {
        *self == Decision::Allow
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CapabilityDocument {
    #[serde(rename = "Statement")]
    statements: Vec<CapabilityStatement>,
}

impl CapabilityDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_statements(
        statements: impl IntoIterator<Item = CapabilityStatement>,
    ) -> Result<Self> {
        let mut doc = Self::new();
        for stmt in statements {
            doc.add_statement(stmt)?;
        }
        Ok(doc)
    }

    /// Append a statement. Fails if its sid is already taken in this document.
    pub fn add_statement(&mut self, stmt: CapabilityStatement) -> Result<()> {
        if let Some(sid) = stmt.sid() {
            if self.statements.iter().any(|s| s.sid() == Some(sid)) {
                return Err(Error::validation(format!(
                    "duplicate statement sid: {}",
                    sid
                )));
            }
        }
        self.statements.push(stmt);
        Ok(())
    }

    /// Concatenate `self` and `other` into a new document, order preserved.
    pub fn merge(&self, other: &CapabilityDocument) -> Result<CapabilityDocument> {
        let mut merged = self.clone();
        for stmt in &other.statements {
            merged.add_statement(stmt.clone())?;
        }
        Ok(merged)
    }

    pub fn statements(&self) -> &[CapabilityStatement] {
        &self.statements
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn sids(&self) -> BTreeSet<&str> {
        self.statements.iter().filter_map(|s| s.sid()).collect()
    }

    pub fn evaluate(&self, action: &str, resource: &str) -> Decision {
        self.statements
            .iter()
            .filter(|s| s.applies_to(action, resource))
            .fold(Decision::NotApplicable, |acc, s| match s.effect() {
                Effect::Allow => acc.and(Decision::Allow),
                Effect::Deny => Decision::Deny,
            })
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}
