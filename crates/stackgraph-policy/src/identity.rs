//! Identities: principals that resources run as.

use crate::document::{CapabilityDocument, Decision};
use crate::statement::CapabilityStatement;
use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use stackgraph_core::{Error, IdentityName, Result};
use std::collections::BTreeSet;

/// Action granted to trusted principals by the derived trust document.
pub const ASSUME_ACTION: &str = "sts:AssumeRole";

#[derive(Debug, Clone, Serialize)]
pub struct Identity {
    name: IdentityName,
    path: String,
    trust: BTreeSet<String>,
    inline_documents: IndexMap<String, CapabilityDocument>,
    managed_capability_refs: IndexSet<String>,
    #[serde(skip)]
    finalized: bool,
}

impl Identity {
    pub fn new(name: impl Into<IdentityName>) -> Self {
        Self {
            name: name.into(),
            path: "/".into(),
            trust: BTreeSet::new(),
            inline_documents: IndexMap::new(),
            managed_capability_refs: IndexSet::new(),
            finalized: false,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn name(&self) -> &IdentityName {
        &self.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn trust(&self) -> &BTreeSet<String> {
        &self.trust
    }

    pub fn inline_documents(&self) -> &IndexMap<String, CapabilityDocument> {
        &self.inline_documents
    }

    pub fn inline_document(&self, name: &str) -> Option<&CapabilityDocument> {
        self.inline_documents.get(name)
    }

    pub fn managed_capability_refs(&self) -> &IndexSet<String> {
        &self.managed_capability_refs
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Attach a copy of `doc` under `name`. Later edits to the caller's
    /// document do not reach the identity.
    pub fn attach_inline_document(&mut self, name: impl Into<String>, doc: &CapabilityDocument) -> Result<()> {
        self.ensure_mutable("attach_inline_document")?;
        let name = name.into();
        if self.inline_documents.contains_key(&name) {
            return Err(Error::validation(format!(
                "identity {} already has an inline document named {}",
                self.name, name
            )));
        }
        self.inline_documents.insert(name, doc.clone());
        Ok(())
    }

    /// Returns whether the principal was newly added.
    pub fn add_trust_principal(&mut self, principal: impl Into<String>) -> Result<bool> {
        self.ensure_mutable("add_trust_principal")?;
        let principal = principal.into();
        if principal.trim().is_empty() {
            return Err(Error::validation("trust principal must not be blank"));
        }
        Ok(self.trust.insert(principal))
    }

    /// Reference a capability bundle managed outside this stack.
    pub fn attach_managed_capability(&mut self, reference: impl Into<String>) -> Result<bool> {
        self.ensure_mutable("attach_managed_capability")?;
        Ok(self.managed_capability_refs.insert(reference.into()))
    }

    pub fn finalize(&mut self) -> Result<()> {
        if self.finalized {
            return Err(Error::configuration(format!(
                "identity {} is already finalized",
                self.name
            )));
        }
        if self.trust.is_empty() {
            return Err(Error::configuration(format!(
                "identity {} has no trust principal",
                self.name
            )));
        }
        self.finalized = true;
        tracing::debug!(identity = %self.name, trust = self.trust.len(), "identity finalized");
        Ok(())
    }

    /// The assume-role document implied by `trust`.
    pub fn trust_document(&self) -> Result<CapabilityDocument> {
        if self.trust.is_empty() {
            return Err(Error::configuration(format!(
                "identity {} has no trust principal",
                self.name
            )));
        }
        let stmt = CapabilityStatement::allow([ASSUME_ACTION], [self.name.as_str()])?
            .with_principals(self.trust.iter().cloned());
        CapabilityDocument::from_statements([stmt])
    }

    /// Evaluate a request against every inline document. Managed bundles
    /// are opaque and not consulted.
    pub fn evaluate(&self, action: &str, resource: &str) -> Decision {
        self.inline_documents
            .values()
            .map(|doc| doc.evaluate(action, resource))
            .fold(Decision::NotApplicable, Decision::and)
    }

    fn ensure_mutable(&self, operation: &str) -> Result<()> {
        if self.finalized {
            return Err(Error::configuration(format!(
                "{} on finalized identity {}",
                operation, self.name
            )));
        }
        Ok(())
    }
}
