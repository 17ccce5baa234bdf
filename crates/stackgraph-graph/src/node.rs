//! Resource nodes: declared resources with literal and referential properties.

use crate::effect::ProvisioningEffect;
use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use serde_json::Value;
use stackgraph_core::{
    AttributeRef, Attributes, Error, IdentityName, PropertyValue, ResourceId, Result,
};
use std::collections::HashMap;

/// Supplies already-resolved values to a node being resolved.
pub trait Resolver: Send + Sync {
    fn attribute(&self, reference: &AttributeRef) -> Result<Value>;
    fn identity(&self, name: &IdentityName) -> Result<Value>;
}

/// Resolver over an owned snapshot of a node's resolved predecessors.
#[derive(Clone, Debug, Default)]
pub struct ResolutionScope {
    attributes: HashMap<ResourceId, Attributes>,
    identities: HashMap<IdentityName, Value>,
}

impl ResolutionScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resource(mut self, id: impl Into<ResourceId>, attributes: Attributes) -> Self {
        self.attributes.insert(id.into(), attributes);
        self
    }

    pub fn with_identity(mut self, name: impl Into<IdentityName>, value: impl Into<Value>) -> Self {
        self.identities.insert(name.into(), value.into());
        self
    }
}

impl Resolver for ResolutionScope {
    fn attribute(&self, reference: &AttributeRef) -> Result<Value> {
        self.attributes
            .get(&reference.resource)
            .and_then(|attrs| attrs.get(&reference.attribute))
            .cloned()
            .ok_or_else(|| Error::unresolved(reference.resource.as_str(), &reference.attribute))
    }

    fn identity(&self, name: &IdentityName) -> Result<Value> {
        self.identities
            .get(name)
            .cloned()
            .ok_or_else(|| Error::unresolved(name.as_str(), "identity"))
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ResourceNode {
    id: ResourceId,
    kind: String,
    properties: IndexMap<String, PropertyValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    resolved_attributes: Option<Attributes>,
}

impl ResourceNode {
    pub fn new(id: impl Into<ResourceId>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            properties: IndexMap::new(),
            resolved_attributes: None,
        }
    }

    /// Builder form of [`set_property`](Self::set_property) for fresh nodes.
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Set or replace a property. Properties are frozen once the node is resolved.
    pub fn set_property(&mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Result<()> {
        let name = name.into();
        if self.is_resolved() {
            return Err(Error::validation(format!(
                "cannot set {} on resolved resource {}",
                name, self.id
            )));
        }
        self.properties.insert(name, value.into());
        Ok(())
    }

    pub fn id(&self) -> &ResourceId {
        &self.id
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn properties(&self) -> &IndexMap<String, PropertyValue> {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }

    /// Resources this node references, in first-reference order.
    pub fn dependencies(&self) -> IndexSet<ResourceId> {
        self.properties
            .values()
            .filter_map(PropertyValue::as_attribute_ref)
            .map(|r| r.resource.clone())
            .collect()
    }

    /// Identities this node uses as execution roles.
    pub fn roles(&self) -> IndexSet<IdentityName> {
        self.properties
            .values()
            .filter_map(|v| match v {
                PropertyValue::Role(name) => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved_attributes.is_some()
    }

    pub fn resolved_attributes(&self) -> Option<&Attributes> {
        self.resolved_attributes.as_ref()
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.resolved_attributes.as_ref()?.get(name)
    }

    /// Substitute every reference through `resolver`, then provision the
    /// node exactly once. On success the resolved properties, overlaid with
    /// whatever the effect produced, become this node's attributes.
    pub async fn resolve(
        &mut self,
        resolver: &dyn Resolver,
        effect: &dyn ProvisioningEffect,
    ) -> Result<&Attributes> {
        if self.is_resolved() {
            return Err(Error::validation(format!(
                "resource {} is already resolved",
                self.id
            )));
        }

        let mut inputs = Attributes::new();
        for (name, value) in &self.properties {
            let resolved = match value {
                PropertyValue::Literal(v) => v.clone(),
                PropertyValue::Ref(r) => {
                    tracing::debug!(resource = %self.id, property = %name, reference = %r, "resolving reference");
                    resolver.attribute(r)?
                }
                PropertyValue::Role(identity) => resolver.identity(identity)?,
            };
            inputs.insert(name.clone(), resolved);
        }

        let produced = effect
            .provision(&self.id, &self.kind, &inputs)
            .await
            .map_err(|e| Error::provisioning(self.id.as_str(), e.to_string()))?;

        let mut attributes = inputs;
        attributes.extend(produced);
        Ok(&*self.resolved_attributes.insert(attributes))
    }
}
