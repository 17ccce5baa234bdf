//! Core types for stackgraph

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Resolved attributes of a resource, keyed by attribute name.
pub type Attributes = BTreeMap<String, Value>;

macro_rules! shared_name {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
        #[serde(from = "String", into = "String")]
        pub struct $name(Arc<str>);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                Self(Arc::from(s.into()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self::new(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }

        impl From<$name> for String {
            fn from(name: $name) -> Self {
                name.0.to_string()
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

shared_name!(
    /// Resource node identifier - cheaply cloneable, unique within a stack
    ResourceId
);

shared_name!(
    /// Identity name - unique within a stack, immutable after creation
    IdentityName
);

/// A reference from a property to an attribute of another resource.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct AttributeRef {
    pub resource: ResourceId,
    pub attribute: String,
}

impl AttributeRef {
    pub fn new(resource: impl Into<ResourceId>, attribute: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            attribute: attribute.into(),
        }
    }
}

impl std::fmt::Display for AttributeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.resource, self.attribute)
    }
}

/// Value of a resource property: a literal, an attribute of another
/// resource, or an identity used as execution role.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyValue {
    Literal(Value),
    Ref(AttributeRef),
    Role(IdentityName),
}

impl PropertyValue {
    pub fn literal(value: impl Into<Value>) -> Self {
        Self::Literal(value.into())
    }

    pub fn reference(resource: impl Into<ResourceId>, attribute: impl Into<String>) -> Self {
        Self::Ref(AttributeRef::new(resource, attribute))
    }

    pub fn role(identity: impl Into<IdentityName>) -> Self {
        Self::Role(identity.into())
    }

    pub fn as_attribute_ref(&self) -> Option<&AttributeRef> {
        match self {
            Self::Ref(r) => Some(r),
            _ => None,
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Self::Literal(_))
    }
}

impl From<AttributeRef> for PropertyValue {
    fn from(r: AttributeRef) -> Self {
        Self::Ref(r)
    }
}

impl From<Value> for PropertyValue {
    fn from(v: Value) -> Self {
        Self::Literal(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        Self::Literal(Value::String(s.to_string()))
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        Self::Literal(Value::String(s))
    }
}

/// Value of a stack output: a literal or an attribute of a resource.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputValue {
    Literal(Value),
    Ref(AttributeRef),
}

impl OutputValue {
    pub fn literal(value: impl Into<Value>) -> Self {
        Self::Literal(value.into())
    }

    pub fn reference(resource: impl Into<ResourceId>, attribute: impl Into<String>) -> Self {
        Self::Ref(AttributeRef::new(resource, attribute))
    }
}

impl From<AttributeRef> for OutputValue {
    fn from(r: AttributeRef) -> Self {
        Self::Ref(r)
    }
}
