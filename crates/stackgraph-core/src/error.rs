//! Error types for stackgraph

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("cyclic dependency between resources: {}", nodes.join(", "))]
    CyclicDependency { nodes: Vec<String> },

    #[error("unresolved dependency: {resource}.{attribute}")]
    UnresolvedDependency { resource: String, attribute: String },

    #[error("provisioning failed for {resource}: {message}")]
    Provisioning { resource: String, message: String },

    #[error("{operation} is not permitted while the stack is {state}")]
    InvalidState { operation: String, state: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Discriminant of [`Error`], for callers that branch on the failure class.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Configuration,
    CyclicDependency,
    UnresolvedDependency,
    Provisioning,
    InvalidState,
    Io,
    Serialization,
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn unresolved(resource: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self::UnresolvedDependency {
            resource: resource.into(),
            attribute: attribute.into(),
        }
    }

    pub fn provisioning(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provisioning {
            resource: resource.into(),
            message: message.into(),
        }
    }

    pub fn invalid_state(operation: impl Into<String>, state: impl std::fmt::Display) -> Self {
        Self::InvalidState {
            operation: operation.into(),
            state: state.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::CyclicDependency { .. } => ErrorKind::CyclicDependency,
            Self::UnresolvedDependency { .. } => ErrorKind::UnresolvedDependency,
            Self::Provisioning { .. } => ErrorKind::Provisioning,
            Self::InvalidState { .. } => ErrorKind::InvalidState,
            Self::Io(_) => ErrorKind::Io,
            Self::Json(_) | Self::Yaml(_) | Self::Toml(_) => ErrorKind::Serialization,
        }
    }
}
