//! stackgraph-blueprints: concrete stacks declared on the graph model.
//!
//! - `studio`: a managed notebook domain with its execution identity and a
//!   default user profile.
//! - `endpoint`: a hosted foundation-model serving endpoint.

pub mod endpoint;
pub mod params;
pub mod studio;

pub use endpoint::endpoint_stack;
pub use params::{EndpointParams, NetworkParams, StackParams, StudioParams};
pub use studio::studio_stack;
