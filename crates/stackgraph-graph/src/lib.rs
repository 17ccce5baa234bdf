//! stackgraph-graph: resource nodes, dependency resolution, and outputs.
//!
//! Declaration and provisioning are separate steps: nodes are declared into a
//! [`StackGraph`], the graph is validated (references exist, identities are
//! finalized, no cycles), and only then is the provisioning effect driven
//! node by node in dependency order.

pub mod effect;
pub mod graph;
pub mod naming;
pub mod node;
pub mod report;

pub use effect::{
    FnEffect, JournalingEffect, ProvisionEvent, ProvisioningEffect, ProvisioningFailure,
    SimulatedEffect,
};
pub use graph::{Environment, IdentityFinding, Output, StackGraph, StackState};
pub use naming::{NameGenerator, SeededNames};
pub use node::{ResolutionScope, Resolver, ResourceNode};
pub use report::{NodeState, NodeStatus, Outcome, ResolutionReport};
