//! stackgraph: declare cloud stacks as typed resource graphs, check their
//! grants, and resolve them in dependency order.

pub mod config;

pub use config::StackConfig;

use stackgraph_blueprints::{endpoint_stack, studio_stack};
use stackgraph_core::Result;
use stackgraph_graph::{SeededNames, SimulatedEffect, StackGraph};

/// The stacks the CLI knows how to declare.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum Blueprint {
    /// Studio domain, user profile, and execution identity
    Studio,
    /// Hosted model endpoint
    Endpoint,
}

impl Blueprint {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Studio => "studio",
            Self::Endpoint => "endpoint",
        }
    }

    /// Declare the stack. Each blueprint draws its names from a fresh
    /// generator seeded from config, so repeated builds agree.
    pub fn build(&self, config: &StackConfig) -> Result<StackGraph> {
        let mut names = SeededNames::new(config.stack.seed);
        match self {
            Self::Studio => studio_stack(&config.stack, &config.network, &config.studio, &mut names),
            Self::Endpoint => endpoint_stack(&config.stack, &config.endpoint, &mut names),
        }
    }
}

/// Offline effect matching the configured region and account.
pub fn simulated_effect(config: &StackConfig) -> SimulatedEffect {
    SimulatedEffect::new(
        config.stack.region.as_str(),
        config.stack.account.as_str(),
        SeededNames::new(config.stack.seed),
    )
}
