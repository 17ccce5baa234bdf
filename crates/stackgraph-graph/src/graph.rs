//! Stack graph: owns every node and identity, orders resolution, and
//! computes outputs.
//!
//! The graph only moves forward:
//!
//! ```text
//! Building ──validate──▶ Validated ──resolve_all──▶ Resolving ──▶ Resolved
//! ```
//!
//! Nodes, identities, and outputs are declared in `Building`. `validate`
//! freezes the structure and fixes a topological order; `resolve_all` walks
//! that order once. A provisioning failure halts the walk and leaves the
//! graph in `Resolving` with every node resolved so far still resolved.

use crate::effect::ProvisioningEffect;
use crate::node::{ResolutionScope, ResourceNode};
use crate::report::{NodeState, Outcome, ResolutionReport};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use stackgraph_core::{Error, IdentityName, OutputValue, ResourceId, Result};
use stackgraph_policy::{lint, Finding, Identity};
use std::collections::{HashSet, VecDeque};
use tracing::{info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StackState {
    Building,
    Validated,
    Resolving,
    Resolved,
}

impl std::fmt::Display for StackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Building => write!(f, "building"),
            Self::Validated => write!(f, "validated"),
            Self::Resolving => write!(f, "resolving"),
            Self::Resolved => write!(f, "resolved"),
        }
    }
}

/// A named stack output, optionally exported under a cross-stack name.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Output {
    pub value: OutputValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub export_name: Option<String>,
}

/// A lint finding located on one identity's inline document.
#[derive(Clone, Debug, Serialize)]
pub struct IdentityFinding {
    pub identity: IdentityName,
    pub document: String,
    #[serde(flatten)]
    pub finding: Finding,
}

impl std::fmt::Display for IdentityFinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{} {}", self.identity, self.document, self.finding)
    }
}

/// Partition and account a stack is declared into. When set, identities are
/// referenced by ARN rather than by path-qualified name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Environment {
    pub partition: String,
    pub account: String,
}

#[derive(Debug)]
pub struct StackGraph {
    name: String,
    state: StackState,
    environment: Option<Environment>,
    nodes: IndexMap<ResourceId, ResourceNode>,
    identities: IndexMap<IdentityName, Identity>,
    outputs: IndexMap<String, Output>,
    order: Vec<ResourceId>,
    report: ResolutionReport,
}

impl StackGraph {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            report: ResolutionReport::new(&name),
            name,
            state: StackState::Building,
            environment: None,
            nodes: IndexMap::new(),
            identities: IndexMap::new(),
            outputs: IndexMap::new(),
            order: Vec::new(),
        }
    }

    pub fn with_environment(mut self, partition: impl Into<String>, account: impl Into<String>) -> Self {
        self.environment = Some(Environment {
            partition: partition.into(),
            account: account.into(),
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn environment(&self) -> Option<&Environment> {
        self.environment.as_ref()
    }

    pub fn state(&self) -> StackState {
        self.state
    }

    // ------------------------------------------------------------------
    // Declaration
    // ------------------------------------------------------------------

    pub fn add_node(&mut self, node: ResourceNode) -> Result<()> {
        self.ensure_state("add_node", StackState::Building)?;
        if self.nodes.contains_key(node.id()) {
            return Err(Error::validation(format!(
                "duplicate resource id: {}",
                node.id()
            )));
        }
        self.nodes.insert(node.id().clone(), node);
        Ok(())
    }

    pub fn add_identity(&mut self, identity: Identity) -> Result<()> {
        self.ensure_state("add_identity", StackState::Building)?;
        if self.identities.contains_key(identity.name()) {
            return Err(Error::validation(format!(
                "duplicate identity name: {}",
                identity.name()
            )));
        }
        self.identities.insert(identity.name().clone(), identity);
        Ok(())
    }

    pub fn add_output(&mut self, name: impl Into<String>, value: impl Into<OutputValue>) -> Result<()> {
        self.insert_output(name.into(), value.into(), None)
    }

    pub fn add_exported_output(
        &mut self,
        name: impl Into<String>,
        value: impl Into<OutputValue>,
        export_name: impl Into<String>,
    ) -> Result<()> {
        self.insert_output(name.into(), value.into(), Some(export_name.into()))
    }

    fn insert_output(&mut self, name: String, value: OutputValue, export_name: Option<String>) -> Result<()> {
        self.ensure_state("add_output", StackState::Building)?;
        if self.outputs.contains_key(&name) {
            return Err(Error::validation(format!("duplicate output name: {}", name)));
        }
        if let Some(export) = &export_name {
            if self
                .outputs
                .values()
                .any(|o| o.export_name.as_deref() == Some(export.as_str()))
            {
                return Err(Error::validation(format!("duplicate export name: {}", export)));
            }
        }
        self.outputs.insert(name, Output { value, export_name });
        Ok(())
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    pub fn node(&self, id: &str) -> Option<&ResourceNode> {
        self.nodes.get(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &ResourceNode> {
        self.nodes.values()
    }

    pub fn identity(&self, name: &str) -> Option<&Identity> {
        self.identities.get(name)
    }

    pub fn identities(&self) -> impl Iterator<Item = &Identity> {
        self.identities.values()
    }

    pub fn outputs(&self) -> &IndexMap<String, Output> {
        &self.outputs
    }

    /// Topological order fixed by the last successful `validate`.
    pub fn order(&self) -> &[ResourceId] {
        &self.order
    }

    pub fn resolved_ids(&self) -> Vec<&ResourceId> {
        self.nodes
            .values()
            .filter(|n| n.is_resolved())
            .map(|n| n.id())
            .collect()
    }

    pub fn pending_ids(&self) -> Vec<&ResourceId> {
        self.nodes
            .values()
            .filter(|n| !n.is_resolved())
            .map(|n| n.id())
            .collect()
    }

    pub fn report(&self) -> &ResolutionReport {
        &self.report
    }

    /// Lint every inline document of every identity in the stack.
    pub fn lint(&self) -> Vec<IdentityFinding> {
        let mut findings = Vec::new();
        for identity in self.identities.values() {
            for (document, doc) in identity.inline_documents() {
                for finding in lint(doc) {
                    warn!(identity = %identity.name(), document = %document, "{}", finding);
                    findings.push(IdentityFinding {
                        identity: identity.name().clone(),
                        document: document.clone(),
                        finding,
                    });
                }
            }
        }
        findings
    }

    // ------------------------------------------------------------------
    // Validation
    // ------------------------------------------------------------------

    /// Check references and identities, then fix a topological order.
    /// Independent nodes keep their declaration order.
    pub fn validate(&mut self) -> Result<Vec<ResourceId>> {
        self.ensure_state("validate", StackState::Building)?;

        for node in self.nodes.values() {
            for dep in node.dependencies() {
                if !self.nodes.contains_key(&dep) {
                    return Err(Error::validation(format!(
                        "resource {} references unknown resource {}",
                        node.id(),
                        dep
                    )));
                }
            }
            for role in node.roles() {
                let identity = self.identities.get(&role).ok_or_else(|| {
                    Error::validation(format!(
                        "resource {} uses unknown identity {}",
                        node.id(),
                        role
                    ))
                })?;
                if !identity.is_finalized() {
                    return Err(Error::configuration(format!(
                        "identity {} must be finalized before {} can run as it",
                        role,
                        node.id()
                    )));
                }
            }
        }

        let order = self.topological_order()?;
        for id in &order {
            if let Some(node) = self.nodes.get(id) {
                self.report.add_node(id.as_str(), node.kind());
            }
        }
        self.order = order.clone();
        self.state = StackState::Validated;
        info!(stack = %self.name, nodes = order.len(), "stack validated");
        Ok(order)
    }

    /// Kahn's algorithm over dependency → dependent edges.
    fn topological_order(&self) -> Result<Vec<ResourceId>> {
        let n = self.nodes.len();
        let mut in_degree = vec![0usize; n];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut depends_on: Vec<Vec<usize>> = vec![Vec::new(); n];

        for (idx, node) in self.nodes.values().enumerate() {
            for dep in node.dependencies() {
                if let Some(dep_idx) = self.nodes.get_index_of(&dep) {
                    in_degree[idx] += 1;
                    dependents[dep_idx].push(idx);
                    depends_on[idx].push(dep_idx);
                }
            }
        }

        let mut queue: VecDeque<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
        let mut order = Vec::with_capacity(n);
        while let Some(idx) = queue.pop_front() {
            order.push(idx);
            for &dependent in &dependents[idx] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    queue.push_back(dependent);
                }
            }
        }

        if order.len() != n {
            let remaining: HashSet<usize> = (0..n).filter(|&i| in_degree[i] > 0).collect();
            // Leftovers are cycle members plus everything downstream of them;
            // only a node that can reach itself is on a cycle.
            let mut on_cycle: Vec<usize> = remaining
                .iter()
                .copied()
                .filter(|&i| reaches(&depends_on, &remaining, i, i))
                .collect();
            on_cycle.sort_unstable();
            let nodes: Vec<String> = on_cycle
                .into_iter()
                .filter_map(|i| self.nodes.get_index(i).map(|(id, _)| id.to_string()))
                .collect();
            warn!(stack = %self.name, cycle = ?nodes, "dependency cycle");
            return Err(Error::CyclicDependency { nodes });
        }

        Ok(order
            .into_iter()
            .filter_map(|i| self.nodes.get_index(i).map(|(id, _)| id.clone()))
            .collect())
    }

    // ------------------------------------------------------------------
    // Resolution
    // ------------------------------------------------------------------

    /// Provision every node in topological order, stopping at the first failure.
    pub async fn resolve_all(&mut self, effect: &dyn ProvisioningEffect) -> Result<()> {
        self.ensure_state("resolve_all", StackState::Validated)?;
        self.state = StackState::Resolving;
        self.report.start();
        info!(stack = %self.name, "resolving {} resources", self.order.len());

        let order = self.order.clone();
        for id in &order {
            let scope = self.scope_for(id)?;
            let node = self
                .nodes
                .get_mut(id)
                .ok_or_else(|| Error::unresolved(id.as_str(), "node"))?;
            let kind = node.kind().to_string();
            self.report.start_node(id.as_str());
            match node.resolve(&scope, effect).await.map(|attrs| attrs.len()) {
                Ok(attributes) => {
                    info!(resource = %id, kind = %kind, attributes, "resource resolved");
                    self.report.finish_node(id.as_str(), NodeState::Resolved, None);
                }
                Err(e) => {
                    warn!(resource = %id, "resolution halted: {}", e);
                    self.report
                        .finish_node(id.as_str(), NodeState::Failed, Some(e.to_string()));
                    self.report.finalize(Outcome::Failure);
                    return Err(e);
                }
            }
        }

        self.state = StackState::Resolved;
        self.report.finalize(Outcome::Success);
        info!(stack = %self.name, "stack resolved");
        Ok(())
    }

    /// Snapshot of the attributes and identities `id` may read.
    fn scope_for(&self, id: &ResourceId) -> Result<ResolutionScope> {
        let node = self
            .nodes
            .get(id)
            .ok_or_else(|| Error::unresolved(id.as_str(), "node"))?;
        let mut scope = ResolutionScope::new();
        for dep in node.dependencies() {
            if let Some(attrs) = self.nodes.get(&dep).and_then(|n| n.resolved_attributes()) {
                scope = scope.with_resource(dep, attrs.clone());
            }
        }
        for role in node.roles() {
            if let Some(identity) = self.identities.get(&role) {
                scope = scope.with_identity(role, identity_reference(identity, self.environment.as_ref()));
            }
        }
        Ok(scope)
    }

    // ------------------------------------------------------------------
    // Outputs
    // ------------------------------------------------------------------

    /// Evaluate every output against resolved attributes.
    ///
    /// Also permitted on a graph whose resolution halted, so callers can see
    /// exactly which outputs the resolved part of the stack can satisfy.
    pub fn compute_outputs(&self) -> Result<IndexMap<String, Value>> {
        if matches!(self.state, StackState::Building | StackState::Validated) {
            return Err(Error::invalid_state("compute_outputs", self.state));
        }
        self.outputs
            .iter()
            .map(|(name, output)| Ok((name.clone(), self.output_value(&output.value)?)))
            .collect()
    }

    /// Exported outputs keyed by export name.
    pub fn compute_exports(&self) -> Result<IndexMap<String, Value>> {
        let values = self.compute_outputs()?;
        Ok(self
            .outputs
            .iter()
            .filter_map(|(name, output)| {
                let export = output.export_name.as_ref()?;
                values.get(name).map(|v| (export.clone(), v.clone()))
            })
            .collect())
    }

    fn output_value(&self, value: &OutputValue) -> Result<Value> {
        match value {
            OutputValue::Literal(v) => Ok(v.clone()),
            OutputValue::Ref(r) => self
                .nodes
                .get(&r.resource)
                .and_then(|n| n.attribute(&r.attribute))
                .cloned()
                .ok_or_else(|| Error::unresolved(r.resource.as_str(), &r.attribute)),
        }
    }

    fn ensure_state(&self, operation: &str, expected: StackState) -> Result<()> {
        if self.state != expected {
            return Err(Error::invalid_state(operation, self.state));
        }
        Ok(())
    }
}

/// Whether `target` is reachable from `start` along at least one edge,
/// staying inside `within`.
fn reaches(edges: &[Vec<usize>], within: &HashSet<usize>, start: usize, target: usize) -> bool {
    let mut seen: HashSet<usize> = HashSet::new();
    let mut stack: Vec<usize> = edges[start].clone();
    while let Some(next) = stack.pop() {
        if next == target {
            return true;
        }
        if within.contains(&next) && seen.insert(next) {
            stack.extend(edges[next].iter().copied());
        }
    }
    false
}

/// Value a node sees for an identity it runs as: its ARN when the stack has
/// an environment, otherwise its path-qualified name.
fn identity_reference(identity: &Identity, environment: Option<&Environment>) -> Value {
    let qualified = format!("{}{}", identity.path(), identity.name());
    match environment {
        Some(env) => Value::String(format!(
            "arn:{}:iam::{}:role{}",
            env.partition, env.account, qualified
        )),
        None => Value::String(qualified),
    }
}
