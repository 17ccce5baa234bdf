//! Resolution report: structured record of one `resolve_all` run.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use stackgraph_core::Result;
use std::path::Path;

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ResolutionReport {
    pub run_id: String,
    pub stack: String,
    pub started: Option<DateTime<Utc>>,
    pub ended: Option<DateTime<Utc>>,
    pub outcome: Outcome,
    pub total_wall_ms: u64,
    pub nodes: IndexMap<String, NodeStatus>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Pending,
    Success,
    Failure,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Success => write!(f, "success"),
            Self::Failure => write!(f, "failure"),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct NodeStatus {
    pub kind: String,
    pub status: NodeState,
    pub wall_ms: u64,
    pub started: Option<DateTime<Utc>>,
    pub ended: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum NodeState {
    Pending,
    Resolving,
    Resolved,
    Failed,
}

impl ResolutionReport {
    pub fn new(stack: &str) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            stack: stack.into(),
            started: None,
            ended: None,
            outcome: Outcome::Pending,
            total_wall_ms: 0,
            nodes: IndexMap::new(),
        }
    }

    pub fn add_node(&mut self, id: &str, kind: &str) {
        self.nodes.insert(
            id.into(),
            NodeStatus {
                kind: kind.into(),
                status: NodeState::Pending,
                wall_ms: 0,
                started: None,
                ended: None,
                error: None,
            },
        );
    }

    pub fn start(&mut self) {
        self.started = Some(Utc::now());
    }

    pub fn start_node(&mut self, id: &str) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.status = NodeState::Resolving;
            node.started = Some(Utc::now());
        }
    }

    pub fn finish_node(&mut self, id: &str, state: NodeState, error: Option<String>) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.status = state;
            node.error = error;
            node.ended = Some(Utc::now());
            if let (Some(start), Some(end)) = (node.started, node.ended) {
                node.wall_ms = (end - start).num_milliseconds().max(0) as u64;
            }
        }
    }

    pub fn finalize(&mut self, outcome: Outcome) {
        let ended = Utc::now();
        self.outcome = outcome;
        self.ended = Some(ended);
        if let Some(started) = self.started {
            self.total_wall_ms = (ended - started).num_milliseconds().max(0) as u64;
        }
    }

    pub fn count(&self, state: NodeState) -> usize {
        self.nodes.values().filter(|n| n.status == state).count()
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_yaml()?)?;
        Ok(())
    }

    pub fn summary_line(&self) -> String {
        format!(
            "| {} | {} | {} | {}/{} resolved | {}ms |",
            self.run_id,
            self.stack,
            self.outcome,
            self.count(NodeState::Resolved),
            self.nodes.len(),
            self.total_wall_ms,
        )
    }
}
