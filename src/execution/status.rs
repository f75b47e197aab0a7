use crate::graph::NodeId;
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Visual/execution status of a node or an edge during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    #[default]
    Idle,
    Pending,
    Running,
    Success,
    Error,
}

/// Edges share the node status vocabulary.
pub type EdgeStatus = NodeStatus;

impl NodeStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, NodeStatus::Success | NodeStatus::Error)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NodeStatus::Idle => "idle",
            NodeStatus::Pending => "pending",
            NodeStatus::Running => "running",
            NodeStatus::Success => "success",
            NodeStatus::Error => "error",
        }
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct NodeExecution {
    pub status: NodeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl NodeExecution {
    pub fn with_status(status: NodeStatus) -> Self {
        Self {
            status,
            message: None,
        }
    }
}

pub type ExecutionStatusMap = AHashMap<NodeId, NodeExecution>;

/// Status of an edge, derived from the statuses of its endpoints.
pub fn edge_status(source: NodeStatus, target: NodeStatus) -> EdgeStatus {
    use NodeStatus::*;
    match (source, target) {
        (Success, Running) => Running,
        (Success, Success) => Success,
        (Success, Error) => Error,
        (Pending, _) | (_, Pending) => Pending,
        _ => Idle,
    }
}
