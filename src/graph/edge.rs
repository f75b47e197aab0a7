use super::node::NodeId;
use serde::{Deserialize, Serialize};

pub type EdgeId = String;

/// Source handle of a loop node that fires once all iterations have finished.
pub const COMPLETE_HANDLE: &str = "complete";
/// Source handle of a resource node publishing a variable binding.
pub const DATA_OUTPUT_HANDLE: &str = "data-output";
/// Target handle of a node consuming a variable binding.
pub const DATA_INPUT_HANDLE: &str = "data-input";

pub const DEFAULT_EDGE_TYPE: &str = "smoothstep";

fn default_edge_type() -> String {
    DEFAULT_EDGE_TYPE.to_string()
}

/// Optional per-edge settings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EdgeData {
    /// Delay in milliseconds before the target runs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay: Option<u64>,
}

/// A directed connection between two nodes of the same workflow level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
    #[serde(rename = "type", default = "default_edge_type")]
    pub edge_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<EdgeData>,
}

impl Edge {
    /// A control-flow edge. `source_handle` is `None` for the default single-fire handle.
    pub fn control(
        id: impl Into<EdgeId>,
        source: impl Into<NodeId>,
        target: impl Into<NodeId>,
        source_handle: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            source_handle,
            target_handle: None,
            edge_type: default_edge_type(),
            data: None,
        }
    }

    /// A data wire binding a resource node's output to a consumer's input.
    pub fn data_wire(
        id: impl Into<EdgeId>,
        source: impl Into<NodeId>,
        target: impl Into<NodeId>,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            source_handle: Some(DATA_OUTPUT_HANDLE.to_string()),
            target_handle: Some(DATA_INPUT_HANDLE.to_string()),
            edge_type: default_edge_type(),
            data: None,
        }
    }

    pub fn is_data_wire(&self) -> bool {
        self.source_handle.as_deref() == Some(DATA_OUTPUT_HANDLE)
            || self.target_handle.as_deref() == Some(DATA_INPUT_HANDLE)
    }

    pub fn is_complete(&self) -> bool {
        self.source_handle.as_deref() == Some(COMPLETE_HANDLE)
    }

    pub fn touches(&self, node_id: &str) -> bool {
        self.source == node_id || self.target == node_id
    }

    /// Two edges are parallel when they connect the same handles of the same nodes.
    pub fn is_parallel_to(&self, other: &Edge) -> bool {
        self.source == other.source
            && self.target == other.target
            && self.source_handle == other.source_handle
            && self.target_handle == other.target_handle
    }
}
