//! The canonical in-memory workflow graph and its storage primitives.
pub mod edge;
pub mod ids;
pub mod node;
pub mod store;
pub mod wire;

pub use edge::*;
pub use ids::*;
pub use node::*;
pub use store::*;

use crate::error::WorkflowError;
use ahash::AHashSet;
use serde::{Deserialize, Serialize};

/// Canvas viewport persisted alongside the graph.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub x: f64,
    pub y: f64,
    pub zoom: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            zoom: 1.0,
        }
    }
}

/// A graph of nodes and edges. Loop nodes carry nested workflows with their own edges.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Workflow {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    #[serde(default)]
    pub viewport: Viewport,
}

/// A variable binding carried by a data wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataBinding {
    pub source: NodeId,
    pub consumer: NodeId,
    /// The resource node's output variable, when it declares one.
    pub variable: Option<String>,
}

impl Workflow {
    pub fn from_json_str(json: &str) -> Result<Self, WorkflowError> {
        let workflow: Workflow = serde_json::from_str(json)
            .map_err(|e| WorkflowError::JsonParseError(e.to_string()))?;
        workflow.validate()?;
        Ok(workflow)
    }

    pub fn to_json_string(&self) -> Result<String, WorkflowError> {
        serde_json::to_string_pretty(self).map_err(|e| WorkflowError::JsonParseError(e.to_string()))
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.nodes.iter().any(|n| n.id == id)
    }

    pub fn last_node(&self) -> Option<&Node> {
        self.nodes.last()
    }

    pub fn incoming<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Edge> {
        self.edges.iter().filter(move |e| e.target == id)
    }

    pub fn outgoing<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Edge> {
        self.edges.iter().filter(move |e| e.source == id)
    }

    pub fn loop_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|n| n.is_loop())
    }

    /// Every node id in this workflow and, recursively, in every nested sub-flow.
    pub fn all_node_ids(&self) -> Vec<NodeId> {
        let mut ids = Vec::new();
        self.collect_node_ids(&mut ids);
        ids
    }

    fn collect_node_ids(&self, ids: &mut Vec<NodeId>) {
        for node in &self.nodes {
            ids.push(node.id.clone());
            if let Some(loop_data) = node.as_loop() {
                loop_data.sub_flow.collect_node_ids(ids);
            }
        }
    }

    /// Bindings established by the data wires at this level.
    pub fn data_bindings(&self) -> Vec<DataBinding> {
        self.edges
            .iter()
            .filter(|e| e.is_data_wire())
            .map(|e| DataBinding {
                source: e.source.clone(),
                consumer: e.target.clone(),
                variable: self
                    .node(&e.source)
                    .and_then(Node::as_resource)
                    .and_then(|r| r.output_variable.clone()),
            })
            .collect()
    }

    /// Checks the structural invariants: node ids are unique across the workflow and all of its
    /// sub-flows, every edge resolves at its own level, payloads match their kinds and each
    /// sub-flow holds exactly one `loopStart` and one `loopEnd`.
    pub fn validate(&self) -> Result<(), WorkflowError> {
        let mut seen = AHashSet::new();
        self.validate_level(&mut seen)
    }

    fn validate_level(&self, seen: &mut AHashSet<NodeId>) -> Result<(), WorkflowError> {
        let mut local: AHashSet<&str> = AHashSet::with_capacity(self.nodes.len());
        for node in &self.nodes {
            if !seen.insert(node.id.clone()) {
                return Err(WorkflowError::DuplicateNodeId(node.id.clone()));
            }
            if !node.payload_fits_kind() {
                return Err(WorkflowError::InvalidNodeData {
                    node_id: node.id.clone(),
                    message: format!("payload does not belong to a '{}' node", node.kind),
                });
            }
            local.insert(node.id.as_str());
        }

        for edge in &self.edges {
            for endpoint in [&edge.source, &edge.target] {
                if !local.contains(endpoint.as_str()) {
                    return Err(WorkflowError::DanglingEdge {
                        edge_id: edge.id.clone(),
                        missing_node_id: endpoint.clone(),
                    });
                }
            }
        }

        for node in &self.nodes {
            if let Some(loop_data) = node.as_loop() {
                let sub_flow = &loop_data.sub_flow;
                for (kind, name) in [(NodeKind::LoopStart, "loopStart"), (NodeKind::LoopEnd, "loopEnd")] {
                    let count = sub_flow.nodes.iter().filter(|n| n.kind == kind).count();
                    if count != 1 {
                        return Err(WorkflowError::InvalidSubFlow {
                            loop_id: node.id.clone(),
                            message: format!("expected exactly one {}, found {}", name, count),
                        });
                    }
                }
                sub_flow.validate_level(seen)?;
            }
        }
        Ok(())
    }
}
