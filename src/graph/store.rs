use super::{Edge, EdgeId, Node, NodeId, NodeIdGenerator, Viewport, Workflow};
use crate::error::WorkflowError;
use ahash::AHashSet;

/// The structural part of a workflow captured for undo/redo.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GraphSnapshot {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

/// Owns the open workflow and exposes atomic mutation primitives.
///
/// The store knows nothing about loops, recording or execution. Every mutating primitive bumps
/// `revision`, which callers use to tell whether a save is outstanding.
#[derive(Debug, Clone, Default)]
pub struct GraphStore {
    workflow: Workflow,
    ids: NodeIdGenerator,
    revision: u64,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes ownership of a loaded workflow after validating it.
    pub fn from_workflow(workflow: Workflow) -> Result<Self, WorkflowError> {
        workflow.validate()?;
        let mut ids = NodeIdGenerator::new();
        ids.observe(&workflow);
        Ok(Self {
            workflow,
            ids,
            revision: 0,
        })
    }

    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    pub fn nodes(&self) -> &[Node] {
        &self.workflow.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.workflow.edges
    }

    pub fn viewport(&self) -> Viewport {
        self.workflow.viewport
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.workflow.node(id)
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.workflow.contains_node(id)
    }

    pub fn last_node(&self) -> Option<&Node> {
        self.workflow.last_node()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn next_node_id(&mut self) -> NodeId {
        self.ids.next_node_id()
    }

    pub fn next_edge_id(&mut self) -> EdgeId {
        self.ids.next_edge_id()
    }

    pub fn ids_mut(&mut self) -> &mut NodeIdGenerator {
        &mut self.ids
    }

    /// Applies `f` to the workflow as one atomic step.
    pub fn apply<R>(&mut self, f: impl FnOnce(&mut Workflow) -> R) -> R {
        self.revision += 1;
        f(&mut self.workflow)
    }

    /// Mutates a single node in place. Returns `None` when the node does not exist.
    pub fn update_node<R>(&mut self, id: &str, f: impl FnOnce(&mut Node) -> R) -> Option<R> {
        let node = self.workflow.node_mut(id)?;
        let result = f(node);
        self.revision += 1;
        Some(result)
    }

    /// Appends a node. Rejects ids that already exist anywhere in the workflow.
    pub fn add_node(&mut self, node: Node) -> bool {
        if self.workflow.all_node_ids().contains(&node.id) {
            return false;
        }
        self.apply(|wf| wf.nodes.push(node));
        true
    }

    /// Appends an edge when both endpoints exist and no parallel edge is present.
    pub fn add_edge(&mut self, edge: Edge) -> bool {
        let wf = &self.workflow;
        if !wf.contains_node(&edge.source) || !wf.contains_node(&edge.target) {
            return false;
        }
        if wf.edges.iter().any(|e| e.id == edge.id || e.is_parallel_to(&edge)) {
            return false;
        }
        self.apply(|wf| wf.edges.push(edge));
        true
    }

    /// Removes the given nodes and every edge touching them. Returns the removed nodes.
    pub fn remove_nodes(&mut self, ids: &AHashSet<NodeId>) -> Vec<Node> {
        if !self.workflow.nodes.iter().any(|n| ids.contains(&n.id)) {
            return Vec::new();
        }
        self.apply(|wf| {
            let (removed, kept): (Vec<Node>, Vec<Node>) = std::mem::take(&mut wf.nodes)
                .into_iter()
                .partition(|n| ids.contains(&n.id));
            wf.nodes = kept;
            wf.edges
                .retain(|e| !ids.contains(&e.source) && !ids.contains(&e.target));
            removed
        })
    }

    /// Removes the edges with the given ids. Returns how many were removed.
    pub fn remove_edges(&mut self, ids: &AHashSet<EdgeId>) -> usize {
        let before = self.workflow.edges.len();
        if !self.workflow.edges.iter().any(|e| ids.contains(&e.id)) {
            return 0;
        }
        self.apply(|wf| {
            wf.edges.retain(|e| !ids.contains(&e.id));
            before - wf.edges.len()
        })
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.apply(|wf| wf.viewport = viewport);
    }

    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            nodes: self.workflow.nodes.clone(),
            edges: self.workflow.edges.clone(),
        }
    }

    /// Swaps the node/edge lists for `snapshot`, returning the previous contents.
    pub fn restore(&mut self, snapshot: GraphSnapshot) -> GraphSnapshot {
        self.apply(|wf| GraphSnapshot {
            nodes: std::mem::replace(&mut wf.nodes, snapshot.nodes),
            edges: std::mem::replace(&mut wf.edges, snapshot.edges),
        })
    }

    /// Removes every node and edge; the viewport is kept.
    pub fn clear(&mut self) {
        self.apply(|wf| {
            wf.nodes.clear();
            wf.edges.clear();
        });
    }
}
