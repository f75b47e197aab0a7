use super::Workflow;

const NODE_PREFIX: &str = "node_";
const EDGE_PREFIX: &str = "edge_";

/// Monotonic id source for nodes and edges.
///
/// Ids are never handed out twice. When a workflow is loaded, [`observe`](Self::observe)
/// advances the counters past every id already present, including ids inside sub-flows.
#[derive(Debug, Clone, Default)]
pub struct NodeIdGenerator {
    next_node: u64,
    next_edge: u64,
}

impl NodeIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_node_id(&mut self) -> String {
        self.next_node += 1;
        format!("{}{}", NODE_PREFIX, self.next_node)
    }

    pub fn next_edge_id(&mut self) -> String {
        self.next_edge += 1;
        format!("{}{}", EDGE_PREFIX, self.next_edge)
    }

    pub fn observe(&mut self, workflow: &Workflow) {
        for node in &workflow.nodes {
            if let Some(n) = numeric_suffix(&node.id, NODE_PREFIX) {
                self.next_node = self.next_node.max(n);
            }
            if let Some(loop_data) = node.as_loop() {
                self.observe(&loop_data.sub_flow);
            }
        }
        for edge in &workflow.edges {
            if let Some(n) = numeric_suffix(&edge.id, EDGE_PREFIX) {
                self.next_edge = self.next_edge.max(n);
            }
        }
    }
}

fn numeric_suffix(id: &str, prefix: &str) -> Option<u64> {
    id.strip_prefix(prefix)?.parse().ok()
}
