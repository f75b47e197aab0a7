use super::{ProgressEvent, ProgressStatus, is_executable};
use crate::graph::{Node, NodeId, Workflow};
use ahash::AHashMap;
use std::collections::VecDeque;
use std::sync::Arc;

/// Orders the nodes of one workflow level the way a run visits them.
///
/// Entry nodes (no incoming control edge) come first in list order, then each node once all of
/// its control predecessors have been visited. Data wires do not constrain the order. Nodes on a
/// cycle, which never become ready, are appended in list order.
pub fn execution_plan(workflow: &Workflow) -> Vec<&Node> {
    let mut in_degree: AHashMap<&str, usize> = workflow
        .nodes
        .iter()
        .map(|n| (n.id.as_str(), 0))
        .collect();
    let mut successors: AHashMap<&str, Vec<&str>> = AHashMap::new();
    for edge in workflow.edges.iter().filter(|e| !e.is_data_wire()) {
        if let Some(degree) = in_degree.get_mut(edge.target.as_str()) {
            *degree += 1;
        }
        successors
            .entry(edge.source.as_str())
            .or_default()
            .push(edge.target.as_str());
    }

    let mut ready: VecDeque<&str> = workflow
        .nodes
        .iter()
        .filter(|n| in_degree.get(n.id.as_str()) == Some(&0))
        .map(|n| n.id.as_str())
        .collect();
    let mut ordered: Vec<&str> = Vec::with_capacity(workflow.nodes.len());
    while let Some(id) = ready.pop_front() {
        ordered.push(id);
        for next in successors.get(id).into_iter().flatten() {
            if let Some(degree) = in_degree.get_mut(next) {
                *degree -= 1;
                if *degree == 0 {
                    ready.push_back(*next);
                }
            }
        }
    }

    let mut plan: Vec<&Node> = ordered.iter().filter_map(|id| workflow.node(id)).collect();
    for node in &workflow.nodes {
        if !ordered.contains(&node.id.as_str()) {
            plan.push(node);
        }
    }
    plan
}

/// Executable structure of one workflow level, detached from the graph.
#[derive(Debug, Clone)]
enum PlanItem {
    Action(NodeId),
    Loop {
        id: NodeId,
        iterations: u32,
        body: Arc<[PlanItem]>,
    },
}

fn plan_items(workflow: &Workflow) -> Arc<[PlanItem]> {
    execution_plan(workflow)
        .into_iter()
        .filter_map(|node| {
            if let Some(loop_data) = node.as_loop() {
                Some(PlanItem::Loop {
                    id: node.id.clone(),
                    iterations: loop_data.iterations,
                    body: plan_items(&loop_data.sub_flow),
                })
            } else if is_executable(node) {
                Some(PlanItem::Action(node.id.clone()))
            } else {
                None
            }
        })
        .collect()
}

fn count_actions(items: &[PlanItem]) -> usize {
    items.iter().fold(0usize, |total, item| {
        let actions = match item {
            PlanItem::Action(_) => 1,
            PlanItem::Loop {
                iterations, body, ..
            } => count_actions(body).saturating_mul(usize::try_from(*iterations).unwrap_or(usize::MAX)),
        };
        total.saturating_add(actions)
    })
}

/// Position inside one level of the plan: the root, or one loop's body.
#[derive(Debug, Clone)]
struct Frame {
    body: Arc<[PlanItem]>,
    index: usize,
    remaining: u32,
    loop_id: Option<NodeId>,
}

impl Frame {
    fn new(body: Arc<[PlanItem]>, iterations: u32, loop_id: Option<NodeId>) -> Self {
        // A loop that never runs its body goes straight to its finish.
        let index = if iterations == 0 { body.len() } else { 0 };
        Self {
            body,
            index,
            remaining: iterations.max(1),
            loop_id,
        }
    }
}

/// Replays a workflow as the progress events a device executor would emit.
///
/// Every action node reports `running` then `success`. Loop nodes report around their
/// iterations, and the sub-flow is replayed once per iteration. Events are produced on demand,
/// so memory stays proportional to the graph however many iterations a loop declares. With
/// [`Simulator::fail_on`] the named node reports `error` and the stream ends there.
#[derive(Debug, Clone)]
pub struct Simulator {
    flow_id: String,
    frames: Vec<Frame>,
    pending_finish: Option<NodeId>,
    fail_on: Option<NodeId>,
    action_count: usize,
    halted: bool,
}

impl Simulator {
    pub fn new(flow_id: &str, workflow: &Workflow) -> Self {
        let root = plan_items(workflow);
        let action_count = count_actions(&root);
        Self {
            flow_id: flow_id.to_string(),
            frames: vec![Frame::new(root, 1, None)],
            pending_finish: None,
            fail_on: None,
            action_count,
            halted: false,
        }
    }

    pub fn fail_on(mut self, node_id: &str) -> Self {
        self.fail_on = Some(node_id.to_string());
        self
    }

    /// Number of action executions the run performs, loop iterations included. Saturates.
    pub fn action_count(&self) -> usize {
        self.action_count
    }

    fn event(&self, action_id: NodeId, status: ProgressStatus, message: Option<String>) -> ProgressEvent {
        ProgressEvent {
            flow_id: self.flow_id.clone(),
            action_id,
            status,
            message,
        }
    }

    fn finish(&mut self, id: NodeId) -> ProgressEvent {
        if self.fail_on.as_ref() == Some(&id) {
            self.halted = true;
            self.event(id, ProgressStatus::Error, Some("Simulated failure".to_string()))
        } else {
            self.event(id, ProgressStatus::Success, None)
        }
    }
}

impl Iterator for Simulator {
    type Item = ProgressEvent;

    fn next(&mut self) -> Option<ProgressEvent> {
        if self.halted {
            return None;
        }
        if let Some(id) = self.pending_finish.take() {
            return Some(self.finish(id));
        }
        loop {
            let frame = self.frames.last_mut()?;
            let item = frame.body.get(frame.index).cloned();
            if let Some(item) = item {
                frame.index += 1;
                let event = match item {
                    PlanItem::Action(id) => {
                        self.pending_finish = Some(id.clone());
                        self.event(id, ProgressStatus::Running, None)
                    }
                    PlanItem::Loop {
                        id,
                        iterations,
                        body,
                    } => {
                        self.frames.push(Frame::new(body, iterations, Some(id.clone())));
                        self.event(id, ProgressStatus::Running, None)
                    }
                };
                return Some(event);
            }

            frame.remaining = frame.remaining.saturating_sub(1);
            if frame.remaining > 0 && !frame.body.is_empty() {
                frame.index = 0;
                continue;
            }
            return match self.frames.pop().and_then(|done| done.loop_id) {
                Some(loop_id) => Some(self.finish(loop_id)),
                None => None,
            };
        }
    }
}
