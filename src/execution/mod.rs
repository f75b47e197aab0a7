//! Run lifecycle and per-node/per-edge execution status.
//!
//! The machine never touches the workflow's node or edge lists. It keeps its own
//! [`ExecutionStatusMap`], built when a run starts and discarded when it is stopped or reset,
//! and derives edge statuses from it on demand.
mod log;
mod plan;
mod status;

pub use log::{LogLevel, RunLog, RunLogEntry};
pub use plan::{Simulator, execution_plan};
pub use status::{EdgeStatus, ExecutionStatusMap, NodeExecution, NodeStatus, edge_status};

use crate::graph::{Edge, EdgeId, Node, NodeId, Workflow};
use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    #[default]
    Idle,
    Running,
    Paused,
    Completed,
    Error,
}

/// Status reported by the device-side executor for one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    Running,
    Success,
    Error,
    Skipped,
}

impl ProgressStatus {
    /// `skipped` is shown as an error.
    pub fn node_status(self) -> NodeStatus {
        match self {
            ProgressStatus::Running => NodeStatus::Running,
            ProgressStatus::Success => NodeStatus::Success,
            ProgressStatus::Error | ProgressStatus::Skipped => NodeStatus::Error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub flow_id: String,
    pub action_id: NodeId,
    pub status: ProgressStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Messages delivered on the execution progress channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ProgressMessage {
    #[serde(rename = "workflow.action.progress")]
    ActionProgress(ProgressEvent),
}

/// What applying a progress event did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressOutcome {
    Applied { ordinal: u64, run_state: RunState },
    /// Held while the run is paused and applied on resume.
    Deferred,
    ForeignFlow,
    NotRunning,
    UnknownNode,
}

/// Per-node and per-edge statuses for rendering, across every nesting level.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionView {
    pub run_state: RunState,
    pub nodes: AHashMap<NodeId, NodeExecution>,
    pub edges: AHashMap<EdgeId, EdgeStatus>,
}

impl ExecutionView {
    pub fn node(&self, id: &str) -> NodeStatus {
        self.nodes.get(id).map_or(NodeStatus::Idle, |n| n.status)
    }

    pub fn edge(&self, id: &str) -> EdgeStatus {
        self.edges.get(id).copied().unwrap_or_default()
    }
}

/// Whether a node is something the device executes and reports progress for.
pub(crate) fn is_executable(node: &Node) -> bool {
    node.kind.is_action() || node.is_loop()
}

#[derive(Debug, Clone)]
pub struct ExecutionMachine {
    flow_id: String,
    state: RunState,
    statuses: ExecutionStatusMap,
    executable: AHashSet<NodeId>,
    log: RunLog,
    deferred: VecDeque<ProgressEvent>,
}

/// Progress events held during a pause. Beyond this the oldest are dropped.
const DEFERRED_PROGRESS_LIMIT: usize = 10_000;

impl ExecutionMachine {
    pub fn new(flow_id: impl Into<String>) -> Self {
        Self {
            flow_id: flow_id.into(),
            state: RunState::Idle,
            statuses: ExecutionStatusMap::default(),
            executable: AHashSet::new(),
            log: RunLog::default(),
            deferred: VecDeque::new(),
        }
    }

    pub fn flow_id(&self) -> &str {
        &self.flow_id
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn statuses(&self) -> &ExecutionStatusMap {
        &self.statuses
    }

    pub fn log(&self) -> &RunLog {
        &self.log
    }

    pub fn node_status(&self, id: &str) -> NodeStatus {
        self.statuses.get(id).map_or(NodeStatus::Idle, |n| n.status)
    }

    pub fn node_execution(&self, id: &str) -> Option<&NodeExecution> {
        self.statuses.get(id)
    }

    pub fn edge_status(&self, edge: &Edge) -> EdgeStatus {
        edge_status(self.node_status(&edge.source), self.node_status(&edge.target))
    }

    /// The node currently shown as running, if any.
    pub fn active_node(&self) -> Option<&str> {
        self.statuses
            .iter()
            .find(|(_, n)| n.status == NodeStatus::Running)
            .map(|(id, _)| id.as_str())
    }

    /// Starts a run over `workflow`. Only valid from `Idle` with at least one node.
    ///
    /// Executable nodes start `pending`, everything else `idle`.
    pub fn start(&mut self, workflow: &Workflow) -> bool {
        if self.state != RunState::Idle || workflow.nodes.is_empty() {
            debug!(state = ?self.state, nodes = workflow.nodes.len(), "Ignoring start");
            return false;
        }
        self.statuses.clear();
        self.executable.clear();
        self.deferred.clear();
        collect_statuses(workflow, &mut self.statuses, &mut self.executable);
        self.log.clear();
        self.log.push(
            LogLevel::Info,
            None,
            format!("Run started with {} executable nodes", self.executable.len()),
        );
        self.state = RunState::Running;
        info!(flow_id = %self.flow_id, executable = self.executable.len(), "Run started");
        true
    }

    pub fn pause(&mut self) -> bool {
        self.transition(&[RunState::Running], RunState::Paused, "Run paused")
    }

    /// Resumes a paused run and applies the progress that arrived during the pause, in order.
    pub fn resume(&mut self) -> bool {
        if !self.transition(&[RunState::Paused], RunState::Running, "Run resumed") {
            return false;
        }
        while self.state == RunState::Running {
            let Some(event) = self.deferred.pop_front() else {
                break;
            };
            self.apply_progress(&event);
        }
        self.deferred.clear();
        true
    }

    /// Number of progress events waiting for the run to resume.
    pub fn deferred_len(&self) -> usize {
        self.deferred.len()
    }

    /// Ends an active run and discards its statuses.
    pub fn stop(&mut self) -> bool {
        if !self.transition(&[RunState::Running, RunState::Paused], RunState::Idle, "Run stopped") {
            return false;
        }
        self.statuses.clear();
        self.executable.clear();
        self.deferred.clear();
        true
    }

    /// Returns a finished run to `Idle`. Not valid while a run is active.
    pub fn reset(&mut self) -> bool {
        if !self.transition(&[RunState::Completed, RunState::Error], RunState::Idle, "Run reset") {
            return false;
        }
        self.statuses.clear();
        self.executable.clear();
        true
    }

    pub fn complete(&mut self) -> bool {
        let completed = self.transition(
            &[RunState::Running, RunState::Paused],
            RunState::Completed,
            "Run completed",
        );
        if completed {
            self.deferred.clear();
        }
        completed
    }

    pub fn fail(&mut self, message: &str) -> bool {
        let failed = self.transition(&[RunState::Running, RunState::Paused], RunState::Error, message);
        if failed {
            self.deferred.clear();
            if let Some(entry) = self.log.entries().last() {
                warn!(flow_id = %self.flow_id, message = %entry.message, "Run failed");
            }
        }
        failed
    }

    fn transition(&mut self, from: &[RunState], to: RunState, message: &str) -> bool {
        if !from.contains(&self.state) {
            debug!(state = ?self.state, target = ?to, "Ignoring run transition");
            return false;
        }
        self.state = to;
        let level = match to {
            RunState::Completed => LogLevel::Success,
            RunState::Error => LogLevel::Error,
            _ => LogLevel::Info,
        };
        self.log.push(level, None, message);
        info!(flow_id = %self.flow_id, state = ?to, "Run state changed");
        true
    }

    /// Applies one progress event from the device executor.
    ///
    /// Events for another flow, outside an active run, or naming an unknown node are ignored.
    /// While paused, events are held and applied by [`resume`](Self::resume).
    pub fn apply_progress(&mut self, event: &ProgressEvent) -> ProgressOutcome {
        if event.flow_id != self.flow_id {
            debug!(flow_id = %event.flow_id, "Ignoring progress for another flow");
            return ProgressOutcome::ForeignFlow;
        }
        if self.state == RunState::Paused && self.statuses.contains_key(&event.action_id) {
            if self.deferred.len() == DEFERRED_PROGRESS_LIMIT {
                self.deferred.pop_front();
            }
            self.deferred.push_back(event.clone());
            return ProgressOutcome::Deferred;
        }
        if self.state != RunState::Running {
            debug!(state = ?self.state, node_id = %event.action_id, "Ignoring progress outside a run");
            return ProgressOutcome::NotRunning;
        }
        if !self.statuses.contains_key(&event.action_id) {
            debug!(node_id = %event.action_id, "Ignoring progress for unknown node");
            return ProgressOutcome::UnknownNode;
        }

        let status = event.status.node_status();
        if status == NodeStatus::Running {
            for (id, execution) in self.statuses.iter_mut() {
                if execution.status == NodeStatus::Running && *id != event.action_id {
                    execution.status = NodeStatus::Pending;
                }
            }
        }
        if let Some(execution) = self.statuses.get_mut(&event.action_id) {
            execution.status = status;
            execution.message = event.message.clone();
        }

        let level = match event.status {
            ProgressStatus::Running => LogLevel::Info,
            ProgressStatus::Success => LogLevel::Success,
            ProgressStatus::Skipped => LogLevel::Warning,
            ProgressStatus::Error => LogLevel::Error,
        };
        let message = match &event.message {
            Some(m) => format!("{:?}: {}", event.status, m),
            None => format!("{:?}", event.status),
        };
        let ordinal = self.log.push(level, Some(&event.action_id), message);

        if event.status == ProgressStatus::Error {
            let reason = event
                .message
                .clone()
                .unwrap_or_else(|| format!("Node {} failed", event.action_id));
            self.fail(&reason);
        } else if self.all_executable_terminal() {
            self.complete();
        }

        ProgressOutcome::Applied {
            ordinal,
            run_state: self.state,
        }
    }

    fn all_executable_terminal(&self) -> bool {
        !self.executable.is_empty()
            && self
                .executable
                .iter()
                .all(|id| self.node_status(id).is_terminal())
    }

    /// Derives the statuses to render for `workflow`. Nodes not in the status map show as idle.
    pub fn annotate(&self, workflow: &Workflow) -> ExecutionView {
        let mut view = ExecutionView {
            run_state: self.state,
            ..ExecutionView::default()
        };
        self.annotate_level(workflow, &mut view);
        view
    }

    fn annotate_level(&self, workflow: &Workflow, view: &mut ExecutionView) {
        for node in &workflow.nodes {
            let execution = self.statuses.get(&node.id).cloned().unwrap_or_default();
            view.nodes.insert(node.id.clone(), execution);
            if let Some(loop_data) = node.as_loop() {
                self.annotate_level(&loop_data.sub_flow, view);
            }
        }
        for edge in &workflow.edges {
            view.edges.insert(edge.id.clone(), self.edge_status(edge));
        }
    }
}

fn collect_statuses(workflow: &Workflow, statuses: &mut ExecutionStatusMap, executable: &mut AHashSet<NodeId>) {
    for node in &workflow.nodes {
        let status = if is_executable(node) {
            executable.insert(node.id.clone());
            NodeStatus::Pending
        } else {
            NodeStatus::Idle
        };
        statuses.insert(node.id.clone(), NodeExecution::with_status(status));
        if let Some(loop_data) = node.as_loop() {
            collect_statuses(&loop_data.sub_flow, statuses, executable);
        }
    }
}
