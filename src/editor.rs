//! One open flow: the graph, its history, the recorder, the run state and persistence.
//!
//! Every user-facing operation goes through [`Editor`], which decides when to snapshot for undo
//! and when to save. Destructive edits save immediately whatever the [`SavePolicy`]; other
//! structural changes follow it.
use crate::config::{EditorConfig, SavePolicy};
use crate::error::{GatewayError, WorkflowError};
use crate::execution::{
    ExecutionMachine, ExecutionView, ProgressMessage, ProgressOutcome, RunState,
};
use crate::gateway::{
    ChannelHub, PersistenceGateway, RunTrigger, SaveReceipt, SessionControl, SessionHandle,
    Subscription, TestRunReceipt,
};
use crate::graph::{EdgeId, GraphSnapshot, GraphStore, Node, NodeId, NodeKind, Position, Workflow};
use crate::history::History;
use crate::mutation;
use crate::recording::{DeviceMessage, IngestOutcome, RecordedAction, Recorder};
use ahash::AHashSet;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Whether the in-memory workflow has reached the persistence gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum SaveState {
    Saved { at: DateTime<Utc> },
    Dirty,
    /// The last save failed. The in-memory workflow is kept as is.
    Failed { reason: String },
}

/// Messages drained from the attached device in one [`Editor::pump`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PumpReport {
    pub device: Vec<IngestOutcome>,
    pub progress: Vec<ProgressOutcome>,
}

impl PumpReport {
    pub fn is_empty(&self) -> bool {
        self.device.is_empty() && self.progress.is_empty()
    }
}

struct DeviceLink {
    hub: ChannelHub,
    subscription: Subscription,
}

pub struct Editor {
    flow_id: String,
    config: EditorConfig,
    store: GraphStore,
    history: History,
    recorder: Recorder,
    execution: ExecutionMachine,
    persistence: Box<dyn PersistenceGateway>,
    save_state: SaveState,
    saved_revision: u64,
    device: Option<DeviceLink>,
}

impl Editor {
    /// An editor over an empty workflow.
    pub fn new(flow_id: &str, config: EditorConfig, persistence: Box<dyn PersistenceGateway>) -> Self {
        Self::assemble(flow_id, config, persistence, GraphStore::new())
    }

    /// Loads `flow_id` from `persistence`, or starts empty when it was never saved.
    pub fn open(
        flow_id: &str,
        config: EditorConfig,
        persistence: Box<dyn PersistenceGateway>,
    ) -> Result<Self, GatewayError> {
        let store = match persistence.load(flow_id)? {
            Some(workflow) => GraphStore::from_workflow(workflow)?,
            None => GraphStore::new(),
        };
        info!(flow_id, nodes = store.nodes().len(), "Flow opened");
        Ok(Self::assemble(flow_id, config, persistence, store))
    }

    pub fn with_workflow(
        flow_id: &str,
        config: EditorConfig,
        persistence: Box<dyn PersistenceGateway>,
        workflow: Workflow,
    ) -> Result<Self, WorkflowError> {
        let store = GraphStore::from_workflow(workflow)?;
        Ok(Self::assemble(flow_id, config, persistence, store))
    }

    fn assemble(
        flow_id: &str,
        config: EditorConfig,
        persistence: Box<dyn PersistenceGateway>,
        store: GraphStore,
    ) -> Self {
        Self {
            flow_id: flow_id.to_string(),
            history: History::new(config.history_limit),
            recorder: Recorder::new(&config),
            execution: ExecutionMachine::new(flow_id),
            saved_revision: store.revision(),
            store,
            config,
            persistence,
            save_state: SaveState::Saved { at: Utc::now() },
            device: None,
        }
    }

    pub fn flow_id(&self) -> &str {
        &self.flow_id
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    pub fn workflow(&self) -> &Workflow {
        self.store.workflow()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    pub fn execution(&self) -> &ExecutionMachine {
        &self.execution
    }

    pub fn save_state(&self) -> &SaveState {
        &self.save_state
    }

    /// Whether the graph changed since the last successful save.
    pub fn is_dirty(&self) -> bool {
        self.store.revision() != self.saved_revision
    }

    // Manual editing

    /// Adds an unconnected node with an empty payload.
    pub fn add_node(&mut self, kind: NodeKind, position: Position) -> Option<NodeId> {
        let id = self.store.next_node_id();
        self.insert_node(Node::new(id, kind, position), None)
    }

    /// Adds `node`, connected from `after` when given.
    pub fn insert_node(&mut self, node: Node, after: Option<&str>) -> Option<NodeId> {
        let snapshot = self.store.snapshot();
        let id = mutation::insert_node(&mut self.store, node, after)?;
        self.commit(snapshot, false);
        Some(id)
    }

    pub fn connect(
        &mut self,
        source: &str,
        target: &str,
        source_handle: Option<String>,
        target_handle: Option<String>,
    ) -> Option<EdgeId> {
        let snapshot = self.store.snapshot();
        let id = mutation::connect(&mut self.store, source, target, source_handle, target_handle)?;
        self.commit(snapshot, false);
        Some(id)
    }

    pub fn set_node_label(&mut self, node_id: &str, label: &str) -> bool {
        let snapshot = self.store.snapshot();
        if self
            .store
            .update_node(node_id, |node| node.data.set_label(label))
            .is_none()
        {
            return false;
        }
        self.commit(snapshot, false);
        true
    }

    /// Moves a node on the canvas. Not an undoable step.
    pub fn move_node(&mut self, node_id: &str, position: Position) -> bool {
        if self
            .store
            .update_node(node_id, |node| node.position = position)
            .is_none()
        {
            return false;
        }
        self.after_change(false);
        true
    }

    /// Deletes nodes and their edges. Unknown ids still drop recorder references to them.
    pub fn delete_nodes(&mut self, ids: &[NodeId]) -> Vec<Node> {
        let ids: AHashSet<NodeId> = ids.iter().cloned().collect();
        self.recorder.forget_nodes(&ids);
        if !ids.iter().any(|id| self.store.contains_node(id)) {
            return Vec::new();
        }
        self.history.take_snapshot(&self.store);
        let removed = mutation::delete_nodes(&mut self.store, &ids);
        self.after_change(true);
        removed
    }

    pub fn delete_edges(&mut self, ids: &[EdgeId]) -> usize {
        let ids: AHashSet<EdgeId> = ids.iter().cloned().collect();
        if !self.store.edges().iter().any(|e| ids.contains(&e.id)) {
            return 0;
        }
        self.history.take_snapshot(&self.store);
        let removed = mutation::delete_edges(&mut self.store, &ids);
        self.after_change(true);
        removed
    }

    /// Replaces the given nodes with a loop running them. `None` when none of them exist.
    pub fn wrap_in_loop(&mut self, ids: &[NodeId]) -> Option<NodeId> {
        if !ids.iter().any(|id| self.store.contains_node(id)) {
            debug!("Ignoring wrap-in-loop without existing nodes");
            return None;
        }
        self.history.take_snapshot(&self.store);
        let loop_id = mutation::wrap_in_loop(&mut self.store, ids, &self.config)?;
        let wrapped: AHashSet<NodeId> = ids.iter().cloned().collect();
        self.recorder.forget_nodes(&wrapped);
        self.after_change(true);
        Some(loop_id)
    }

    /// Removes every node and edge. Undoable.
    pub fn clear(&mut self) {
        if self.store.nodes().is_empty() && self.store.edges().is_empty() {
            return;
        }
        self.history.take_snapshot(&self.store);
        let all: AHashSet<NodeId> = self.store.nodes().iter().map(|n| n.id.clone()).collect();
        self.store.clear();
        self.recorder.forget_nodes(&all);
        self.after_change(true);
    }

    pub fn undo(&mut self) -> bool {
        if !self.history.undo(&mut self.store) {
            return false;
        }
        self.recorder.reset_tracking();
        self.after_change(true);
        true
    }

    pub fn redo(&mut self) -> bool {
        if !self.history.redo(&mut self.store) {
            return false;
        }
        self.recorder.reset_tracking();
        self.after_change(true);
        true
    }

    fn commit(&mut self, snapshot: GraphSnapshot, destructive: bool) {
        self.history.push(snapshot);
        self.after_change(destructive);
    }

    // Recording

    /// Subscribes to `device_id` for this flow, replacing any previous device.
    pub fn attach_device(&mut self, hub: &ChannelHub, device_id: &str) {
        self.detach_device();
        let subscription = hub.register_listener(device_id, &self.flow_id);
        self.device = Some(DeviceLink {
            hub: hub.clone(),
            subscription,
        });
        info!(flow_id = %self.flow_id, device_id, "Device attached");
    }

    /// Unsubscribes from the attached device and ends any recording session. Idempotent.
    pub fn detach_device(&mut self) -> bool {
        let Some(link) = self.device.take() else {
            return false;
        };
        link.hub
            .unregister_listener(link.subscription.device_id(), &self.flow_id);
        self.recorder.end_session();
        info!(flow_id = %self.flow_id, device_id = %link.subscription.device_id(), "Device detached");
        true
    }

    pub fn attached_device(&self) -> Option<&str> {
        self.device.as_ref().map(|link| link.subscription.device_id())
    }

    pub fn start_recording(
        &mut self,
        control: &mut dyn SessionControl,
        device_id: &str,
    ) -> Result<SessionHandle, GatewayError> {
        let handle = control.start_recording(device_id, &self.flow_id)?;
        self.recorder.begin_session(&handle.session_id, None);
        Ok(handle)
    }

    /// Ends the local session and asks the device to stop. `Ok(false)` when not recording.
    pub fn stop_recording(&mut self, control: &mut dyn SessionControl) -> Result<bool, GatewayError> {
        let Some(session) = self.recorder.end_session() else {
            return Ok(false);
        };
        control.stop_recording(&session.session_id)?;
        Ok(true)
    }

    pub fn handle_device_message(&mut self, message: &DeviceMessage) -> IngestOutcome {
        let outcome = self
            .recorder
            .handle_message(&mut self.store, message, &self.config);
        if outcome.is_structural() {
            self.after_change(false);
        }
        outcome
    }

    /// Removes the newest recorded node. Saved immediately.
    pub fn undo_last_recorded_action(&mut self) -> Option<RecordedAction> {
        let action = self.recorder.undo_last_recorded_action(&mut self.store)?;
        self.after_change(true);
        Some(action)
    }

    /// Processes everything queued on the attached device's channels, device messages first.
    pub fn pump(&mut self) -> PumpReport {
        let mut device_messages = Vec::new();
        let mut progress_messages = Vec::new();
        if let Some(link) = self.device.as_mut() {
            while let Some(message) = link.subscription.try_next_device() {
                device_messages.push(message);
            }
            while let Some(message) = link.subscription.try_next_progress() {
                progress_messages.push(message);
            }
        }
        PumpReport {
            device: device_messages
                .iter()
                .map(|m| self.handle_device_message(m))
                .collect(),
            progress: progress_messages
                .iter()
                .map(|m| self.handle_progress(m))
                .collect(),
        }
    }

    // Execution

    pub fn start_run(&mut self) -> bool {
        self.execution.start(self.store.workflow())
    }

    pub fn pause_run(&mut self) -> bool {
        self.execution.pause()
    }

    pub fn resume_run(&mut self) -> bool {
        self.execution.resume()
    }

    pub fn stop_run(&mut self) -> bool {
        self.execution.stop()
    }

    pub fn reset_run(&mut self) -> bool {
        self.execution.reset()
    }

    pub fn run_state(&self) -> RunState {
        self.execution.state()
    }

    pub fn handle_progress(&mut self, message: &ProgressMessage) -> ProgressOutcome {
        let ProgressMessage::ActionProgress(event) = message;
        self.execution.apply_progress(event)
    }

    /// Saves, starts a local run to mirror progress, and asks the device to replay the flow.
    pub fn trigger_device_run(
        &mut self,
        trigger: &mut dyn RunTrigger,
        device_id: &str,
    ) -> Result<TestRunReceipt, GatewayError> {
        self.save()?;
        if matches!(self.execution.state(), RunState::Completed | RunState::Error) {
            self.execution.reset();
        }
        if self.execution.state() == RunState::Idle {
            self.start_run();
        }
        trigger.test_run(&self.flow_id, device_id)
    }

    pub fn execution_view(&self) -> ExecutionView {
        self.execution.annotate(self.store.workflow())
    }

    // Persistence

    /// Writes the workflow now. A failure is kept in [`SaveState::Failed`]; nothing is rolled back.
    pub fn save(&mut self) -> Result<SaveReceipt, GatewayError> {
        match self.persistence.save(&self.flow_id, self.store.workflow()) {
            Ok(receipt) => {
                self.saved_revision = self.store.revision();
                self.save_state = SaveState::Saved {
                    at: receipt.saved_at,
                };
                debug!(flow_id = %self.flow_id, "Flow saved");
                Ok(receipt)
            }
            Err(e) => {
                warn!(flow_id = %self.flow_id, error = %e, "Saving flow failed");
                self.save_state = SaveState::Failed {
                    reason: e.to_string(),
                };
                Err(e)
            }
        }
    }

    /// Saves when there are unsaved changes. Returns whether a save happened.
    pub fn flush(&mut self) -> Result<bool, GatewayError> {
        if !self.is_dirty() && matches!(self.save_state, SaveState::Saved { .. }) {
            return Ok(false);
        }
        self.save().map(|_| true)
    }

    fn after_change(&mut self, destructive: bool) {
        if destructive || self.config.save_policy == SavePolicy::Immediate {
            // The outcome is kept in `save_state`.
            let _ = self.save();
        } else {
            self.save_state = SaveState::Dirty;
        }
    }
}

impl Drop for Editor {
    fn drop(&mut self) {
        self.detach_device();
    }
}
