use super::{
    ChannelHub, MemoryPersistence, PersistenceGateway, RunTrigger, SessionControl, SessionHandle,
    TestRunReceipt,
};
use crate::error::GatewayError;
use crate::execution::{ProgressMessage, Simulator};
use crate::recording::{DeviceMessage, InteractionEvent};
use ahash::AHashMap;
use tracing::{info, warn};

/// Progress events a single test run publishes at most.
pub const DEFAULT_REPLAY_LIMIT: usize = 100_000;

/// An in-process device: recording sessions and test runs are delivered through a [`ChannelHub`].
///
/// Test runs load the flow from a shared [`MemoryPersistence`], replay it with a
/// [`Simulator`] and publish its progress events before returning, up to the replay limit.
#[derive(Debug, Clone)]
pub struct LoopbackDevice {
    hub: ChannelHub,
    library: MemoryPersistence,
    sessions: AHashMap<String, SessionHandle>,
    next_session: u64,
    next_sequence: u64,
    fail_on: Option<String>,
    replay_limit: usize,
}

impl LoopbackDevice {
    pub fn new(hub: ChannelHub, library: MemoryPersistence) -> Self {
        Self {
            hub,
            library,
            sessions: AHashMap::new(),
            next_session: 1,
            next_sequence: 1,
            fail_on: None,
            replay_limit: DEFAULT_REPLAY_LIMIT,
        }
    }

    /// Caps the progress events one test run publishes.
    pub fn set_replay_limit(&mut self, limit: usize) {
        self.replay_limit = limit;
    }

    /// Makes the next test runs report an error for `node_id`.
    pub fn fail_on(&mut self, node_id: &str) {
        self.fail_on = Some(node_id.to_string());
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Publishes a captured interaction as the device would. Events without a sequence number
    /// get the next one.
    pub fn emit(&mut self, device_id: &str, mut event: InteractionEvent) -> usize {
        match event.sequence_number {
            Some(n) => self.next_sequence = self.next_sequence.max(n.saturating_add(1)),
            None => {
                event.sequence_number = Some(self.next_sequence);
                self.next_sequence += 1;
            }
        }
        self.hub.publish_device(device_id, DeviceMessage::captured(event))
    }
}

impl SessionControl for LoopbackDevice {
    fn start_recording(&mut self, device_id: &str, flow_id: &str) -> Result<SessionHandle, GatewayError> {
        let handle = SessionHandle {
            session_id: format!("session_{}", self.next_session),
            device_id: device_id.to_string(),
            flow_id: flow_id.to_string(),
        };
        self.next_session += 1;
        self.next_sequence = 1;
        self.sessions.insert(handle.session_id.clone(), handle.clone());
        self.hub.publish_device(
            device_id,
            DeviceMessage::RecordingStarted {
                session: handle.session_id.clone(),
                target_app: None,
            },
        );
        info!(session_id = %handle.session_id, device_id, "Loopback recording started");
        Ok(handle)
    }

    fn stop_recording(&mut self, session_id: &str) -> Result<(), GatewayError> {
        let handle = self
            .sessions
            .remove(session_id)
            .ok_or_else(|| GatewayError::UnknownSession(session_id.to_string()))?;
        self.hub
            .publish_device(&handle.device_id, DeviceMessage::RecordingStopped {});
        Ok(())
    }
}

impl RunTrigger for LoopbackDevice {
    fn test_run(&mut self, flow_id: &str, device_id: &str) -> Result<TestRunReceipt, GatewayError> {
        let workflow = self
            .library
            .load(flow_id)?
            .ok_or_else(|| GatewayError::Rejected(format!("flow '{}' has not been saved", flow_id)))?;
        let mut simulator = Simulator::new(flow_id, &workflow);
        if let Some(node_id) = &self.fail_on {
            simulator = simulator.fail_on(node_id);
        }
        let receipt = TestRunReceipt {
            actions_count: simulator.action_count(),
        };
        let mut published = 0;
        for event in simulator.by_ref().take(self.replay_limit) {
            self.hub
                .publish_progress(device_id, ProgressMessage::ActionProgress(event));
            published += 1;
        }
        if simulator.next().is_some() {
            warn!(flow_id, device_id, published, "Loopback test run truncated at the replay limit");
        }
        info!(flow_id, device_id, actions = receipt.actions_count, "Loopback test run replayed");
        Ok(receipt)
    }
}
