//! Outbound collaborators of the editor core and the inbound channel plumbing.
//!
//! The core only talks to these traits. [`JsonFilePersistence`] and [`MemoryPersistence`] are
//! ready-made persistence backends, [`ChannelHub`] delivers device and progress messages to
//! per-(device, flow) subscriptions, and [`LoopbackDevice`] is a local stand-in for a device
//! that records and replays through the hub.
mod hub;
mod loopback;
mod persistence;

pub use hub::{ChannelHub, ListenerKey, Subscription};
pub use loopback::LoopbackDevice;
pub use persistence::{JsonFilePersistence, MemoryPersistence};

use crate::error::GatewayError;
use crate::graph::Workflow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveReceipt {
    pub saved_at: DateTime<Utc>,
}

/// Stores workflow snapshots. The in-memory workflow stays authoritative when a save fails.
pub trait PersistenceGateway {
    fn save(&mut self, flow_id: &str, workflow: &Workflow) -> Result<SaveReceipt, GatewayError>;

    /// Returns `Ok(None)` when nothing was saved for `flow_id` yet.
    fn load(&self, flow_id: &str) -> Result<Option<Workflow>, GatewayError>;
}

/// A recording session opened on a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionHandle {
    pub session_id: String,
    pub device_id: String,
    pub flow_id: String,
}

pub trait SessionControl {
    fn start_recording(&mut self, device_id: &str, flow_id: &str) -> Result<SessionHandle, GatewayError>;

    fn stop_recording(&mut self, session_id: &str) -> Result<(), GatewayError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestRunReceipt {
    pub actions_count: usize,
}

/// Asks a device to replay a saved flow. Progress arrives on the progress channel.
pub trait RunTrigger {
    fn test_run(&mut self, flow_id: &str, device_id: &str) -> Result<TestRunReceipt, GatewayError>;
}
