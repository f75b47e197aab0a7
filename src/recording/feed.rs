use crate::graph::{Bounds, Coordinates, NodeId};
use ahash::AHashSet;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Entry of the live action feed. Not part of the persisted workflow.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedAction {
    pub node_id: NodeId,
    pub event_type: String,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounds: Option<Bounds>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot_url: Option<String>,
}

/// Ordered list of what recording produced, newest last.
#[derive(Debug, Clone, Default)]
pub struct RecordedActionFeed {
    entries: Vec<RecordedAction>,
}

impl RecordedActionFeed {
    pub fn push(&mut self, action: RecordedAction) {
        self.entries.push(action);
    }

    pub fn pop(&mut self) -> Option<RecordedAction> {
        self.entries.pop()
    }

    pub fn find_mut(&mut self, node_id: &str) -> Option<&mut RecordedAction> {
        self.entries.iter_mut().rev().find(|a| a.node_id == node_id)
    }

    /// Drops every entry whose node is in `ids`. Returns how many were dropped.
    pub fn remove_nodes(&mut self, ids: &AHashSet<NodeId>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|a| !ids.contains(&a.node_id));
        before - self.entries.len()
    }

    pub fn entries(&self) -> &[RecordedAction] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
