use crate::graph::{Coordinates, NodeId};
use ahash::AHashSet;

/// A recorded action that may still collapse into a loop.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedAction {
    /// The node created for this action. `None` for the event that trips the threshold, which
    /// never gets a node of its own.
    pub node_id: Option<NodeId>,
    pub class: String,
    pub coordinates: Option<Coordinates>,
    pub identifier: Option<String>,
}

/// How a candidate action is compared against the first action of the current run.
#[derive(Debug, Clone, Copy)]
pub struct MatchRules {
    pub position_tolerance: f64,
    pub element_targeted: bool,
}

/// The run of consecutive similar actions not yet resolved into a loop.
///
/// Owned by the recorder and read-then-written synchronously for every event, so it always
/// reflects every event processed so far, independent of when the graph update lands.
#[derive(Debug, Clone, Default)]
pub struct ConsecutiveActionTracker {
    entries: Vec<TrackedAction>,
}

impl ConsecutiveActionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extends the run with `action` when it matches the run's first entry, otherwise starts a
    /// fresh run with it. Returns the run length afterwards.
    pub fn observe(&mut self, action: TrackedAction, rules: MatchRules) -> usize {
        let extends = self
            .entries
            .first()
            .is_some_and(|first| Self::matches(first, &action, rules));
        if !extends {
            self.entries.clear();
        }
        self.entries.push(action);
        self.entries.len()
    }

    fn matches(first: &TrackedAction, candidate: &TrackedAction, rules: MatchRules) -> bool {
        if first.class != candidate.class {
            return false;
        }
        if !rules.element_targeted {
            return true;
        }
        let same_position = match (&first.coordinates, &candidate.coordinates) {
            (Some(a), Some(b)) => a.within(b, rules.position_tolerance),
            (None, None) => true,
            _ => false,
        };
        let same_identifier = match (&first.identifier, &candidate.identifier) {
            (None, None) => true,
            (Some(a), Some(b)) => a == b,
            _ => false,
        };
        same_position && same_identifier
    }

    /// Records the node created for the most recent entry.
    pub fn attach_node(&mut self, node_id: NodeId) {
        if let Some(last) = self.entries.last_mut() {
            last.node_id = Some(node_id);
        }
    }

    /// Node ids of the tracked actions that have a node.
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.entries
            .iter()
            .filter_map(|e| e.node_id.clone())
            .collect()
    }

    /// Clears the run when any of `ids` belongs to it. Returns whether it was cleared.
    pub fn reset_if_touching(&mut self, ids: &AHashSet<NodeId>) -> bool {
        let touching = self
            .entries
            .iter()
            .any(|e| e.node_id.as_ref().is_some_and(|id| ids.contains(id)));
        if touching {
            self.entries.clear();
        }
        touching
    }

    pub fn entries(&self) -> &[TrackedAction] {
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
