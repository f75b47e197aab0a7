use crate::graph::{GraphSnapshot, GraphStore};
use std::collections::VecDeque;
use tracing::debug;

/// Snapshot-based undo/redo over a [`GraphStore`].
///
/// Callers take a snapshot *before* a reversible structural change. Additive recording steps
/// do not snapshot; recording has its own "undo last recorded action".
#[derive(Debug, Clone)]
pub struct History {
    undo_stack: VecDeque<GraphSnapshot>,
    redo_stack: Vec<GraphSnapshot>,
    limit: usize,
}

impl History {
    pub fn new(limit: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
            limit: limit.max(1),
        }
    }

    /// Records the current graph. Any redo history is discarded.
    pub fn take_snapshot(&mut self, store: &GraphStore) {
        self.push(store.snapshot());
    }

    /// Records a snapshot taken earlier, for callers that only commit it once the change applied.
    pub fn push(&mut self, snapshot: GraphSnapshot) {
        self.undo_stack.push_back(snapshot);
        self.redo_stack.clear();
        while self.undo_stack.len() > self.limit {
            self.undo_stack.pop_front();
        }
    }

    /// Restores the most recent snapshot. Returns `false` when there is nothing to undo.
    pub fn undo(&mut self, store: &mut GraphStore) -> bool {
        let Some(snapshot) = self.undo_stack.pop_back() else {
            return false;
        };
        let current = store.restore(snapshot);
        self.redo_stack.push(current);
        if self.redo_stack.len() > self.limit {
            self.redo_stack.remove(0);
        }
        debug!(undo_depth = self.undo_stack.len(), "Undo applied");
        true
    }

    /// Re-applies the most recently undone change. Returns `false` when there is nothing to redo.
    pub fn redo(&mut self, store: &mut GraphStore) -> bool {
        let Some(snapshot) = self.redo_stack.pop() else {
            return false;
        };
        let current = store.restore(snapshot);
        self.undo_stack.push_back(current);
        if self.undo_stack.len() > self.limit {
            self.undo_stack.pop_front();
        }
        debug!(redo_depth = self.redo_stack.len(), "Redo applied");
        true
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new(50)
    }
}
