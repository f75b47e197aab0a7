use crate::graph::NodeId;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// One line of the chronological run log.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunLogEntry {
    /// Receipt order within the run, starting at 1.
    pub ordinal: u64,
    pub at: DateTime<Utc>,
    pub level: LogLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_id: Option<NodeId>,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct RunLog {
    entries: Vec<RunLogEntry>,
    last_ordinal: u64,
}

impl RunLog {
    /// Appends an entry and returns its ordinal.
    pub fn push(&mut self, level: LogLevel, node_id: Option<&str>, message: impl Into<String>) -> u64 {
        self.last_ordinal += 1;
        self.entries.push(RunLogEntry {
            ordinal: self.last_ordinal,
            at: Utc::now(),
            level,
            node_id: node_id.map(str::to_string),
            message: message.into(),
        });
        self.last_ordinal
    }

    pub fn entries(&self) -> &[RunLogEntry] {
        &self.entries
    }

    pub fn last(&self) -> Option<&RunLogEntry> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.last_ordinal = 0;
    }
}
