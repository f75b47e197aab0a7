//! Tunable constants of the editor core.
//!
//! Every field has a default, so an empty JSON object is a valid configuration:
//!
//! ```rust
//! use kiroku::config::EditorConfig;
//!
//! let config = EditorConfig::from_json_str(r#"{ "loopThreshold": 4 }"#).unwrap();
//! assert_eq!(config.loop_threshold, 4);
//! assert_eq!(config.position_tolerance, 50.0);
//! ```
use crate::error::ConfigError;
use crate::graph::NodeKind;
use crate::recording::EventMapping;
use serde::{Deserialize, Serialize};
use std::fs;

/// When structural mutations are written to the persistence gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SavePolicy {
    /// Save after every structural mutation.
    #[default]
    Immediate,
    /// Mark the workflow dirty and save on `Editor::flush`. Destructive edits still save
    /// immediately.
    Deferred,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EditorConfig {
    /// Consecutive similar actions needed before they collapse into a loop.
    pub loop_threshold: usize,
    /// Maximum per-axis distance, in device pixels, for two taps to count as the same target.
    pub position_tolerance: f64,
    /// Vertical band within which nodes are treated as one row when ordering a selection.
    pub row_tolerance: f64,
    /// Quoted text in synthesized labels is cut to this many characters.
    pub label_max_chars: usize,
    pub node_x: f64,
    pub first_node_y: f64,
    pub node_height: f64,
    pub node_gap: f64,
    /// Depth of each of the undo and redo stacks.
    pub history_limit: usize,
    /// Iteration count of loops created with "wrap in loop".
    pub default_loop_iterations: u32,
    pub save_policy: SavePolicy,
    /// Device event types mapped on top of the built-in table.
    pub event_mappings: Vec<EventMapping>,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            loop_threshold: 3,
            position_tolerance: 50.0,
            row_tolerance: 50.0,
            label_max_chars: 25,
            node_x: 250.0,
            first_node_y: 100.0,
            node_height: 80.0,
            node_gap: 40.0,
            history_limit: 50,
            default_loop_iterations: 1,
            save_policy: SavePolicy::Immediate,
            event_mappings: Vec::new(),
        }
    }
}

impl EditorConfig {
    pub fn builder() -> EditorConfigBuilder {
        EditorConfigBuilder::new()
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: EditorConfig =
            serde_json::from_str(json).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_string(),
            message: e.to_string(),
        })?;
        Self::from_json_str(&content)
    }

    /// Vertical distance between consecutive recorded nodes.
    pub fn vertical_step(&self) -> f64 {
        self.node_height + self.node_gap
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.loop_threshold < 2 {
            return Err(ConfigError::InvalidValue {
                field: "loopThreshold",
                message: format!("must be at least 2, got {}", self.loop_threshold),
            });
        }
        if self.position_tolerance <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "positionTolerance",
                message: format!("must be positive, got {}", self.position_tolerance),
            });
        }
        if self.row_tolerance <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "rowTolerance",
                message: format!("must be positive, got {}", self.row_tolerance),
            });
        }
        if self.history_limit == 0 {
            return Err(ConfigError::InvalidValue {
                field: "historyLimit",
                message: "must be at least 1".to_string(),
            });
        }
        if self.default_loop_iterations == 0 {
            return Err(ConfigError::InvalidValue {
                field: "defaultLoopIterations",
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

pub struct EditorConfigBuilder {
    config: EditorConfig,
}

impl EditorConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: EditorConfig::default(),
        }
    }

    pub fn loop_threshold(mut self, threshold: usize) -> Self {
        self.config.loop_threshold = threshold;
        self
    }

    pub fn position_tolerance(mut self, tolerance: f64) -> Self {
        self.config.position_tolerance = tolerance;
        self
    }

    pub fn row_tolerance(mut self, tolerance: f64) -> Self {
        self.config.row_tolerance = tolerance;
        self
    }

    pub fn label_max_chars(mut self, max: usize) -> Self {
        self.config.label_max_chars = max;
        self
    }

    pub fn layout(mut self, node_x: f64, first_node_y: f64, node_height: f64, node_gap: f64) -> Self {
        self.config.node_x = node_x;
        self.config.first_node_y = first_node_y;
        self.config.node_height = node_height;
        self.config.node_gap = node_gap;
        self
    }

    pub fn history_limit(mut self, limit: usize) -> Self {
        self.config.history_limit = limit;
        self
    }

    pub fn default_loop_iterations(mut self, iterations: u32) -> Self {
        self.config.default_loop_iterations = iterations;
        self
    }

    pub fn save_policy(mut self, policy: SavePolicy) -> Self {
        self.config.save_policy = policy;
        self
    }

    /// Maps a device event type to a comparison class and a node kind.
    pub fn with_event_mapping(mut self, event_type: &str, class: &str, kind: NodeKind) -> Self {
        self.config.event_mappings.push(EventMapping {
            event_type: event_type.to_string(),
            class: class.to_string(),
            kind,
        });
        self
    }

    pub fn build(self) -> Result<EditorConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for EditorConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
