use crate::graph::{Bounds, Coordinates};
use serde::{Deserialize, Serialize};

/// One interaction captured on the device.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionEvent {
    pub event_type: Option<String>,
    pub sequence_number: Option<u64>,
    pub resource_id: Option<String>,
    pub text: Option<String>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub bounds: Option<Bounds>,
    pub package_name: Option<String>,
    pub class_name: Option<String>,
    pub content_description: Option<String>,
    pub action_data: Option<serde_json::Value>,
}

impl InteractionEvent {
    pub fn new(event_type: &str) -> Self {
        Self {
            event_type: Some(event_type.to_string()),
            ..Self::default()
        }
    }

    pub fn with_sequence(mut self, sequence_number: u64) -> Self {
        self.sequence_number = Some(sequence_number);
        self
    }

    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.x = Some(x);
        self.y = Some(y);
        self
    }

    pub fn with_resource_id(mut self, resource_id: &str) -> Self {
        self.resource_id = Some(resource_id.to_string());
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    pub fn with_package(mut self, package_name: &str) -> Self {
        self.package_name = Some(package_name.to_string());
        self
    }

    /// Tap coordinates, taken from `x`/`y` or else the centre of `bounds`.
    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.x, self.y) {
            (Some(x), Some(y)) => Some(Coordinates::new(x.round() as i32, y.round() as i32)),
            _ => self.bounds.map(|b| b.center()),
        }
    }

    /// The identifier used to tell element targets apart: resource id first, then text.
    pub fn identifier(&self) -> Option<String> {
        non_empty(&self.resource_id).or_else(|| non_empty(&self.text))
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.trim().is_empty()).cloned()
}

/// Display hints the device may send alongside an event.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeSuggestion {
    pub label: Option<String>,
    pub color: Option<String>,
}

/// Messages delivered on a device's interaction event channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DeviceMessage {
    #[serde(rename = "recording.started")]
    RecordingStarted {
        session: String,
        #[serde(default)]
        target_app: Option<String>,
    },
    #[serde(rename = "recording.stopped")]
    RecordingStopped {},
    #[serde(rename = "event.captured")]
    EventCaptured {
        event: InteractionEvent,
        #[serde(default)]
        node_suggestion: Option<NodeSuggestion>,
    },
}

impl DeviceMessage {
    pub fn captured(event: InteractionEvent) -> Self {
        DeviceMessage::EventCaptured {
            event,
            node_suggestion: None,
        }
    }
}
