use super::Workflow;
use super::wire::RawNode;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

pub type NodeId = String;

/// Broad grouping of node kinds. The family decides which `NodeData` variant a node carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeFamily {
    Structural,
    Action,
    Logic,
    Loop,
    LoopBoundary,
    Resource,
}

/// Master macro for the closed set of node kinds, their wire names and families.
macro_rules! define_node_kinds {
    ( $( ($variant:ident, $name:literal, $family:ident) ),* $(,)? ) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum NodeKind {
            $( #[serde(rename = $name)] $variant, )*
        }

        impl NodeKind {
            pub const ALL: &'static [NodeKind] = &[ $( NodeKind::$variant, )* ];

            /// The wire name used in the `type` field of a serialized node.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( NodeKind::$variant => $name, )*
                }
            }

            pub fn family(&self) -> NodeFamily {
                match self {
                    $( NodeKind::$variant => NodeFamily::$family, )*
                }
            }

            pub fn from_name(name: &str) -> Option<NodeKind> {
                match name {
                    $( $name => Some(NodeKind::$variant), )*
                    _ => None,
                }
            }
        }
    };
}

define_node_kinds! {
    (Input, "input", Structural),
    (Output, "output", Structural),

    (Click, "click", Action),
    (Tap, "tap", Action),
    (LongPress, "long_press", Action),
    (DoubleTap, "double_tap", Action),
    (TextInput, "text_input", Action),
    (ScrollUp, "scroll_up", Action),
    (ScrollDown, "scroll_down", Action),
    (ScrollLeft, "scroll_left", Action),
    (ScrollRight, "scroll_right", Action),
    (SwipeUp, "swipe_up", Action),
    (SwipeDown, "swipe_down", Action),
    (SwipeLeft, "swipe_left", Action),
    (SwipeRight, "swipe_right", Action),
    (KeyEvent, "key_event", Action),
    (OpenApp, "open_app", Action),
    (Back, "back", Action),
    (Home, "home", Action),
    (Focus, "focus", Action),

    (Condition, "condition", Logic),
    (Probability, "probability", Logic),
    (Wait, "wait", Logic),
    (Assert, "assert", Logic),
    (ElementCheck, "element_check", Logic),
    (WaitForElement, "wait_for_element", Logic),

    (Loop, "loop", Loop),
    (LoopStart, "loopStart", LoopBoundary),
    (LoopEnd, "loopEnd", LoopBoundary),

    (FileInput, "file_input", Resource),
    (TextData, "text_data", Resource),
    (DataSource, "data_source", Resource),
    (AiProcess, "ai_process", Resource),
    (AiCall, "ai_call", Resource),
    (Http, "http", Resource),
}

impl NodeKind {
    pub fn is_action(&self) -> bool {
        self.family() == NodeFamily::Action
    }

    pub fn is_loop_boundary(&self) -> bool {
        self.family() == NodeFamily::LoopBoundary
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canvas position of a node.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Device-pixel coordinates of an interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coordinates {
    pub x: i32,
    pub y: i32,
}

impl Coordinates {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// True when both axes differ by at most `tolerance` pixels.
    pub fn within(&self, other: &Coordinates, tolerance: f64) -> bool {
        f64::from(self.x.abs_diff(other.x)) <= tolerance
            && f64::from(self.y.abs_diff(other.y)) <= tolerance
    }
}

/// On-screen rectangle of the element an interaction targeted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Bounds {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Bounds {
    /// Midpoint of the rectangle. Extreme or inverted device bounds never overflow.
    pub fn center(&self) -> Coordinates {
        Coordinates::new(midpoint(self.left, self.right), midpoint(self.top, self.bottom))
    }
}

fn midpoint(a: i32, b: i32) -> i32 {
    let mid = (i64::from(a) + i64::from(b)) / 2;
    i32::try_from(mid).unwrap_or(if mid < 0 { i32::MIN } else { i32::MAX })
}

impl FromStr for Bounds {
    type Err = String;

    /// Parses the Android accessibility notation `[left,top][right,bottom]`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let numbers: Vec<i32> = s
            .split(|c: char| c == '[' || c == ']' || c == ',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| part.parse::<i32>().map_err(|e| format!("'{}': {}", part, e)))
            .collect::<Result<_, _>>()?;
        match numbers.as_slice() {
            [left, top, right, bottom] => Ok(Bounds {
                left: *left,
                top: *top,
                right: *right,
                bottom: *bottom,
            }),
            _ => Err(format!("expected four numbers in bounds '{}'", s)),
        }
    }
}

impl<'de> Deserialize<'de> for Bounds {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawBounds {
            Rect {
                left: i32,
                top: i32,
                right: i32,
                bottom: i32,
            },
            Text(String),
        }

        match RawBounds::deserialize(deserializer)? {
            RawBounds::Rect {
                left,
                top,
                right,
                bottom,
            } => Ok(Bounds {
                left,
                top,
                right,
                bottom,
            }),
            RawBounds::Text(text) => text.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// Payload of `input`, `output`, `loopStart` and `loopEnd` nodes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BoundaryData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Payload shared by every device action node.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ActionData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
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
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_description: Option<String>,
    pub is_recorded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence_number: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LoopType {
    #[default]
    Count,
    ForEach,
    While,
}

fn default_iterations() -> u32 {
    1
}

/// Payload of a `loop` node: a nested workflow executed `iterations` times.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub loop_type: LoopType,
    #[serde(default = "default_iterations")]
    pub iterations: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_variable: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_variable: Option<String>,
    #[serde(default)]
    pub sub_flow: Workflow,
    #[serde(default)]
    pub is_auto_generated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_action_count: Option<u32>,
}

impl Default for LoopData {
    fn default() -> Self {
        Self {
            label: None,
            loop_type: LoopType::Count,
            iterations: default_iterations(),
            item_variable: None,
            index_variable: None,
            sub_flow: Workflow::default(),
            is_auto_generated: false,
            original_action_count: None,
        }
    }
}

impl LoopData {
    /// The first node of the sub-flow that is not a `loopStart`/`loopEnd` marker.
    ///
    /// Merge matching for auto-generated loops keys off this node, so a sub-flow that was
    /// edited by hand afterwards is matched by whatever now sits first.
    pub fn representative_action(&self) -> Option<&Node> {
        self.sub_flow
            .nodes
            .iter()
            .find(|n| !n.kind.is_loop_boundary())
    }
}

/// Payload of condition/probability/wait/assert style nodes. Configuration is free-form.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LogicData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(flatten)]
    pub config: serde_json::Map<String, serde_json::Value>,
}

/// Payload of resource nodes (data sources, files, AI and HTTP calls).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResourceData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Name of the variable this resource binds through its data wires.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_variable: Option<String>,
    #[serde(flatten)]
    pub config: serde_json::Map<String, serde_json::Value>,
}

/// Kind-specific node payload.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeData {
    Boundary(BoundaryData),
    Action(ActionData),
    Logic(LogicData),
    Loop(LoopData),
    Resource(ResourceData),
}

impl NodeData {
    /// An empty payload of the variant matching `kind`.
    pub fn empty_for(kind: NodeKind) -> Self {
        match kind.family() {
            NodeFamily::Structural | NodeFamily::LoopBoundary => {
                NodeData::Boundary(BoundaryData::default())
            }
            NodeFamily::Action => NodeData::Action(ActionData::default()),
            NodeFamily::Logic => NodeData::Logic(LogicData::default()),
            NodeFamily::Loop => NodeData::Loop(LoopData::default()),
            NodeFamily::Resource => NodeData::Resource(ResourceData::default()),
        }
    }

    pub fn label(&self) -> Option<&str> {
        match self {
            NodeData::Boundary(d) => d.label.as_deref(),
            NodeData::Action(d) => d.label.as_deref(),
            NodeData::Logic(d) => d.label.as_deref(),
            NodeData::Loop(d) => d.label.as_deref(),
            NodeData::Resource(d) => d.label.as_deref(),
        }
    }

    pub fn set_label(&mut self, label: impl Into<String>) {
        let label = Some(label.into());
        match self {
            NodeData::Boundary(d) => d.label = label,
            NodeData::Action(d) => d.label = label,
            NodeData::Logic(d) => d.label = label,
            NodeData::Loop(d) => d.label = label,
            NodeData::Resource(d) => d.label = label,
        }
    }

    fn fits(&self, kind: NodeKind) -> bool {
        matches!(
            (self, kind.family()),
            (NodeData::Boundary(_), NodeFamily::Structural | NodeFamily::LoopBoundary)
                | (NodeData::Action(_), NodeFamily::Action)
                | (NodeData::Logic(_), NodeFamily::Logic)
                | (NodeData::Loop(_), NodeFamily::Loop)
                | (NodeData::Resource(_), NodeFamily::Resource)
        )
    }
}

/// A single graph vertex.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawNode", into = "RawNode")]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    pub position: Position,
    pub data: NodeData,
}

impl Node {
    /// Creates a node with an empty payload for its kind.
    pub fn new(id: impl Into<NodeId>, kind: NodeKind, position: Position) -> Self {
        Self {
            id: id.into(),
            kind,
            position,
            data: NodeData::empty_for(kind),
        }
    }

    /// Creates a node with the given payload, falling back to an empty payload when the
    /// payload variant does not belong to `kind`.
    pub fn with_data(
        id: impl Into<NodeId>,
        kind: NodeKind,
        position: Position,
        data: NodeData,
    ) -> Self {
        let data = if data.fits(kind) {
            data
        } else {
            NodeData::empty_for(kind)
        };
        Self {
            id: id.into(),
            kind,
            position,
            data,
        }
    }

    pub fn action(
        id: impl Into<NodeId>,
        kind: NodeKind,
        position: Position,
        data: ActionData,
    ) -> Self {
        Self::with_data(id, kind, position, NodeData::Action(data))
    }

    pub fn looping(id: impl Into<NodeId>, position: Position, data: LoopData) -> Self {
        Self::with_data(id, NodeKind::Loop, position, NodeData::Loop(data))
    }

    pub fn label(&self) -> Option<&str> {
        self.data.label()
    }

    /// The label, or the kind's wire name when no label is set.
    pub fn display_label(&self) -> String {
        self.label()
            .map(str::to_string)
            .unwrap_or_else(|| self.kind.as_str().to_string())
    }

    pub fn is_loop(&self) -> bool {
        self.kind == NodeKind::Loop
    }

    pub fn as_action(&self) -> Option<&ActionData> {
        match &self.data {
            NodeData::Action(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_action_mut(&mut self) -> Option<&mut ActionData> {
        match &mut self.data {
            NodeData::Action(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_loop(&self) -> Option<&LoopData> {
        match &self.data {
            NodeData::Loop(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_loop_mut(&mut self) -> Option<&mut LoopData> {
        match &mut self.data {
            NodeData::Loop(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_resource(&self) -> Option<&ResourceData> {
        match &self.data {
            NodeData::Resource(d) => Some(d),
            _ => None,
        }
    }

    pub(crate) fn payload_fits_kind(&self) -> bool {
        self.data.fits(self.kind)
    }
}
