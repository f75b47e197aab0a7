use crate::graph::{Node, NodeKind};
use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};

pub const CLICK_CLASS: &str = "click";
pub const TEXT_INPUT_CLASS: &str = "text_input";
pub const FOCUS_CLASS: &str = "focus";
pub const OPEN_APP_CLASS: &str = "open_app";

/// Class given to events that arrive without an `event_type`.
pub const UNKNOWN_CLASS: &str = "unknown";

/// Maps a device event type to its comparison class and the node kind used to display it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMapping {
    pub event_type: String,
    pub class: String,
    pub kind: NodeKind,
}

/// The result of classifying one event type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Normalized class used to compare consecutive actions.
    pub class: String,
    /// Concrete node kind, keeping direction and variant for display.
    pub kind: NodeKind,
    /// False when the event type is not in the table and fell back to a generic action.
    pub known: bool,
}

/// Master macro for the built-in event table.
macro_rules! define_event_mappings {
    ( $( ($event:literal, $class:literal, $kind:ident) ),* $(,)? ) => {
        fn register_default_mappings(registry: &mut AHashMap<String, (String, NodeKind)>) {
            $( registry.insert($event.to_string(), ($class.to_string(), NodeKind::$kind)); )*
        }
    };
}

define_event_mappings! {
    // Every tap variant compares as a click; distinct taps are never treated as repetition.
    ("click", "click", Click),
    ("tap", "click", Tap),
    ("long_click", "click", LongPress),
    ("long_press", "click", LongPress),
    ("double_tap", "click", DoubleTap),
    ("double_click", "click", DoubleTap),

    ("set_text", "text_input", TextInput),
    ("text_input", "text_input", TextInput),
    ("input_text", "text_input", TextInput),
    ("text_changed", "text_input", TextInput),

    // Scrolls and swipes keep their direction.
    ("scroll_up", "scroll_up", ScrollUp),
    ("scroll_down", "scroll_down", ScrollDown),
    ("scroll_left", "scroll_left", ScrollLeft),
    ("scroll_right", "scroll_right", ScrollRight),
    ("swipe_up", "swipe_up", SwipeUp),
    ("swipe_down", "swipe_down", SwipeDown),
    ("swipe_left", "swipe_left", SwipeLeft),
    ("swipe_right", "swipe_right", SwipeRight),

    ("key_event", "key_event", KeyEvent),
    ("key_press", "key_event", KeyEvent),
    ("press_key", "key_event", KeyEvent),
    ("back", "back", Back),
    ("press_back", "back", Back),
    ("home", "home", Home),
    ("press_home", "home", Home),

    ("open_app", "open_app", OpenApp),
    ("launch_app", "open_app", OpenApp),
    ("app_launch", "open_app", OpenApp),

    ("focus", "focus", Focus),
    ("focused", "focus", Focus),
    ("view_focused", "focus", Focus),
}

/// Classifies device event types and knows which classes take part in loop detection.
#[derive(Debug, Clone)]
pub struct EventClassifier {
    mappings: AHashMap<String, (String, NodeKind)>,
    excluded: AHashSet<String>,
    element_targeted: AHashSet<String>,
}

impl EventClassifier {
    pub fn new() -> Self {
        let mut mappings = AHashMap::new();
        register_default_mappings(&mut mappings);
        Self {
            mappings,
            excluded: [TEXT_INPUT_CLASS, FOCUS_CLASS, OPEN_APP_CLASS, CLICK_CLASS]
                .into_iter()
                .map(str::to_string)
                .collect(),
            element_targeted: [CLICK_CLASS].into_iter().map(str::to_string).collect(),
        }
    }

    /// Built-in table extended with the given mappings. Later entries win.
    pub fn with_mappings<'a>(mappings: impl IntoIterator<Item = &'a EventMapping>) -> Self {
        let mut classifier = Self::new();
        for mapping in mappings {
            classifier.register(mapping.clone());
        }
        classifier
    }

    pub fn register(&mut self, mapping: EventMapping) {
        self.mappings.insert(
            normalize_key(&mapping.event_type),
            (normalize_key(&mapping.class), mapping.kind),
        );
    }

    /// Unknown event types compare by their own name and are displayed as a click node.
    pub fn classify(&self, event_type: Option<&str>) -> Classification {
        let key = event_type
            .map(normalize_key)
            .filter(|k| !k.is_empty())
            .unwrap_or_else(|| UNKNOWN_CLASS.to_string());
        match self.mappings.get(&key) {
            Some((class, kind)) => Classification {
                class: class.clone(),
                kind: *kind,
                known: true,
            },
            None => Classification {
                class: key,
                kind: NodeKind::Click,
                known: false,
            },
        }
    }

    /// The class of an already-created action node, from its recorded event type or its kind.
    pub fn class_of_node(&self, node: &Node) -> String {
        let event_type = node
            .as_action()
            .and_then(|a| a.event_type.as_deref())
            .unwrap_or(node.kind.as_str());
        self.classify(Some(event_type)).class
    }

    /// Excluded classes never start or extend a run of repeated actions.
    pub fn is_excluded(&self, class: &str) -> bool {
        self.excluded.contains(class)
    }

    /// Element-targeted classes only repeat when they hit the same element.
    pub fn is_element_targeted(&self, class: &str) -> bool {
        self.element_targeted.contains(class)
    }
}

impl Default for EventClassifier {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize_key(value: &str) -> String {
    value.trim().to_ascii_lowercase()
}
