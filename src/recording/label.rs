use super::classify::Classification;
use super::event::InteractionEvent;
use crate::graph::NodeKind;
use itertools::Itertools;

/// Builds a human-readable label for a recorded event.
pub fn synthesize_label(
    event: &InteractionEvent,
    classification: &Classification,
    max_chars: usize,
) -> String {
    if !classification.known {
        return title_case(event.event_type.as_deref().unwrap_or("action"));
    }

    match classification.kind {
        NodeKind::Click | NodeKind::Tap => with_target("Tap", event, max_chars),
        NodeKind::LongPress => with_target("Long press", event, max_chars),
        NodeKind::DoubleTap => with_target("Double tap", event, max_chars),
        NodeKind::Focus => with_target("Focus", event, max_chars),
        NodeKind::TextInput => match non_empty(event.text.as_deref()) {
            Some(text) => format!("Type {}", quoted(text, max_chars)),
            None => "Type text".to_string(),
        },
        NodeKind::ScrollUp => "Scroll up".to_string(),
        NodeKind::ScrollDown => "Scroll down".to_string(),
        NodeKind::ScrollLeft => "Scroll left".to_string(),
        NodeKind::ScrollRight => "Scroll right".to_string(),
        NodeKind::SwipeUp => "Swipe up".to_string(),
        NodeKind::SwipeDown => "Swipe down".to_string(),
        NodeKind::SwipeLeft => "Swipe left".to_string(),
        NodeKind::SwipeRight => "Swipe right".to_string(),
        NodeKind::OpenApp => {
            let package = non_empty(event.package_name.as_deref())
                .or_else(|| non_empty(event.text.as_deref()));
            match package {
                Some(package) => format!("Open {}", app_name(package)),
                None => "Open app".to_string(),
            }
        }
        NodeKind::KeyEvent => match key_name(event) {
            Some(key) => format!("Press {}", key),
            None => "Key event".to_string(),
        },
        NodeKind::Back => "Press back".to_string(),
        NodeKind::Home => "Press home".to_string(),
        _ => title_case(event.event_type.as_deref().unwrap_or("action")),
    }
}

fn with_target(verb: &str, event: &InteractionEvent, max_chars: usize) -> String {
    if let Some(text) = non_empty(event.text.as_deref()) {
        return format!("{} {}", verb, quoted(text, max_chars));
    }
    if let Some(description) = non_empty(event.content_description.as_deref()) {
        return format!("{} {}", verb, quoted(description, max_chars));
    }
    if let Some(resource_id) = non_empty(event.resource_id.as_deref()) {
        let short = resource_id.rsplit('/').next().unwrap_or(resource_id);
        return format!("{} {}", verb, short);
    }
    match event.coordinates() {
        Some(c) => format!("{} at ({}, {})", verb, c.x, c.y),
        None => verb.to_string(),
    }
}

fn key_name(event: &InteractionEvent) -> Option<String> {
    if let Some(text) = non_empty(event.text.as_deref()) {
        return Some(text.to_string());
    }
    let data = event.action_data.as_ref()?;
    ["key", "keyName", "key_code", "keyCode"]
        .iter()
        .find_map(|field| match data.get(*field)? {
            serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Wraps `text` in double quotes, cutting it to `max_chars` characters.
pub fn quoted(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let cut: String = text.chars().take(max_chars).collect();
        format!("\"{}...\"", cut)
    } else {
        format!("\"{}\"", text)
    }
}

/// `com.android.chrome` becomes `Chrome`.
pub fn app_name(package_name: &str) -> String {
    let segment = package_name
        .rsplit('.')
        .find(|s| !s.is_empty())
        .unwrap_or(package_name);
    capitalize(segment)
}

/// `long_click` becomes `Long Click`.
pub fn title_case(value: &str) -> String {
    value
        .split(|c: char| c == '_' || c == '-' || c == '.' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .map(capitalize)
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
