//! Recording ingestion: turns the device interaction stream into graph nodes.
//!
//! Each captured event goes through the same pipeline:
//!
//! 1. duplicate suppression on `sequence_number`,
//! 2. classification into a comparison class and a display kind,
//! 3. label synthesis (or the device's suggested label),
//! 4. text-input coalescing against the tail node,
//! 5. repetition tracking, which collapses runs of similar actions into auto-generated loops,
//! 6. otherwise, a new node appended below the tail and connected from it.
pub mod classify;
pub mod event;
pub mod feed;
pub mod label;
pub mod tracker;

pub use classify::*;
pub use event::*;
pub use feed::*;
pub use label::synthesize_label;
pub use tracker::*;

use crate::config::EditorConfig;
use crate::graph::{ActionData, GraphStore, LoopData, Node, NodeId, NodeKind, Position};
use crate::mutation::{self, auto_loop_label};
use ahash::AHashSet;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

/// An active recording session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingSession {
    pub session_id: String,
    pub target_app: Option<String>,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    NotRecording,
    Duplicate { sequence_number: u64 },
    /// A text flush shorter than what the field already holds.
    ShorterText,
    /// The graph refused the new node.
    Rejected,
}

/// What a single device message did to the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    SessionStarted(String),
    SessionStopped,
    Ignored(IgnoreReason),
    Appended(NodeId),
    Coalesced(NodeId),
    LoopSynthesized {
        loop_id: NodeId,
        iterations: u32,
        removed: Vec<NodeId>,
    },
    LoopMerged {
        loop_id: NodeId,
        iterations: u32,
        removed: Vec<NodeId>,
    },
}

impl IngestOutcome {
    /// Whether the outcome changed nodes or edges.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            IngestOutcome::Appended(_)
                | IngestOutcome::Coalesced(_)
                | IngestOutcome::LoopSynthesized { .. }
                | IngestOutcome::LoopMerged { .. }
        )
    }
}

/// Session-scoped recording state: the classifier, the repetition tracker and the action feed.
///
/// All state lives in plain fields and is read and written synchronously within each call, so
/// back-to-back events always see the result of the previous one.
#[derive(Debug, Clone)]
pub struct Recorder {
    classifier: EventClassifier,
    tracker: ConsecutiveActionTracker,
    feed: RecordedActionFeed,
    session: Option<RecordingSession>,
    last_sequence: Option<u64>,
    recorded_count: usize,
    /// Auto-generated loops created or extended in the current session.
    session_loops: AHashSet<NodeId>,
}

impl Recorder {
    pub fn new(config: &EditorConfig) -> Self {
        Self {
            classifier: EventClassifier::with_mappings(&config.event_mappings),
            tracker: ConsecutiveActionTracker::new(),
            feed: RecordedActionFeed::default(),
            session: None,
            last_sequence: None,
            recorded_count: 0,
            session_loops: AHashSet::new(),
        }
    }

    pub fn is_recording(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&RecordingSession> {
        self.session.as_ref()
    }

    pub fn feed(&self) -> &RecordedActionFeed {
        &self.feed
    }

    pub fn tracker(&self) -> &ConsecutiveActionTracker {
        &self.tracker
    }

    pub fn classifier(&self) -> &EventClassifier {
        &self.classifier
    }

    /// Number of graph nodes recording has produced in the current session.
    pub fn recorded_count(&self) -> usize {
        self.recorded_count
    }

    /// Starts a session. Re-announcing the active session is a no-op.
    pub fn begin_session(&mut self, session_id: &str, target_app: Option<String>) {
        if self
            .session
            .as_ref()
            .is_some_and(|s| s.session_id == session_id)
        {
            return;
        }
        info!(session_id, target_app = ?target_app, "Recording session started");
        self.session = Some(RecordingSession {
            session_id: session_id.to_string(),
            target_app,
            started_at: Utc::now(),
        });
        self.tracker.clear();
        self.feed.clear();
        self.last_sequence = None;
        self.recorded_count = 0;
        self.session_loops.clear();
    }

    /// Ends the session. The feed is kept so the last actions can still be undone.
    pub fn end_session(&mut self) -> Option<RecordingSession> {
        self.tracker.clear();
        self.last_sequence = None;
        let session = self.session.take();
        if let Some(s) = &session {
            info!(session_id = %s.session_id, recorded = self.recorded_count, "Recording session stopped");
        }
        session
    }

    pub fn handle_message(
        &mut self,
        store: &mut GraphStore,
        message: &DeviceMessage,
        config: &EditorConfig,
    ) -> IngestOutcome {
        match message {
            DeviceMessage::RecordingStarted {
                session,
                target_app,
            } => {
                self.begin_session(session, target_app.clone());
                IngestOutcome::SessionStarted(session.clone())
            }
            DeviceMessage::RecordingStopped {} => {
                self.end_session();
                IngestOutcome::SessionStopped
            }
            DeviceMessage::EventCaptured {
                event,
                node_suggestion,
            } => self.ingest(store, event, node_suggestion.as_ref(), config),
        }
    }

    /// Runs one captured event through the pipeline.
    pub fn ingest(
        &mut self,
        store: &mut GraphStore,
        event: &InteractionEvent,
        suggestion: Option<&NodeSuggestion>,
        config: &EditorConfig,
    ) -> IngestOutcome {
        if self.session.is_none() {
            debug!(event_type = ?event.event_type, "Ignoring event outside of a recording session");
            return IngestOutcome::Ignored(IgnoreReason::NotRecording);
        }

        if let Some(sequence_number) = event.sequence_number {
            if self.last_sequence.is_some_and(|last| sequence_number <= last) {
                debug!(sequence_number, "Dropping duplicate event");
                return IngestOutcome::Ignored(IgnoreReason::Duplicate { sequence_number });
            }
            self.last_sequence = Some(sequence_number);
        }

        let classification = self.classifier.classify(event.event_type.as_deref());
        let label = suggestion
            .and_then(|s| s.label.clone())
            .filter(|l| !l.trim().is_empty())
            .unwrap_or_else(|| synthesize_label(event, &classification, config.label_max_chars));

        if classification.class == TEXT_INPUT_CLASS {
            if let Some(outcome) = self.coalesce_text(store, event, &label) {
                self.tracker.clear();
                return outcome;
            }
        }

        if self.classifier.is_excluded(&classification.class) {
            self.tracker.clear();
        } else if let Some(outcome) = self.track_repetition(store, event, &classification, config)
        {
            return outcome;
        }

        self.append_action(store, event, &classification, label, suggestion, config)
    }

    /// Updates the tail `text_input` node in place when the event targets the same field.
    /// Returns `None` when the event should go on to become a node of its own.
    fn coalesce_text(
        &mut self,
        store: &mut GraphStore,
        event: &InteractionEvent,
        label: &str,
    ) -> Option<IngestOutcome> {
        let tail = store.last_node()?;
        if tail.kind != NodeKind::TextInput {
            return None;
        }
        let action = tail.as_action()?;
        let same_field = match (&event.resource_id, &action.resource_id) {
            (Some(a), Some(b)) => a == b,
            (None, None) => event.coordinates() == action.coordinates,
            _ => false,
        };
        if !same_field {
            return None;
        }

        let new_text = event.text.clone().unwrap_or_default();
        let stored_len = action.text.as_deref().map_or(0, |t| t.chars().count());
        if new_text.chars().count() < stored_len {
            debug!(node_id = %tail.id, "Dropping shorter text flush");
            return Some(IngestOutcome::Ignored(IgnoreReason::ShorterText));
        }

        let tail_id = tail.id.clone();
        store.update_node(&tail_id, |node| {
            node.data.set_label(label);
            if let Some(action) = node.as_action_mut() {
                action.text = Some(new_text.clone());
                action.sequence_number = event.sequence_number.or(action.sequence_number);
            }
        });
        if let Some(entry) = self.feed.find_mut(&tail_id) {
            entry.text = Some(new_text);
            entry.label = label.to_string();
        }
        Some(IngestOutcome::Coalesced(tail_id))
    }

    /// Feeds a loop-eligible event to the tracker and resolves runs that reached the threshold.
    fn track_repetition(
        &mut self,
        store: &mut GraphStore,
        event: &InteractionEvent,
        classification: &Classification,
        config: &EditorConfig,
    ) -> Option<IngestOutcome> {
        // The run directly continues an auto-generated loop at the tail.
        if let Some(loop_id) = self.tail_auto_loop(store, &classification.class) {
            self.tracker.clear();
            return Some(self.merge_run(store, &loop_id, 1, Vec::new()));
        }

        let rules = MatchRules {
            position_tolerance: config.position_tolerance,
            element_targeted: self.classifier.is_element_targeted(&classification.class),
        };
        let run_length = self.tracker.observe(
            TrackedAction {
                node_id: None,
                class: classification.class.clone(),
                coordinates: event.coordinates(),
                identifier: event.identifier(),
            },
            rules,
        );
        if run_length < config.loop_threshold {
            return None;
        }

        let incoming = u32::try_from(run_length).unwrap_or(u32::MAX);
        let outcome = match self.find_auto_loop(store, &classification.class) {
            Some(loop_id) => {
                let absorbed = self.tracker.node_ids();
                self.merge_run(store, &loop_id, incoming, absorbed)
            }
            None => self.synthesize_loop(store, event, classification, incoming, config),
        };
        Some(outcome)
    }

    /// Class of the action an auto-generated loop repeats, judged by its first sub-flow action.
    fn auto_loop_class(&self, node: &Node) -> Option<String> {
        node.as_loop()
            .filter(|l| l.is_auto_generated)
            .and_then(LoopData::representative_action)
            .map(|action| self.classifier.class_of_node(action))
    }

    /// The tail node when it is an auto-generated loop of `class` from this session. Loops left
    /// by earlier sessions are only reached through a full run.
    fn tail_auto_loop(&self, store: &GraphStore, class: &str) -> Option<NodeId> {
        store
            .last_node()
            .filter(|n| self.session_loops.contains(&n.id))
            .filter(|n| self.auto_loop_class(n).as_deref() == Some(class))
            .map(|n| n.id.clone())
    }

    fn find_auto_loop(&self, store: &GraphStore, class: &str) -> Option<NodeId> {
        store
            .nodes()
            .iter()
            .rev()
            .find(|n| self.auto_loop_class(n).as_deref() == Some(class))
            .map(|n| n.id.clone())
    }

    fn merge_run(
        &mut self,
        store: &mut GraphStore,
        loop_id: &str,
        incoming: u32,
        absorbed: Vec<NodeId>,
    ) -> IngestOutcome {
        let redundant = mutation::merge_into_existing_loop(store, loop_id, incoming, &absorbed);
        if !redundant.is_empty() {
            mutation::reconnect_around(store, &redundant, None);
        }
        let redundant_set: AHashSet<NodeId> = redundant.iter().cloned().collect();
        self.feed.remove_nodes(&redundant_set);
        self.recorded_count = self.recorded_count.saturating_sub(redundant.len());
        self.tracker.clear();
        self.session_loops.insert(loop_id.to_string());

        let iterations = store
            .node(loop_id)
            .and_then(Node::as_loop)
            .map_or(0, |l| l.iterations);
        info!(loop_id, iterations, absorbed = redundant.len(), "Merged repeated actions into loop");
        IngestOutcome::LoopMerged {
            loop_id: loop_id.to_string(),
            iterations,
            removed: redundant,
        }
    }

    fn synthesize_loop(
        &mut self,
        store: &mut GraphStore,
        event: &InteractionEvent,
        classification: &Classification,
        iterations: u32,
        config: &EditorConfig,
    ) -> IngestOutcome {
        let tracked: Vec<Node> = self
            .tracker
            .node_ids()
            .iter()
            .filter_map(|id| store.node(id).cloned())
            .collect();
        let tracked_ids: Vec<NodeId> = tracked.iter().map(|n| n.id.clone()).collect();

        let position = tracked
            .first()
            .map_or_else(|| next_position(store, config), |n| n.position);
        // The copy inside the sub-flow gets its own id; ids stay unique across nesting levels.
        let representative_id = store.next_node_id();
        let representative = match tracked.first() {
            Some(first) => Node {
                id: representative_id,
                ..first.clone()
            },
            None => {
                let label = synthesize_label(event, classification, config.label_max_chars);
                action_node(representative_id, event, classification, label, None, position)
            }
        };
        let action_label = representative.display_label();
        let event_type = representative
            .as_action()
            .and_then(|a| a.event_type.clone())
            .unwrap_or_else(|| representative.kind.as_str().to_string());

        let sub_flow = mutation::build_loop_sub_flow(store.ids_mut(), vec![representative], config);
        let loop_id = store.next_node_id();
        let loop_label = auto_loop_label(&action_label, iterations);
        let loop_node = Node::looping(
            loop_id.clone(),
            position,
            LoopData {
                label: Some(loop_label.clone()),
                iterations,
                sub_flow,
                is_auto_generated: true,
                original_action_count: Some(iterations),
                ..LoopData::default()
            },
        );

        if tracked_ids.is_empty() {
            let after = store.last_node().map(|n| n.id.clone());
            mutation::insert_node(store, loop_node, after.as_deref());
        } else {
            mutation::insert_node(store, loop_node, None);
            mutation::reconnect_around(store, &tracked_ids, Some(&loop_id));
        }

        let tracked_set: AHashSet<NodeId> = tracked_ids.iter().cloned().collect();
        self.feed.remove_nodes(&tracked_set);
        self.recorded_count = self.recorded_count.saturating_sub(tracked_ids.len()) + 1;
        self.feed.push(RecordedAction {
            node_id: loop_id.clone(),
            event_type,
            label: loop_label,
            resource_id: None,
            text: None,
            coordinates: None,
            bounds: None,
            package_name: None,
            class_name: None,
            timestamp: Utc::now(),
            screenshot_url: None,
        });
        self.tracker.clear();
        self.session_loops.insert(loop_id.clone());

        info!(loop_id = %loop_id, iterations, "Synthesized loop from repeated actions");
        IngestOutcome::LoopSynthesized {
            loop_id,
            iterations,
            removed: tracked_ids,
        }
    }

    fn append_action(
        &mut self,
        store: &mut GraphStore,
        event: &InteractionEvent,
        classification: &Classification,
        label: String,
        suggestion: Option<&NodeSuggestion>,
        config: &EditorConfig,
    ) -> IngestOutcome {
        let previous = store.last_node().map(|n| n.id.clone());
        let position = next_position(store, config);
        let id = store.next_node_id();
        let node = action_node(id, event, classification, label.clone(), suggestion, position);

        let Some(id) = mutation::insert_node(store, node, previous.as_deref()) else {
            return IngestOutcome::Ignored(IgnoreReason::Rejected);
        };
        self.tracker.attach_node(id.clone());
        self.recorded_count += 1;
        self.feed.push(recorded_action(&id, event, label));
        debug!(node_id = %id, kind = %classification.kind, "Appended recorded action");
        IngestOutcome::Appended(id)
    }

    /// Removes the newest recorded action from the feed and its node from the graph.
    pub fn undo_last_recorded_action(&mut self, store: &mut GraphStore) -> Option<RecordedAction> {
        let action = self.feed.pop()?;
        let ids: AHashSet<NodeId> = [action.node_id.clone()].into_iter().collect();
        if store.contains_node(&action.node_id) {
            mutation::reconnect_around(store, std::slice::from_ref(&action.node_id), None);
        }
        self.tracker.reset_if_touching(&ids);
        self.recorded_count = self.recorded_count.saturating_sub(1);
        debug!(node_id = %action.node_id, "Undid last recorded action");
        Some(action)
    }

    /// Drops tracker and feed references to nodes that left the graph.
    pub fn forget_nodes(&mut self, ids: &AHashSet<NodeId>) {
        self.tracker.reset_if_touching(ids);
        let dropped = self.feed.remove_nodes(ids);
        self.recorded_count = self.recorded_count.saturating_sub(dropped);
    }

    /// Forgets the current run of repeated actions, e.g. after the graph was replaced wholesale.
    pub fn reset_tracking(&mut self) {
        self.tracker.clear();
    }
}

/// Position directly below the tail node, or the first slot of an empty graph.
fn next_position(store: &GraphStore, config: &EditorConfig) -> Position {
    let y = store
        .last_node()
        .map_or(config.first_node_y, |n| n.position.y + config.vertical_step());
    Position::new(config.node_x, y)
}

fn action_node(
    id: NodeId,
    event: &InteractionEvent,
    classification: &Classification,
    label: String,
    suggestion: Option<&NodeSuggestion>,
    position: Position,
) -> Node {
    Node::action(
        id,
        classification.kind,
        position,
        ActionData {
            label: Some(label),
            event_type: event.event_type.clone(),
            resource_id: event.resource_id.clone(),
            text: event.text.clone(),
            coordinates: event.coordinates(),
            bounds: event.bounds,
            package_name: event.package_name.clone(),
            class_name: event.class_name.clone(),
            content_description: event.content_description.clone(),
            is_recorded: true,
            sequence_number: event.sequence_number,
            color: suggestion.and_then(|s| s.color.clone()),
        },
    )
}

fn recorded_action(node_id: &str, event: &InteractionEvent, label: String) -> RecordedAction {
    let screenshot_url = event.action_data.as_ref().and_then(|data| {
        ["screenshotUrl", "screenshot_url"]
            .iter()
            .find_map(|key| data.get(*key)?.as_str().map(str::to_string))
    });
    RecordedAction {
        node_id: node_id.to_string(),
        event_type: event
            .event_type
            .clone()
            .unwrap_or_else(|| UNKNOWN_CLASS.to_string()),
        label,
        resource_id: event.resource_id.clone(),
        text: event.text.clone(),
        coordinates: event.coordinates(),
        bounds: event.bounds,
        package_name: event.package_name.clone(),
        class_name: event.class_name.clone(),
        timestamp: Utc::now(),
        screenshot_url,
    }
}
