//! Common test utilities for building workflows, recorders and editors.
use ahash::AHashSet;
use kiroku::prelude::*;
use kiroku::recording::NodeSuggestion;

/// A store and a recorder with an active session, using the default configuration.
#[allow(dead_code)]
pub fn recording_setup() -> (GraphStore, Recorder, EditorConfig) {
    let config = EditorConfig::default();
    let mut recorder = Recorder::new(&config);
    recorder.begin_session("session_test", None);
    (GraphStore::new(), recorder, config)
}

/// Runs `events` through the recorder, numbering them from 1, and returns the outcomes.
#[allow(dead_code)]
pub fn ingest_all(
    store: &mut GraphStore,
    recorder: &mut Recorder,
    config: &EditorConfig,
    events: Vec<InteractionEvent>,
) -> Vec<IngestOutcome> {
    events
        .into_iter()
        .enumerate()
        .map(|(i, event)| {
            let event = event.with_sequence(i as u64 + 1);
            recorder.ingest(store, &event, None::<&NodeSuggestion>, config)
        })
        .collect()
}

#[allow(dead_code)]
pub fn scroll_down() -> InteractionEvent {
    InteractionEvent::new("scroll_down").with_position(540.0, 1200.0)
}

#[allow(dead_code)]
pub fn tap_at(x: f64, y: f64) -> InteractionEvent {
    InteractionEvent::new("click").with_position(x, y)
}

#[allow(dead_code)]
pub fn type_into(resource_id: &str, text: &str) -> InteractionEvent {
    InteractionEvent::new("text_input")
        .with_resource_id(resource_id)
        .with_text(text)
}

/// Click nodes `ids[0] -> ids[1] -> ...`, stacked vertically, chained by default-handle edges.
#[allow(dead_code)]
pub fn linear_workflow(ids: &[&str]) -> Workflow {
    let nodes = ids
        .iter()
        .enumerate()
        .map(|(i, id)| Node::new(*id, NodeKind::Click, Position::new(250.0, 100.0 + 120.0 * i as f64)))
        .collect();
    let edges = ids
        .windows(2)
        .map(|pair| Edge::control(format!("{}-{}", pair[0], pair[1]), pair[0], pair[1], None))
        .collect();
    Workflow {
        nodes,
        edges,
        ..Workflow::default()
    }
}

#[allow(dead_code)]
pub fn store_of(ids: &[&str]) -> GraphStore {
    GraphStore::from_workflow(linear_workflow(ids)).expect("linear workflow is valid")
}

#[allow(dead_code)]
pub fn id_set(ids: &[&str]) -> AHashSet<NodeId> {
    ids.iter().map(|id| id.to_string()).collect()
}

/// `(source, target, source_handle)` for every edge, for compact assertions.
#[allow(dead_code)]
pub fn edge_triples(workflow: &Workflow) -> Vec<(String, String, Option<String>)> {
    workflow
        .edges
        .iter()
        .map(|e| (e.source.clone(), e.target.clone(), e.source_handle.clone()))
        .collect()
}

/// Panics when an edge dangles or an id repeats anywhere in the workflow.
#[allow(dead_code)]
pub fn assert_structurally_valid(workflow: &Workflow) {
    if let Err(e) = workflow.validate() {
        panic!("workflow is not valid: {}", e);
    }
}

#[allow(dead_code)]
pub fn count_kind(workflow: &Workflow, kind: NodeKind) -> usize {
    workflow.nodes.iter().filter(|n| n.kind == kind).count()
}

/// An editor over an empty flow backed by shared in-memory persistence.
#[allow(dead_code)]
pub fn memory_editor(config: EditorConfig) -> (Editor, MemoryPersistence) {
    let library = MemoryPersistence::new();
    let editor = Editor::new("flow-1", config, Box::new(library.clone()));
    (editor, library)
}
