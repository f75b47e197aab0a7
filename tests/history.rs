mod common;

use common::*;
use kiroku::config::EditorConfig;
use kiroku::history::History;
use kiroku::mutation::{delete_nodes, wrap_in_loop};

#[test]
fn test_undo_restores_previous_graph() {
    let mut store = store_of(&["a", "b", "c"]);
    let mut history = History::new(10);
    let before = store.snapshot();

    history.take_snapshot(&store);
    delete_nodes(&mut store, &id_set(&["b"]));
    assert_eq!(store.nodes().len(), 2);

    assert!(history.undo(&mut store));
    assert_eq!(store.snapshot(), before);
    assert!(history.can_redo());
    assert!(!history.can_undo());
}

#[test]
fn test_redo_reapplies_change() {
    let config = EditorConfig::default();
    let mut store = store_of(&["a", "b"]);
    let mut history = History::new(10);

    history.take_snapshot(&store);
    let loop_id = wrap_in_loop(&mut store, &["a".to_string(), "b".to_string()], &config).unwrap();
    let after = store.snapshot();

    assert!(history.undo(&mut store));
    assert!(!store.contains_node(&loop_id));
    assert!(history.redo(&mut store));
    assert_eq!(store.snapshot(), after);
    assert!(history.can_undo());
}

#[test]
fn test_undo_and_redo_on_empty_stacks_are_noops() {
    let mut store = store_of(&["a"]);
    let mut history = History::new(10);
    let revision = store.revision();

    assert!(!history.undo(&mut store));
    assert!(!history.redo(&mut store));
    assert_eq!(store.revision(), revision);
}

#[test]
fn test_new_snapshot_discards_redo() {
    let mut store = store_of(&["a", "b", "c"]);
    let mut history = History::new(10);

    history.take_snapshot(&store);
    delete_nodes(&mut store, &id_set(&["a"]));
    history.undo(&mut store);
    assert!(history.can_redo());

    history.take_snapshot(&store);
    delete_nodes(&mut store, &id_set(&["c"]));
    assert!(!history.can_redo());
}

#[test]
fn test_history_limit_drops_oldest_snapshots() {
    let mut store = store_of(&["a", "b", "c", "d"]);
    let mut history = History::new(2);

    for id in ["a", "b", "c"] {
        history.take_snapshot(&store);
        delete_nodes(&mut store, &id_set(&[id]));
    }

    assert!(history.undo(&mut store));
    assert!(history.undo(&mut store));
    assert!(!history.undo(&mut store));
    // The snapshot taken before deleting `a` was dropped.
    assert!(!store.contains_node("a"));
    assert!(store.contains_node("b"));
    assert!(store.contains_node("c"));
}
