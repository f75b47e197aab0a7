//! Invariant-preserving structural operations on a [`GraphStore`].
//!
//! Manual editing and recording both go through these functions, so after any of them every
//! edge still resolves to an existing node and node ids stay unique. Requests that cannot apply
//! (unknown ids, empty selections) leave the graph untouched and report that through the
//! return value instead of an error.
use crate::graph::{COMPLETE_HANDLE, Edge, EdgeId, GraphStore, Node, NodeId};
use ahash::AHashSet;
use itertools::Itertools;
use tracing::debug;

mod loops;

pub use loops::{build_loop_sub_flow, order_by_position, wrap_in_loop};

/// The predecessors and successors found around a removed run of nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconnection {
    pub predecessors: Vec<NodeId>,
    pub successors: Vec<NodeId>,
}

/// The source handle an edge leaving `node` should use: `complete` for loops, default otherwise.
pub fn completion_handle(node: &Node) -> Option<String> {
    node.is_loop().then(|| COMPLETE_HANDLE.to_string())
}

/// Label of an auto-generated loop repeating `action_label`.
pub fn auto_loop_label(action_label: &str, iterations: u32) -> String {
    format!("Repeat: {} ({}x)", action_label, iterations)
}

/// Appends `node`, connecting it from `after` when that node exists.
///
/// Returns `None` without changing the graph when the node id is already taken.
pub fn insert_node(store: &mut GraphStore, node: Node, after: Option<&str>) -> Option<NodeId> {
    let link = after
        .and_then(|id| store.node(id))
        .map(|prev| (prev.id.clone(), completion_handle(prev)));

    let id = node.id.clone();
    if !store.add_node(node) {
        debug!(node_id = %id, "Rejected insert of duplicate node id");
        return None;
    }
    if let Some((source, handle)) = link {
        let edge_id = store.next_edge_id();
        store.add_edge(Edge::control(edge_id, source, id.clone(), handle));
    }
    Some(id)
}

/// Adds a manual edge between two existing nodes.
pub fn connect(
    store: &mut GraphStore,
    source: &str,
    target: &str,
    source_handle: Option<String>,
    target_handle: Option<String>,
) -> Option<EdgeId> {
    if source == target || !store.contains_node(source) || !store.contains_node(target) {
        return None;
    }
    let mut edge = Edge::control(store.next_edge_id(), source, target, source_handle);
    edge.target_handle = target_handle;
    let id = edge.id.clone();
    store.add_edge(edge).then_some(id)
}

/// Removes the nodes and every edge whose source or target is among them.
pub fn delete_nodes(store: &mut GraphStore, ids: &AHashSet<NodeId>) -> Vec<Node> {
    let removed = store.remove_nodes(ids);
    if !removed.is_empty() {
        debug!(count = removed.len(), "Deleted nodes");
    }
    removed
}

pub fn delete_edges(store: &mut GraphStore, ids: &AHashSet<EdgeId>) -> usize {
    store.remove_edges(ids)
}

/// Removes a contiguous run of nodes and re-links the control flow around it.
///
/// Without a `replacement`, each predecessor is linked to each successor. With one, the run is
/// spliced out in favour of the replacement: predecessors point at it and it points at the
/// successors. An edge leaving a loop node always uses the `complete` handle; other edges keep
/// the handle they had. Data wires into or out of the run are dropped, never rewired.
pub fn reconnect_around(
    store: &mut GraphStore,
    removed: &[NodeId],
    replacement: Option<&str>,
) -> Reconnection {
    let removed_set: AHashSet<NodeId> = removed.iter().cloned().collect();

    let mut predecessor_handles: Vec<(NodeId, Option<String>)> = Vec::new();
    let mut successors: Vec<NodeId> = Vec::new();
    for edge in store.edges().iter().filter(|e| !e.is_data_wire()) {
        let from_inside = removed_set.contains(&edge.source);
        let to_inside = removed_set.contains(&edge.target);
        if to_inside && !from_inside {
            let handle = match store.node(&edge.source) {
                Some(pred) if pred.is_loop() => completion_handle(pred),
                _ => edge.source_handle.clone(),
            };
            predecessor_handles.push((edge.source.clone(), handle));
        } else if from_inside && !to_inside {
            successors.push(edge.target.clone());
        }
    }
    let predecessor_handles: Vec<_> = predecessor_handles
        .into_iter()
        .unique_by(|(id, _)| id.clone())
        .collect();
    let successors: Vec<NodeId> = successors.into_iter().unique().collect();

    store.remove_nodes(&removed_set);

    let replacement = replacement.filter(|id| store.contains_node(id));
    match replacement {
        Some(rep) => {
            let rep_handle = store.node(rep).and_then(completion_handle);
            for (pred, handle) in &predecessor_handles {
                let id = store.next_edge_id();
                store.add_edge(Edge::control(id, pred.clone(), rep, handle.clone()));
            }
            for succ in &successors {
                let id = store.next_edge_id();
                store.add_edge(Edge::control(id, rep, succ.clone(), rep_handle.clone()));
            }
        }
        None => {
            for ((pred, handle), succ) in predecessor_handles.iter().cartesian_product(&successors) {
                if pred == succ {
                    continue;
                }
                let id = store.next_edge_id();
                store.add_edge(Edge::control(id, pred.clone(), succ.clone(), handle.clone()));
            }
        }
    }

    Reconnection {
        predecessors: predecessor_handles.into_iter().map(|(id, _)| id).collect(),
        successors,
    }
}

/// Grows an existing loop by `incoming_count` iterations and refreshes its label.
///
/// Returns the ids from `absorbed` that are still present in the graph: they are now
/// represented by the loop and should be deleted by the caller. Returns nothing when
/// `existing_loop_id` is not a loop node.
pub fn merge_into_existing_loop(
    store: &mut GraphStore,
    existing_loop_id: &str,
    incoming_count: u32,
    absorbed: &[NodeId],
) -> Vec<NodeId> {
    let updated = store.update_node(existing_loop_id, |node| {
        let loop_data = node.as_loop_mut()?;
        loop_data.iterations = loop_data.iterations.saturating_add(incoming_count);
        loop_data.original_action_count = Some(
            loop_data
                .original_action_count
                .unwrap_or(0)
                .saturating_add(incoming_count),
        );
        let action_label = loop_data
            .representative_action()
            .map(Node::display_label)
            .unwrap_or_else(|| "actions".to_string());
        loop_data.label = Some(auto_loop_label(&action_label, loop_data.iterations));
        Some(loop_data.iterations)
    });

    match updated.flatten() {
        Some(iterations) => {
            debug!(loop_id = %existing_loop_id, iterations, "Merged actions into loop");
            absorbed
                .iter()
                .filter(|id| id.as_str() != existing_loop_id && store.contains_node(id))
                .cloned()
                .collect()
        }
        None => Vec::new(),
    }
}
