use super::completion_handle;
use crate::config::EditorConfig;
use crate::graph::{
    COMPLETE_HANDLE, Edge, GraphStore, LoopData, Node, NodeId, NodeIdGenerator, NodeKind,
    Position, Workflow,
};
use ahash::AHashSet;
use itertools::Itertools;
use tracing::debug;

/// Orders nodes top-to-bottom, then left-to-right.
///
/// Nodes whose `y` lies within `row_tolerance` of the first node of a row are treated as the
/// same row, so slightly misaligned nodes still read left-to-right.
pub fn order_by_position(nodes: Vec<Node>, row_tolerance: f64) -> Vec<Node> {
    let by_y: Vec<Node> = nodes
        .into_iter()
        .sorted_by(|a, b| a.position.y.total_cmp(&b.position.y))
        .collect();

    let mut rows: Vec<Vec<Node>> = Vec::new();
    for node in by_y {
        match rows.last_mut() {
            Some(row) if node.position.y - row[0].position.y <= row_tolerance => row.push(node),
            _ => rows.push(vec![node]),
        }
    }

    rows.into_iter()
        .flat_map(|row| {
            row.into_iter()
                .sorted_by(|a, b| a.position.x.total_cmp(&b.position.x))
        })
        .collect()
}

/// Builds the nested workflow `loopStart -> body... -> loopEnd`, laid out vertically.
pub fn build_loop_sub_flow(
    ids: &mut NodeIdGenerator,
    body: Vec<Node>,
    config: &EditorConfig,
) -> Workflow {
    let step = config.vertical_step();
    let x = config.node_x;
    let mut y = config.first_node_y;

    let mut nodes = Vec::with_capacity(body.len() + 2);
    let mut start = Node::new(ids.next_node_id(), NodeKind::LoopStart, Position::new(x, y));
    start.data.set_label("Loop start");
    nodes.push(start);
    for mut node in body {
        y += step;
        node.position = Position::new(x, y);
        nodes.push(node);
    }
    y += step;
    let mut end = Node::new(ids.next_node_id(), NodeKind::LoopEnd, Position::new(x, y));
    end.data.set_label("Loop end");
    nodes.push(end);

    let edges = nodes
        .iter()
        .tuple_windows()
        .map(|(from, to)| {
            Edge::control(ids.next_edge_id(), from.id.clone(), to.id.clone(), completion_handle(from))
        })
        .collect();

    Workflow {
        nodes,
        edges,
        ..Workflow::default()
    }
}

fn centroid(nodes: &[Node]) -> Position {
    let count = nodes.len().max(1) as f64;
    let (sum_x, sum_y) = nodes
        .iter()
        .fold((0.0, 0.0), |(x, y), n| (x + n.position.x, y + n.position.y));
    Position::new(sum_x / count, sum_y / count)
}

/// Replaces a set of nodes with a single loop node whose sub-flow runs them in order.
///
/// Edges entering the set are redirected to the loop; control edges leaving it now start at
/// the loop's `complete` handle. Edges between members are discarded, the sub-flow chains the
/// members itself. Returns the new loop id, or `None` when none of `node_ids` exist.
pub fn wrap_in_loop(
    store: &mut GraphStore,
    node_ids: &[NodeId],
    config: &EditorConfig,
) -> Option<NodeId> {
    let member_ids: AHashSet<NodeId> = node_ids
        .iter()
        .filter(|id| store.contains_node(id))
        .cloned()
        .collect();
    if member_ids.is_empty() {
        return None;
    }

    let members: Vec<Node> = store
        .nodes()
        .iter()
        .filter(|n| member_ids.contains(&n.id))
        .cloned()
        .collect();
    let position = centroid(&members);
    let ordered = order_by_position(members, config.row_tolerance);
    let count = ordered.len();

    let loop_id = store.next_node_id();
    let sub_flow = build_loop_sub_flow(store.ids_mut(), ordered, config);
    let loop_node = Node::looping(
        loop_id.clone(),
        position,
        LoopData {
            label: Some(format!("Loop ({} actions)", count)),
            iterations: config.default_loop_iterations,
            sub_flow,
            ..LoopData::default()
        },
    );

    store.apply(|wf| {
        let mut edges: Vec<Edge> = Vec::with_capacity(wf.edges.len());
        for mut edge in std::mem::take(&mut wf.edges) {
            let from_inside = member_ids.contains(&edge.source);
            let to_inside = member_ids.contains(&edge.target);
            match (from_inside, to_inside) {
                (true, true) => continue,
                (false, true) => edge.target = loop_id.clone(),
                (true, false) => {
                    edge.source = loop_id.clone();
                    if !edge.is_data_wire() {
                        edge.source_handle = Some(COMPLETE_HANDLE.to_string());
                    }
                }
                (false, false) => {}
            }
            if !edges.iter().any(|e| e.is_parallel_to(&edge)) {
                edges.push(edge);
            }
        }
        wf.edges = edges;
        wf.nodes.retain(|n| !member_ids.contains(&n.id));
        wf.nodes.push(loop_node);
    });

    debug!(loop_id = %loop_id, members = count, "Wrapped nodes in loop");
    Some(loop_id)
}
