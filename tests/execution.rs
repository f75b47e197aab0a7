mod common;

use common::*;
use kiroku::config::EditorConfig;
use kiroku::execution::{LogLevel, ProgressOutcome, edge_status, execution_plan};
use kiroku::mutation::wrap_in_loop;
use kiroku::prelude::*;

const FLOW: &str = "flow-1";

fn progress(action_id: &str, status: ProgressStatus) -> ProgressEvent {
    ProgressEvent {
        flow_id: FLOW.to_string(),
        action_id: action_id.to_string(),
        status,
        message: None,
    }
}

fn running_machine(workflow: &Workflow) -> ExecutionMachine {
    let mut machine = ExecutionMachine::new(FLOW);
    assert!(machine.start(workflow));
    machine
}

#[test]
fn test_start_marks_executable_nodes_pending() {
    let mut workflow = linear_workflow(&["a", "b"]);
    workflow
        .nodes
        .push(Node::new("src", NodeKind::DataSource, Position::default()));
    let machine = running_machine(&workflow);

    assert_eq!(machine.state(), RunState::Running);
    assert_eq!(machine.node_status("a"), NodeStatus::Pending);
    assert_eq!(machine.node_status("b"), NodeStatus::Pending);
    assert_eq!(machine.node_status("src"), NodeStatus::Idle);
    assert_eq!(machine.log().len(), 1);
}

#[test]
fn test_start_requires_nodes_and_idle_state() {
    let mut machine = ExecutionMachine::new(FLOW);
    assert!(!machine.start(&Workflow::default()));
    assert_eq!(machine.state(), RunState::Idle);

    let workflow = linear_workflow(&["a"]);
    assert!(machine.start(&workflow));
    assert!(!machine.start(&workflow));
}

#[test]
fn test_only_one_node_runs_at_a_time() {
    let workflow = linear_workflow(&["a", "b", "c"]);
    let mut machine = running_machine(&workflow);

    machine.apply_progress(&progress("a", ProgressStatus::Running));
    machine.apply_progress(&progress("b", ProgressStatus::Running));

    assert_eq!(machine.node_status("a"), NodeStatus::Pending);
    assert_eq!(machine.node_status("b"), NodeStatus::Running);
    assert_eq!(machine.active_node(), Some("b"));
}

#[test]
fn test_edge_status_follows_progress() {
    let workflow = linear_workflow(&["a", "b", "c"]);
    let mut machine = running_machine(&workflow);
    let view = machine.annotate(&workflow);
    assert_eq!(view.edge("a-b"), NodeStatus::Pending);

    machine.apply_progress(&progress("a", ProgressStatus::Running));
    machine.apply_progress(&progress("a", ProgressStatus::Success));
    machine.apply_progress(&progress("b", ProgressStatus::Running));

    let view = machine.annotate(&workflow);
    assert_eq!(view.node("a"), NodeStatus::Success);
    assert_eq!(view.edge("a-b"), NodeStatus::Running);
    assert_eq!(view.edge("b-c"), NodeStatus::Pending);
    assert_eq!(view.run_state, RunState::Running);
}

#[test]
fn test_pause_resume_and_stop() {
    let workflow = linear_workflow(&["a", "b"]);
    let mut machine = ExecutionMachine::new(FLOW);
    assert!(!machine.pause());
    assert!(!machine.resume());
    assert!(!machine.stop());

    machine.start(&workflow);
    assert!(!machine.resume());
    assert!(machine.pause());
    assert_eq!(machine.state(), RunState::Paused);

    let outcome = machine.apply_progress(&progress("a", ProgressStatus::Running));
    assert_eq!(outcome, ProgressOutcome::Deferred);
    assert_eq!(machine.node_status("a"), NodeStatus::Pending);

    assert!(machine.resume());
    assert_eq!(machine.node_status("a"), NodeStatus::Running);
    assert!(machine.pause());
    machine.apply_progress(&progress("a", ProgressStatus::Success));
    assert!(machine.stop());
    assert_eq!(machine.deferred_len(), 0);
    assert_eq!(machine.state(), RunState::Idle);
    assert!(machine.statuses().is_empty());
    assert_eq!(machine.node_status("a"), NodeStatus::Idle);
}

#[test]
fn test_progress_during_pause_is_applied_on_resume() {
    let workflow = linear_workflow(&["a", "b"]);
    let mut machine = running_machine(&workflow);
    machine.apply_progress(&progress("a", ProgressStatus::Running));
    assert!(machine.pause());

    for event in [
        progress("a", ProgressStatus::Success),
        progress("b", ProgressStatus::Running),
        progress("b", ProgressStatus::Success),
    ] {
        assert_eq!(machine.apply_progress(&event), ProgressOutcome::Deferred);
    }
    assert_eq!(machine.deferred_len(), 3);
    assert_eq!(machine.state(), RunState::Paused);
    assert_eq!(machine.node_status("b"), NodeStatus::Pending);

    assert!(machine.resume());
    assert_eq!(machine.state(), RunState::Completed);
    assert_eq!(machine.node_status("a"), NodeStatus::Success);
    assert_eq!(machine.node_status("b"), NodeStatus::Success);
    assert_eq!(machine.deferred_len(), 0);
}

#[test]
fn test_failure_during_pause_fails_run_on_resume() {
    let workflow = linear_workflow(&["a", "b"]);
    let mut machine = running_machine(&workflow);
    assert!(machine.pause());
    machine.apply_progress(&progress("a", ProgressStatus::Error));
    machine.apply_progress(&progress("b", ProgressStatus::Success));
    // Unknown nodes are not held.
    assert_eq!(
        machine.apply_progress(&progress("ghost", ProgressStatus::Running)),
        ProgressOutcome::NotRunning
    );

    assert!(machine.resume());
    assert_eq!(machine.state(), RunState::Error);
    assert_eq!(machine.node_status("b"), NodeStatus::Pending);
    assert_eq!(machine.deferred_len(), 0);
}

#[test]
fn test_reset_only_after_run_finished() {
    let workflow = linear_workflow(&["a"]);
    let mut machine = ExecutionMachine::new(FLOW);
    assert!(!machine.reset());

    machine.start(&workflow);
    assert!(!machine.reset());

    machine.apply_progress(&progress("a", ProgressStatus::Running));
    machine.apply_progress(&progress("a", ProgressStatus::Success));
    assert_eq!(machine.state(), RunState::Completed);
    assert!(machine.reset());
    assert_eq!(machine.state(), RunState::Idle);
    assert!(machine.start(&workflow));
}

#[test]
fn test_skipped_shows_as_error_but_run_continues() {
    let workflow = linear_workflow(&["a", "b"]);
    let mut machine = running_machine(&workflow);

    let outcome = machine.apply_progress(&progress("a", ProgressStatus::Skipped));
    assert!(matches!(outcome, ProgressOutcome::Applied { run_state: RunState::Running, .. }));
    assert_eq!(machine.node_status("a"), NodeStatus::Error);
    assert_eq!(machine.log().last().map(|e| e.level), Some(LogLevel::Warning));

    machine.apply_progress(&progress("b", ProgressStatus::Success));
    assert_eq!(machine.state(), RunState::Completed);
}

#[test]
fn test_error_fails_the_run() {
    let workflow = linear_workflow(&["a", "b"]);
    let mut machine = running_machine(&workflow);

    let mut event = progress("a", ProgressStatus::Error);
    event.message = Some("Element not found".to_string());
    let outcome = machine.apply_progress(&event);

    assert!(matches!(outcome, ProgressOutcome::Applied { run_state: RunState::Error, .. }));
    assert_eq!(machine.state(), RunState::Error);
    let execution = machine.node_execution("a").unwrap();
    assert_eq!(execution.status, NodeStatus::Error);
    assert_eq!(execution.message.as_deref(), Some("Element not found"));
    assert_eq!(machine.log().last().map(|e| e.message.as_str()), Some("Element not found"));

    // Late events after the failure are ignored.
    let late = machine.apply_progress(&progress("b", ProgressStatus::Success));
    assert_eq!(late, ProgressOutcome::NotRunning);
}

#[test]
fn test_foreign_and_unknown_events_are_ignored() {
    let workflow = linear_workflow(&["a"]);
    let mut machine = running_machine(&workflow);

    let mut foreign = progress("a", ProgressStatus::Success);
    foreign.flow_id = "other".to_string();
    assert_eq!(machine.apply_progress(&foreign), ProgressOutcome::ForeignFlow);
    assert_eq!(
        machine.apply_progress(&progress("ghost", ProgressStatus::Running)),
        ProgressOutcome::UnknownNode
    );
    assert_eq!(machine.node_status("a"), NodeStatus::Pending);
    assert_eq!(machine.log().len(), 1);
}

#[test]
fn test_log_ordinals_follow_receipt_order() {
    let workflow = linear_workflow(&["a", "b"]);
    let mut machine = running_machine(&workflow);

    let first = machine.apply_progress(&progress("a", ProgressStatus::Running));
    let second = machine.apply_progress(&progress("a", ProgressStatus::Success));
    assert_eq!(first, ProgressOutcome::Applied { ordinal: 2, run_state: RunState::Running });
    assert_eq!(second, ProgressOutcome::Applied { ordinal: 3, run_state: RunState::Running });
    assert_eq!(machine.log().entries()[2].node_id.as_deref(), Some("a"));
}

#[test]
fn test_simulated_run_completes_with_loops() {
    let config = EditorConfig::default();
    let mut store = store_of(&["a", "b", "c"]);
    let loop_id = wrap_in_loop(&mut store, &["b".to_string()], &config).unwrap();
    store.update_node(&loop_id, |n| {
        if let Some(l) = n.as_loop_mut() {
            l.iterations = 3;
        }
    });
    let workflow = store.workflow().clone();

    let simulator = Simulator::new(FLOW, &workflow);
    assert_eq!(simulator.action_count(), 5);

    let mut machine = running_machine(&workflow);
    let mut states = Vec::new();
    for event in simulator {
        if let ProgressOutcome::Applied { run_state, .. } = machine.apply_progress(&event) {
            states.push(run_state);
        }
    }
    assert_eq!(states.last(), Some(&RunState::Completed));
    assert_eq!(states.iter().filter(|s| **s == RunState::Completed).count(), 1);
    assert_eq!(machine.node_status("b"), NodeStatus::Success);
    assert_eq!(machine.node_status(&loop_id), NodeStatus::Success);
    assert_eq!(machine.log().last().map(|e| e.level), Some(LogLevel::Success));
}

#[test]
fn test_simulated_failure_stops_run() {
    let workflow = linear_workflow(&["a", "b", "c"]);
    let mut machine = running_machine(&workflow);
    for event in Simulator::new(FLOW, &workflow).fail_on("b") {
        machine.apply_progress(&event);
    }
    assert_eq!(machine.state(), RunState::Error);
    assert_eq!(machine.node_status("a"), NodeStatus::Success);
    assert_eq!(machine.node_status("b"), NodeStatus::Error);
    assert_eq!(machine.node_status("c"), NodeStatus::Pending);
}

#[test]
fn test_annotate_covers_nested_nodes() {
    let config = EditorConfig::default();
    let mut store = store_of(&["a", "b"]);
    let loop_id = wrap_in_loop(&mut store, &["a".to_string(), "b".to_string()], &config).unwrap();
    let workflow = store.workflow().clone();
    let machine = running_machine(&workflow);

    let view = machine.annotate(&workflow);
    assert_eq!(view.node(&loop_id), NodeStatus::Pending);
    assert_eq!(view.node("a"), NodeStatus::Pending);
    // Loop markers are not executed.
    let markers = &workflow.node(&loop_id).and_then(Node::as_loop).unwrap().sub_flow.nodes;
    assert_eq!(view.node(&markers[0].id), NodeStatus::Idle);
    assert_eq!(view.nodes.len(), 5);
    assert_eq!(view.edges.len(), 3);
}

#[test]
fn test_plan_starts_at_entry_nodes() {
    let mut workflow = linear_workflow(&["a", "b", "c"]);
    workflow.nodes.reverse();
    let ids: Vec<&str> = execution_plan(&workflow).iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
}

#[test]
fn test_progress_message_wire_format() {
    let json = r#"{ "type": "workflow.action.progress", "flow_id": "flow-1", "action_id": "node_3", "status": "skipped" }"#;
    let ProgressMessage::ActionProgress(event) = serde_json::from_str::<ProgressMessage>(json).unwrap();
    assert_eq!(event.action_id, "node_3");
    assert_eq!(event.status, ProgressStatus::Skipped);
    assert_eq!(event.status.node_status(), NodeStatus::Error);
}

#[test]
fn test_plan_follows_control_edges_not_list_order() {
    let workflow = Workflow {
        nodes: vec![
            Node::new("b", NodeKind::Click, Position::default()),
            Node::new("src", NodeKind::DataSource, Position::default()),
            Node::new("a", NodeKind::Click, Position::default()),
        ],
        edges: vec![Edge::control("e1", "a", "b", None), Edge::data_wire("e2", "src", "a")],
        ..Workflow::default()
    };
    let ids: Vec<&str> = execution_plan(&workflow).iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, vec!["src", "a", "b"]);
}

#[test]
fn test_simulator_halts_after_first_failure() {
    let workflow = linear_workflow(&["a", "b"]);
    let events: Vec<ProgressEvent> = Simulator::new(FLOW, &workflow).fail_on("a").collect();
    assert_eq!(events.len(), 2);
    assert_eq!(events[1].status, ProgressStatus::Error);
}

#[test]
fn test_simulator_streams_huge_loops_lazily() {
    let config = EditorConfig::default();
    let mut store = store_of(&["a", "b", "c"]);
    let loop_id = wrap_in_loop(&mut store, &["b".to_string()], &config).unwrap();
    store.update_node(&loop_id, |n| {
        if let Some(l) = n.as_loop_mut() {
            l.iterations = 1_000_000_000;
        }
    });

    let simulator = Simulator::new(FLOW, store.workflow());
    assert_eq!(simulator.action_count(), 1_000_000_002);

    let head: Vec<(String, ProgressStatus)> = simulator
        .take(7)
        .map(|e| (e.action_id, e.status))
        .collect();
    assert_eq!(
        head,
        vec![
            ("a".to_string(), ProgressStatus::Running),
            ("a".to_string(), ProgressStatus::Success),
            (loop_id.clone(), ProgressStatus::Running),
            ("b".to_string(), ProgressStatus::Running),
            ("b".to_string(), ProgressStatus::Success),
            ("b".to_string(), ProgressStatus::Running),
            ("b".to_string(), ProgressStatus::Success),
        ]
    );
}

#[test]
fn test_simulator_skips_body_of_zero_iteration_loop() {
    let config = EditorConfig::default();
    let mut store = store_of(&["a", "b"]);
    let loop_id = wrap_in_loop(&mut store, &["b".to_string()], &config).unwrap();
    store.update_node(&loop_id, |n| {
        if let Some(l) = n.as_loop_mut() {
            l.iterations = 0;
        }
    });

    let simulator = Simulator::new(FLOW, store.workflow());
    assert_eq!(simulator.action_count(), 1);
    let ids: Vec<String> = simulator.map(|e| e.action_id).collect();
    assert_eq!(ids, vec!["a", "a", loop_id.as_str(), loop_id.as_str()]);
}

#[test]
fn test_edge_status_follows_endpoints() {
    use NodeStatus::*;
    assert_eq!(edge_status(Success, Running), Running);
    assert_eq!(edge_status(Success, Success), Success);
    assert_eq!(edge_status(Success, Error), Error);
    assert_eq!(edge_status(Pending, Idle), Pending);
    assert_eq!(edge_status(Success, Pending), Pending);
    assert_eq!(edge_status(Running, Pending), Pending);
    assert_eq!(edge_status(Running, Success), Idle);
    assert_eq!(edge_status(Idle, Idle), Idle);
}
