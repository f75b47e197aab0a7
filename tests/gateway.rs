mod common;

use common::*;
use kiroku::gateway::TestRunReceipt;
use kiroku::prelude::*;

#[test]
fn test_json_file_persistence_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let mut persistence = JsonFilePersistence::new(dir.path().join("flows"));
    let workflow = linear_workflow(&["a", "b", "c"]);

    assert_eq!(persistence.load("checkout").unwrap(), None);
    persistence.save("checkout", &workflow).unwrap();
    assert!(dir.path().join("flows").join("checkout.json").exists());
    assert_eq!(persistence.load("checkout").unwrap(), Some(workflow));
}

#[test]
fn test_json_file_persistence_rejects_path_like_ids() {
    let dir = tempfile::tempdir().unwrap();
    let mut persistence = JsonFilePersistence::new(dir.path());
    for flow_id in ["../escape", "a/b", "", "with space"] {
        assert!(matches!(
            persistence.save(flow_id, &Workflow::default()),
            Err(GatewayError::Rejected(_))
        ));
    }
}

#[test]
fn test_json_file_persistence_reports_corrupt_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("broken.json"), "{ not json").unwrap();
    let persistence = JsonFilePersistence::new(dir.path());
    assert!(matches!(
        persistence.load("broken"),
        Err(GatewayError::Workflow(WorkflowError::JsonParseError(_)))
    ));
}

#[test]
fn test_memory_persistence_shares_storage_and_fails_on_demand() {
    let library = MemoryPersistence::new();
    let mut writer = library.clone();
    let workflow = linear_workflow(&["a"]);

    library.fail_next("disk full");
    assert_eq!(
        writer.save("f", &workflow),
        Err(GatewayError::Rejected("disk full".to_string()))
    );
    assert!(!library.contains("f"));

    writer.save("f", &workflow).unwrap();
    assert!(library.contains("f"));
    assert_eq!(library.save_count(), 1);
    assert_eq!(library.load("f").unwrap(), Some(workflow));
}

#[test]
fn test_hub_registration_is_idempotent() {
    let hub = ChannelHub::new();
    let _first = hub.register_listener("pixel", "flow-1");
    let _second = hub.register_listener("pixel", "flow-1");
    assert_eq!(hub.listener_count(), 1);

    assert!(hub.unregister_listener("pixel", "flow-1"));
    assert!(!hub.unregister_listener("pixel", "flow-1"));
    assert!(!hub.is_registered("pixel", "flow-1"));
}

#[test]
fn test_hub_routes_by_device() {
    let hub = ChannelHub::new();
    let mut pixel = hub.register_listener("pixel", "flow-1");
    let mut tablet = hub.register_listener("tablet", "flow-1");

    let delivered = hub.publish_device("pixel", DeviceMessage::captured(scroll_down()));
    assert_eq!(delivered, 1);
    assert!(pixel.try_next_device().is_some());
    assert!(tablet.try_next_device().is_none());
    assert!(pixel.try_next_device().is_none());
}

#[test]
fn test_hub_prunes_dropped_subscriptions() {
    let hub = ChannelHub::new();
    let subscription = hub.register_listener("pixel", "flow-1");
    drop(subscription);

    assert_eq!(hub.publish_device("pixel", DeviceMessage::RecordingStopped {}), 0);
    assert_eq!(hub.listener_count(), 0);
}

#[test]
fn test_subscription_receives_asynchronously() {
    let hub = ChannelHub::new();
    let mut subscription = hub.register_listener("pixel", "flow-1");
    let publisher = hub.clone();

    let event = ProgressEvent {
        flow_id: "flow-1".to_string(),
        action_id: "node_1".to_string(),
        status: ProgressStatus::Running,
        message: None,
    };
    publisher.publish_progress("pixel", ProgressMessage::ActionProgress(event.clone()));

    let received = tokio_test::block_on(subscription.next_progress());
    assert_eq!(received, Some(ProgressMessage::ActionProgress(event)));

    hub.unregister_listener("pixel", "flow-1");
    assert_eq!(tokio_test::block_on(subscription.next_device()), None);
}

#[test]
fn test_loopback_sessions_announce_on_hub() {
    let hub = ChannelHub::new();
    let mut subscription = hub.register_listener("pixel", "flow-1");
    let mut device = LoopbackDevice::new(hub.clone(), MemoryPersistence::new());

    let handle = device.start_recording("pixel", "flow-1").unwrap();
    assert_eq!(handle.session_id, "session_1");
    assert_eq!(device.active_sessions(), 1);
    assert_eq!(
        subscription.try_next_device(),
        Some(DeviceMessage::RecordingStarted {
            session: "session_1".to_string(),
            target_app: None,
        })
    );

    device.emit("pixel", scroll_down());
    device.emit("pixel", scroll_down());
    let sequences: Vec<Option<u64>> = std::iter::from_fn(|| subscription.try_next_device())
        .map(|message| match message {
            DeviceMessage::EventCaptured { event, .. } => event.sequence_number,
            _ => None,
        })
        .collect();
    assert_eq!(sequences, vec![Some(1), Some(2)]);

    device.stop_recording(&handle.session_id).unwrap();
    assert_eq!(subscription.try_next_device(), Some(DeviceMessage::RecordingStopped {}));
    assert_eq!(
        device.stop_recording(&handle.session_id),
        Err(GatewayError::UnknownSession("session_1".to_string()))
    );
}

#[test]
fn test_loopback_test_run_replays_saved_flow() {
    let hub = ChannelHub::new();
    let mut subscription = hub.register_listener("pixel", "flow-1");
    let mut library = MemoryPersistence::new();
    let mut device = LoopbackDevice::new(hub.clone(), library.clone());

    assert!(matches!(
        device.test_run("flow-1", "pixel"),
        Err(GatewayError::Rejected(_))
    ));

    library.save("flow-1", &linear_workflow(&["a", "b"])).unwrap();
    let receipt = device.test_run("flow-1", "pixel").unwrap();
    assert_eq!(receipt, TestRunReceipt { actions_count: 2 });

    let statuses: Vec<(String, ProgressStatus)> = std::iter::from_fn(|| subscription.try_next_progress())
        .map(|ProgressMessage::ActionProgress(e)| (e.action_id, e.status))
        .collect();
    assert_eq!(
        statuses,
        vec![
            ("a".to_string(), ProgressStatus::Running),
            ("a".to_string(), ProgressStatus::Success),
            ("b".to_string(), ProgressStatus::Running),
            ("b".to_string(), ProgressStatus::Success),
        ]
    );
}

#[test]
fn test_loopback_injected_failure() {
    let hub = ChannelHub::new();
    let mut subscription = hub.register_listener("pixel", "flow-1");
    let mut library = MemoryPersistence::new();
    library.save("flow-1", &linear_workflow(&["a", "b"])).unwrap();
    let mut device = LoopbackDevice::new(hub.clone(), library);
    device.fail_on("a");

    device.test_run("flow-1", "pixel").unwrap();
    let events: Vec<ProgressMessage> = std::iter::from_fn(|| subscription.try_next_progress()).collect();
    assert_eq!(events.len(), 2);
    let ProgressMessage::ActionProgress(last) = &events[1];
    assert_eq!(last.status, ProgressStatus::Error);
}

#[test]
fn test_loopback_test_run_respects_replay_limit() {
    let hub = ChannelHub::new();
    let mut subscription = hub.register_listener("pixel", "flow-1");
    let mut library = MemoryPersistence::new();
    let mut store = GraphStore::from_workflow(linear_workflow(&["a", "b"])).unwrap();
    let config = kiroku::config::EditorConfig::default();
    let loop_id = kiroku::mutation::wrap_in_loop(&mut store, &["b".to_string()], &config).unwrap();
    store.update_node(&loop_id, |n| {
        if let Some(l) = n.as_loop_mut() {
            l.iterations = u32::MAX;
        }
    });
    library.save("flow-1", store.workflow()).unwrap();

    let mut device = LoopbackDevice::new(hub.clone(), library);
    device.set_replay_limit(10);
    let receipt = device.test_run("flow-1", "pixel").unwrap();

    assert_eq!(receipt.actions_count, 1 + u32::MAX as usize);
    let published = std::iter::from_fn(|| subscription.try_next_progress()).count();
    assert_eq!(published, 10);
}
