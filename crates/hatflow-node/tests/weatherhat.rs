use std::sync::Arc;
use std::time::Duration;

use hatflow_hal::BusGuard;
use hatflow_hal::sim::{SimBackend, SimConfig, SimProbe};
use hatflow_middleware::{
    EventBus, FlowEvent, FlowNode, NodeContext, NodeRegistry, NodeSubscriber, Topic,
};
use hatflow_node::{NODE_KIND, WeatherHatNode, register};
use hatflow_types::{
    Cardinal, ConfigValue, LifecycleState, Message, NodeConfig, RawNodeConfig, StatusFill,
};
use serde_json::{Value, json};
use tokio::time::timeout;

const QUIET: Duration = Duration::from_millis(100);

struct Harness {
    node: Arc<WeatherHatNode>,
    outputs: NodeSubscriber,
    statuses: NodeSubscriber,
    probe: SimProbe,
}

fn harness(backend: SimBackend) -> Harness {
    let bus = EventBus::default();
    let outputs = bus.subscribe_node(Topic::Output, "weather-1");
    let statuses = bus.subscribe_node(Topic::Status, "weather-1");
    let probe = backend.probe();
    let node = WeatherHatNode::spawn(
        NodeContext::new("weather-1", bus),
        NodeConfig::default(),
        Arc::new(backend),
        BusGuard::new(),
    );
    Harness {
        node,
        outputs,
        statuses,
        probe,
    }
}

async fn next_output(outputs: &mut NodeSubscriber) -> Message {
    match timeout(Duration::from_secs(1), outputs.recv()).await {
        Ok(Some(FlowEvent::Output { message, .. })) => message,
        other => panic!("expected an output, got {other:?}"),
    }
}

async fn assert_silent(outputs: &mut NodeSubscriber) {
    assert!(
        timeout(QUIET, outputs.recv()).await.is_err(),
        "node produced an output"
    );
}

async fn status_texts(statuses: &mut NodeSubscriber, count: usize) -> Vec<String> {
    let mut texts = Vec::with_capacity(count);
    for _ in 0..count {
        match timeout(Duration::from_secs(1), statuses.recv()).await {
            Ok(Some(FlowEvent::Status { status, .. })) => texts.push(status.text),
            other => panic!("expected a status, got {other:?}"),
        }
    }
    texts
}

fn is_cardinal(value: &Value) -> bool {
    value
        .as_str()
        .is_some_and(|s| Cardinal::ALL.iter().any(|c| c.as_str() == s))
}

#[tokio::test]
async fn ready_node_answers_with_snapshot() {
    let mut h = harness(SimBackend::new(SimConfig::default()));
    assert_eq!(h.node.initialized().await, LifecycleState::Ready);

    let input = Message::new("x");
    h.node.on_input(input.clone()).await;
    let out = next_output(&mut h.outputs).await;

    assert_eq!(out.id, input.id);
    let wind = &out.payload["Wind"];
    let rain = &out.payload["Rain"];
    assert!(is_cardinal(&wind["Direction"]));
    let direction = wind["Direction"].as_str().unwrap();
    assert!((1..=3).contains(&direction.len()));
    assert!(wind["CurrentSpeed"].as_str().unwrap().ends_with(" m/s"));
    assert!(wind["Average1Min"].as_str().unwrap().ends_with(" m/s"));
    assert!(rain["Total"].as_str().unwrap().ends_with(" mm"));
    assert!(rain["LastMinute"].as_str().unwrap().ends_with(" mm"));
    assert!(rain["Today"].as_str().unwrap().ends_with(" mm"));
}

#[tokio::test]
async fn only_payload_changes() {
    let mut h = harness(SimBackend::new(SimConfig::default()));
    h.node.initialized().await;

    let input = Message::new(json!({ "ts": 1 }))
        .with_field("topic", "roof")
        .with_field("meta", json!({ "n": [1, 2, 3] }));
    h.node.on_input(input.clone()).await;
    let out = next_output(&mut h.outputs).await;

    assert_eq!(out.id, input.id);
    assert_eq!(out.fields, input.fields);
    assert_ne!(out.payload, input.payload);
}

#[tokio::test]
async fn back_to_back_messages_get_fresh_snapshots() {
    let mut h = harness(SimBackend::new(SimConfig::default()));
    h.node.initialized().await;

    h.node.on_input(Message::new("a")).await;
    h.node.on_input(Message::new("b")).await;
    let first = next_output(&mut h.outputs).await;
    let second = next_output(&mut h.outputs).await;

    assert_ne!(first.id, second.id);
    // The simulated vane turns and the gauge tips on every read.
    assert_ne!(first.payload["Wind"]["Direction"], second.payload["Wind"]["Direction"]);
    assert_ne!(first.payload["Rain"]["Total"], second.payload["Rain"]["Total"]);
    assert_eq!(h.probe.reads(), 12);
}

#[tokio::test]
async fn failed_node_drops_everything() {
    let mut h = harness(SimBackend::failing("no device"));
    assert_eq!(h.node.initialized().await, LifecycleState::Failed);

    assert_eq!(
        status_texts(&mut h.statuses, 2).await,
        vec!["Init...", "Init failed: no device"]
    );
    assert_eq!(h.node.error_count(), 1);

    for n in 0..5 {
        h.node.on_input(Message::new(n)).await;
    }
    assert_silent(&mut h.outputs).await;
    assert_eq!(h.node.error_count(), 1);
    assert_eq!(h.probe.acquire_calls(), 1);
}

#[tokio::test]
async fn messages_during_initialization_are_dropped() {
    let mut h = harness(SimBackend::new(SimConfig {
        acquire_delay_ms: 50,
        ..SimConfig::default()
    }));
    assert_eq!(h.node.state(), LifecycleState::Initializing);

    h.node.on_input(Message::new("early")).await;
    assert_eq!(h.node.initialized().await, LifecycleState::Ready);
    assert_silent(&mut h.outputs).await;

    h.node.on_input(Message::new("late")).await;
    assert!(next_output(&mut h.outputs).await.payload["Wind"].is_object());
}

#[tokio::test]
async fn reader_failure_drops_one_message() {
    let mut h = harness(SimBackend::new(SimConfig::default()));
    h.node.initialized().await;

    h.probe.fail_reads("bus timeout");
    h.node.on_input(Message::new("lost")).await;
    assert_silent(&mut h.outputs).await;

    h.probe.clear_read_failure();
    let kept = Message::new("kept");
    h.node.on_input(kept.clone()).await;
    assert_eq!(next_output(&mut h.outputs).await.id, kept.id);
    assert_eq!(h.node.state(), LifecycleState::Ready);
}

#[tokio::test]
async fn ready_status_sequence() {
    let mut h = harness(SimBackend::new(SimConfig::default()));
    h.node.initialized().await;
    assert_eq!(
        status_texts(&mut h.statuses, 2).await,
        vec!["Init...", "weatherhat ready"]
    );
}

#[tokio::test]
async fn close_is_idempotent() {
    let mut h = harness(SimBackend::new(SimConfig::default()));
    h.node.initialized().await;

    h.node.close().await;
    let after_one = (h.node.state(), h.node.error_count(), h.probe.release_calls());
    h.node.close().await;
    let after_two = (h.node.state(), h.node.error_count(), h.probe.release_calls());

    assert_eq!(after_one, after_two);
    assert_eq!(h.probe.release_calls(), 1);

    h.node.on_input(Message::new("after close")).await;
    assert_silent(&mut h.outputs).await;
}

#[tokio::test]
async fn registry_applies_config_defaults() {
    let bus = EventBus::default();
    let mut statuses = bus.subscribe_to(Topic::Status);
    let mut registry = NodeRegistry::new();
    register(
        &mut registry,
        Arc::new(SimBackend::new(SimConfig::default())),
        BusGuard::new(),
    );
    assert!(registry.contains(NODE_KIND));

    let node = registry
        .create(NODE_KIND, NodeContext::new("w", bus), &RawNodeConfig::default())
        .unwrap();
    assert_eq!(node.type_name(), "weatherhat");

    match statuses.recv().await.unwrap() {
        FlowEvent::Status { status, .. } => assert_eq!(status.fill, StatusFill::Grey),
        other => panic!("unexpected event {other:?}"),
    }
    node.close().await;
}

#[test]
fn omitted_bus_and_address_resolve_to_defaults() {
    let config = NodeConfig::from_raw(&RawNodeConfig::default());
    assert_eq!(config.bus(), 1);
    assert_eq!(config.address(), 0x12);
    assert_eq!(config.topic(), "");

    let config = NodeConfig::from_raw(&RawNodeConfig {
        bus: Some(ConfigValue::from("3")),
        address: Some(ConfigValue::from("0x40")),
        topic: Some("roof".into()),
    });
    assert_eq!((config.bus(), config.address(), config.topic()), (3, 0x40, "roof"));
}

#[tokio::test]
async fn nodes_sharing_an_endpoint_both_answer() {
    let bus = EventBus::default();
    let mut outputs = bus.subscribe_to(Topic::Output);
    let backend: Arc<SimBackend> = Arc::new(SimBackend::new(SimConfig::default()));
    let guard = BusGuard::new();

    let a = WeatherHatNode::spawn(
        NodeContext::new("a", bus.clone()),
        NodeConfig::default(),
        backend.clone(),
        guard.clone(),
    );
    let b = WeatherHatNode::spawn(
        NodeContext::new("b", bus.clone()),
        NodeConfig::default(),
        backend,
        guard.clone(),
    );
    a.initialized().await;
    b.initialized().await;

    tokio::join!(a.on_input(Message::new(1)), b.on_input(Message::new(2)));

    let mut from = Vec::new();
    for _ in 0..2 {
        let event = timeout(Duration::from_secs(1), outputs.recv())
            .await
            .unwrap()
            .unwrap();
        from.push(event.node_id().to_string());
    }
    from.sort();
    assert_eq!(from, vec!["a", "b"]);
    assert_eq!(guard.lane_count(), 1);
}

#[tokio::test]
async fn close_with_a_message_in_flight_forwards_nothing() {
    let bus = EventBus::default();
    let mut outputs = bus.subscribe_node(Topic::Output, "weather-1");
    let backend = SimBackend::new(SimConfig::default());
    let probe = backend.probe();
    let guard = BusGuard::new();
    let node = WeatherHatNode::spawn(
        NodeContext::new("weather-1", bus),
        NodeConfig::default(),
        Arc::new(backend),
        guard.clone(),
    );
    assert_eq!(node.initialized().await, LifecycleState::Ready);

    // Another transaction holds the endpoint while the message and the
    // close queue up behind it.
    let (open_tx, open_rx) = tokio::sync::oneshot::channel::<()>();
    let key = node.key();
    let holder = tokio::spawn({
        let guard = guard.clone();
        async move {
            guard
                .run(key, || async move {
                    let _ = open_rx.await;
                })
                .await
        }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;

    let input = tokio::spawn({
        let node = Arc::clone(&node);
        async move { node.on_input(Message::new("in flight")).await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    let closing = tokio::spawn({
        let node = Arc::clone(&node);
        async move { node.close().await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;

    let _ = open_tx.send(());
    holder.await.unwrap();
    input.await.unwrap();
    closing.await.unwrap();

    assert_silent(&mut outputs).await;
    assert_eq!(probe.release_calls(), 1);
    assert_eq!(probe.reads(), 0);
}

#[tokio::test]
async fn wrongly_typed_host_config_falls_back_to_defaults() {
    let raw: RawNodeConfig =
        serde_json::from_str(r#"{ "bus": true, "address": 1.5, "topic": "roof" }"#).unwrap();

    let bus = EventBus::default();
    let mut outputs = bus.subscribe_to(Topic::Output);
    let mut registry = NodeRegistry::new();
    register(
        &mut registry,
        Arc::new(SimBackend::new(SimConfig::default())),
        BusGuard::new(),
    );
    let node = registry
        .create(NODE_KIND, NodeContext::new("w", bus), &raw)
        .unwrap();

    let resolved = NodeConfig::from_raw(&raw);
    assert_eq!((resolved.bus(), resolved.address(), resolved.topic()), (1, 0x12, "roof"));

    // The node still comes up and answers; polled since the registry hands
    // out a trait object without `initialized()`.
    let mut answered = false;
    for _ in 0..20 {
        node.on_input(Message::new("x")).await;
        if let Ok(Ok(FlowEvent::Output { .. })) =
            timeout(Duration::from_millis(50), outputs.recv()).await
        {
            answered = true;
            break;
        }
    }
    assert!(answered, "node never answered");
    node.close().await;
}
