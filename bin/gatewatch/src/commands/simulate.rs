use std::sync::Arc;
use std::time::Duration;

use gatewatch_actions::{
    ActionDispatcher, ActionRequest, InMemoryActivityStore, LoggingSessionRunner,
    LoggingSupervisor,
};
use gatewatch_bridge::{EventBridge, GatewayMonitor};
use gatewatch_core::{ActivityItem, Config, Paths, RuntimeEvent};
use gatewatch_stream::{BridgeSource, StreamConsumer};
use serde_json::json;
use tracing::{debug, info};

const ACTIVITY_TYPES: [&str; 4] = ["tool_call", "message", "approval", "file_edit"];

async fn wait_until(mut ready: impl FnMut() -> bool, limit: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if ready() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    ready()
}

pub async fn run(events: usize) -> anyhow::Result<()> {
    let config = Config::load_or_default(&Paths::new())?;

    let bridge = EventBridge::new(&config.bridge);
    let trace = bridge.subscribe_all(|event: &RuntimeEvent| {
        debug!(kind = %event.kind(), id = %event.id(), "Bridge event");
        Ok(())
    });

    let mut monitor = GatewayMonitor::new(bridge.clone());
    monitor.observe(Ok(Duration::from_millis(42)));

    let store = InMemoryActivityStore::new().with_bridge(bridge.clone());
    let dispatcher = ActionDispatcher::new(
        Arc::new(store.clone()),
        Arc::new(LoggingSupervisor::new()),
        Arc::new(LoggingSessionRunner::new()),
        &config.actions,
    )
    .with_bridge(bridge.clone());

    let consumer = StreamConsumer::new(Arc::new(BridgeSource::new(bridge.clone())), &config.stream)
        .on_connect(|| info!("Consumer connected"))
        .on_disconnect(|| info!("Consumer disconnected"))
        .on_activity(|item: &ActivityItem| {
            info!(id = %item.id, kind = %item.activity_type, "Activity received")
        });
    consumer.connect();

    if !wait_until(|| consumer.is_connected(), Duration::from_secs(2)).await {
        anyhow::bail!("consumer did not connect");
    }

    for i in 0..events {
        let kind = ACTIVITY_TYPES[i % ACTIVITY_TYPES.len()];
        let id = format!("sim-{}", i + 1);
        let description = format!("Simulated {} #{}", kind, i + 1);
        let item =
            ActivityItem::new(&id, kind, &description).with_extra("agent", json!("simulator"));
        store.record(item).await;
    }

    if events > 0 {
        let resp = dispatcher
            .dispatch(ActionRequest::new(
                "action:approve",
                json!({ "activityId": "sim-1" }),
            ))
            .await;
        info!(status = resp.status_code(), "Approved first simulated activity");
    }

    let expected = events.min(config.stream.buffer_capacity);
    wait_until(|| consumer.activities().len() >= expected, Duration::from_secs(2)).await;

    let activities = consumer.activities();
    println!();
    println!("Consumer: {} ({} activities buffered)", consumer.status(), activities.len());
    for item in &activities {
        println!("  {:<10} {:<10} {}", item.id, item.activity_type, item.description);
    }

    println!();
    println!("Bridge history ({} of {}):", bridge.history_len(), bridge.capacity());
    for event in bridge.history(None) {
        println!("  {:<18} {}", event.kind().as_str(), event.id());
    }

    consumer.disconnect();
    trace.unsubscribe();
    Ok(())
}
