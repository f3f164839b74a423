use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use gatewatch_actions::{
    ActionDispatcher, InMemoryActivityStore, LoggingSessionRunner, LoggingSupervisor,
};
use gatewatch_bridge::EventBridge;
use gatewatch_core::{ActivityItem, Config, Paths};
use tracing::info;

fn load_seed(path: &Path) -> anyhow::Result<Vec<ActivityItem>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading seed file {}", path.display()))?;
    let items: Vec<ActivityItem> = serde_json::from_str(&content)
        .with_context(|| format!("parsing seed file {}", path.display()))?;
    Ok(items)
}

pub async fn run(request: &str, seed: Option<PathBuf>) -> anyhow::Result<()> {
    let paths = Paths::new();
    let config = Config::load_or_default(&paths)?;

    let bridge = EventBridge::new(&config.bridge);
    let store = InMemoryActivityStore::new();

    let seed_path = seed.or_else(|| {
        let default = paths.activities_seed_file();
        default.exists().then_some(default)
    });
    if let Some(path) = seed_path {
        let items = load_seed(&path)?;
        info!(count = items.len(), path = %path.display(), "Seeded activity store");
        store.seed(items).await;
    }

    let dispatcher = ActionDispatcher::new(
        Arc::new(store),
        Arc::new(LoggingSupervisor::new()),
        Arc::new(LoggingSessionRunner::new()),
        &config.actions,
    )
    .with_bridge(bridge.clone());

    let response = dispatcher.dispatch_raw(request).await;

    println!("HTTP {}", response.status_code());
    println!("{}", serde_json::to_string_pretty(&response.body())?);

    let emitted = bridge.history(None);
    if !emitted.is_empty() {
        println!();
        println!("Emitted events:");
        for event in emitted {
            println!("  {}", serde_json::to_string(&event)?);
        }
    }

    if let Some(request_id) = response.request_id.as_deref() {
        let polled = dispatcher.poll(request_id).await;
        println!();
        println!("Poll {}: {}", request_id, serde_json::to_string(&polled)?);
    }

    Ok(())
}
