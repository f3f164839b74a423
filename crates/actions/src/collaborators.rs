//! Services the dispatcher forwards actions to, plus in-memory stand-ins.

use std::sync::Arc;

use async_trait::async_trait;
use gatewatch_bridge::EventBridge;
use gatewatch_core::{ActivityItem, Error, Result, RuntimeEvent};
use tokio::sync::Mutex;
use tracing::info;

#[async_trait]
pub trait ActivityStore: Send + Sync {
    async fn find(&self, activity_id: &str) -> Option<ActivityItem>;
    async fn update_status(&self, activity_id: &str, status: &str) -> Result<()>;
}

#[async_trait]
pub trait AgentSupervisor: Send + Sync {
    async fn pause(&self, agent_id: &str) -> Result<()>;
    async fn resume(&self, agent_id: &str) -> Result<()>;
}

#[async_trait]
pub trait SessionRunner: Send + Sync {
    async fn cancel(&self, session_id: &str) -> Result<()>;
}

/// Thread-safe activity registry. Newly recorded activities are announced
/// on the bridge when one is attached.
#[derive(Clone, Default)]
pub struct InMemoryActivityStore {
    activities: Arc<Mutex<Vec<ActivityItem>>>,
    bridge: Option<EventBridge>,
}

impl InMemoryActivityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bridge(mut self, bridge: EventBridge) -> Self {
        self.bridge = Some(bridge);
        self
    }

    /// Load activities without announcing them.
    pub async fn seed(&self, items: Vec<ActivityItem>) {
        let mut activities = self.activities.lock().await;
        for item in items {
            activities.retain(|a| a.id != item.id);
            activities.push(item);
        }
    }

    /// Store an activity and emit `activity:create` for it.
    pub async fn record(&self, item: ActivityItem) -> Option<RuntimeEvent> {
        {
            let mut activities = self.activities.lock().await;
            activities.retain(|a| a.id != item.id);
            activities.push(item.clone());
        }
        // Lock released before emitting; subscribers may call back in.
        self.bridge.as_ref().map(|bridge| {
            bridge.emit(RuntimeEvent::activity_create(item).with_source("activity-store"))
        })
    }

    /// All activities, newest first.
    pub async fn list(&self) -> Vec<ActivityItem> {
        let activities = self.activities.lock().await;
        activities.iter().rev().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.activities.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.activities.lock().await.is_empty()
    }
}

#[async_trait]
impl ActivityStore for InMemoryActivityStore {
    async fn find(&self, activity_id: &str) -> Option<ActivityItem> {
        let activities = self.activities.lock().await;
        activities.iter().find(|a| a.id == activity_id).cloned()
    }

    async fn update_status(&self, activity_id: &str, status: &str) -> Result<()> {
        let mut activities = self.activities.lock().await;
        let item = activities
            .iter_mut()
            .find(|a| a.id == activity_id)
            .ok_or_else(|| Error::NotFound(format!("activity {}", activity_id)))?;
        item.status = status.to_string();
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentSignal {
    Pause,
    Resume,
}

/// Logs agent signals and keeps them for inspection.
#[derive(Clone, Default)]
pub struct LoggingSupervisor {
    signals: Arc<Mutex<Vec<(String, AgentSignal)>>>,
}

impl LoggingSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn signals(&self) -> Vec<(String, AgentSignal)> {
        self.signals.lock().await.clone()
    }
}

#[async_trait]
impl AgentSupervisor for LoggingSupervisor {
    async fn pause(&self, agent_id: &str) -> Result<()> {
        info!(agent_id = %agent_id, "Pause requested");
        self.signals
            .lock()
            .await
            .push((agent_id.to_string(), AgentSignal::Pause));
        Ok(())
    }

    async fn resume(&self, agent_id: &str) -> Result<()> {
        info!(agent_id = %agent_id, "Resume requested");
        self.signals
            .lock()
            .await
            .push((agent_id.to_string(), AgentSignal::Resume));
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct LoggingSessionRunner {
    cancelled: Arc<Mutex<Vec<String>>>,
}

impl LoggingSessionRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn cancelled(&self) -> Vec<String> {
        self.cancelled.lock().await.clone()
    }
}

#[async_trait]
impl SessionRunner for LoggingSessionRunner {
    async fn cancel(&self, session_id: &str) -> Result<()> {
        info!(session_id = %session_id, "Session cancel requested");
        self.cancelled.lock().await.push(session_id.to_string());
        Ok(())
    }
}
