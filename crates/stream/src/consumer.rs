//! Reconnecting consumer of the activity push stream.
//!
//! One tokio task per consumer owns both the open transport and the pending
//! reconnect sleep, so [`StreamConsumer::disconnect`] cancels both with a
//! single abort. Callbacks run on that task, never under the state lock.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use gatewatch_core::{ActivityItem, Result, StreamConfig};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::state::{ConnectionStatus, ConsumerState, FrameOutcome};

/// Raw frames as delivered by a transport. An `Err` item is a transport error.
pub type FrameStream = BoxStream<'static, Result<String>>;

/// Opens the server-push connection. Implementations decide the wire
/// (event stream, websocket, in-process channel).
#[async_trait]
pub trait StreamSource: Send + Sync {
    async fn connect(&self, endpoint: &str) -> Result<FrameStream>;
}

type Notify = Arc<dyn Fn() + Send + Sync>;
type ActivityNotify = Arc<dyn Fn(&ActivityItem) + Send + Sync>;

#[derive(Clone, Default)]
struct Callbacks {
    on_connect: Option<Notify>,
    on_disconnect: Option<Notify>,
    on_activity: Option<ActivityNotify>,
}

pub struct StreamConsumer {
    source: Arc<dyn StreamSource>,
    endpoint: String,
    reconnect_delay: Duration,
    callbacks: Callbacks,
    state: Arc<Mutex<ConsumerState>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl StreamConsumer {
    pub fn new(source: Arc<dyn StreamSource>, config: &StreamConfig) -> Self {
        Self {
            source,
            endpoint: config.endpoint.clone(),
            reconnect_delay: config.reconnect_delay(),
            callbacks: Callbacks::default(),
            state: Arc::new(Mutex::new(ConsumerState::new(config.buffer_capacity))),
            task: Mutex::new(None),
        }
    }

    pub fn on_connect(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.callbacks.on_connect = Some(Arc::new(f));
        self
    }

    pub fn on_disconnect(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.callbacks.on_disconnect = Some(Arc::new(f));
        self
    }

    pub fn on_activity(mut self, f: impl Fn(&ActivityItem) + Send + Sync + 'static) -> Self {
        self.callbacks.on_activity = Some(Arc::new(f));
        self
    }

    /// Start consuming. A no-op while a connection task is already running.
    /// Must be called from within a tokio runtime.
    pub fn connect(&self) {
        let mut task = lock(&self.task);
        if task.as_ref().map_or(false, |t| !t.is_finished()) {
            debug!(endpoint = %self.endpoint, "Stream consumer already running");
            return;
        }

        let run = lock(&self.state).start();
        let driver = Driver {
            run,
            source: self.source.clone(),
            endpoint: self.endpoint.clone(),
            reconnect_delay: self.reconnect_delay,
            callbacks: self.callbacks.clone(),
            state: self.state.clone(),
        };
        *task = Some(tokio::spawn(driver.run()));
    }

    /// Stop consuming: cancels any pending reconnect and closes the transport.
    /// Safe to call repeatedly.
    pub fn disconnect(&self) {
        let handle = lock(&self.task).take();
        lock(&self.state).stop();
        if let Some(handle) = handle {
            handle.abort();
            info!(endpoint = %self.endpoint, "Stream consumer disconnected");
        }
    }

    pub fn activities(&self) -> Vec<ActivityItem> {
        lock(&self.state).buffer().items().to_vec()
    }

    pub fn status(&self) -> ConnectionStatus {
        lock(&self.state).status()
    }

    pub fn is_connected(&self) -> bool {
        self.status() == ConnectionStatus::Connected
    }

    pub fn error(&self) -> Option<String> {
        lock(&self.state).error().map(str::to_string)
    }
}

impl Drop for StreamConsumer {
    fn drop(&mut self) {
        if let Some(handle) = lock(&self.task).take() {
            handle.abort();
        }
    }
}

struct Driver {
    run: u64,
    source: Arc<dyn StreamSource>,
    endpoint: String,
    reconnect_delay: Duration,
    callbacks: Callbacks,
    state: Arc<Mutex<ConsumerState>>,
}

impl Driver {
    async fn run(self) {
        loop {
            match self.source.connect(&self.endpoint).await {
                Ok(frames) => {
                    if !lock(&self.state).opened(self.run) {
                        return;
                    }
                    info!(endpoint = %self.endpoint, "Stream connected");
                    if let Some(cb) = &self.callbacks.on_connect {
                        cb();
                    }
                    if !self.pump(frames).await {
                        return;
                    }
                }
                Err(e) => {
                    warn!(endpoint = %self.endpoint, error = %e, "Stream connect failed");
                }
            }

            if !lock(&self.state).transport_failed(self.run) {
                return;
            }
            if let Some(cb) = &self.callbacks.on_disconnect {
                cb();
            }

            debug!(delay_ms = self.reconnect_delay.as_millis() as u64, "Reconnect scheduled");
            tokio::time::sleep(self.reconnect_delay).await;

            if !lock(&self.state).retry_fired(self.run) {
                return;
            }
        }
    }

    /// Feed frames into the state until the transport fails or ends.
    /// Returns false if this run was stopped meanwhile.
    async fn pump(&self, mut frames: FrameStream) -> bool {
        while let Some(item) = frames.next().await {
            let text = match item {
                Ok(text) => text,
                Err(e) => {
                    warn!(endpoint = %self.endpoint, error = %e, "Stream transport error");
                    return true;
                }
            };
            let outcome = lock(&self.state).apply_frame(self.run, &text);
            match outcome {
                FrameOutcome::Added(activity) => {
                    if let Some(cb) = &self.callbacks.on_activity {
                        cb(&activity);
                    }
                }
                FrameOutcome::Merged(added) => {
                    debug!(added = added.len(), "Merged activity batch");
                }
                FrameOutcome::Handshake | FrameOutcome::Duplicate => {}
                FrameOutcome::Ignored => {
                    if !lock(&self.state).is_current(self.run) {
                        return false;
                    }
                }
            }
        }
        warn!(endpoint = %self.endpoint, "Stream closed by server");
        true
    }
}
