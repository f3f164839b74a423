//! Server side of the activity stream, sourced from the event bridge.
//!
//! A fresh attachment yields `connected`, then one `batch` with the retained
//! `activity:create` items (newest first, with later `activity:update`
//! changes folded in), then one `new` frame per live creation. The live
//! subscription is taken before the history snapshot, so an activity created
//! in between can show up twice; consumers drop the repeat by id.

use std::collections::VecDeque;

use async_trait::async_trait;
use futures::StreamExt;
use gatewatch_bridge::{EventBridge, EventFilter, Subscription};
use gatewatch_core::event::ActivityUpdate;
use gatewatch_core::{ActivityItem, Error, EventKind, EventPayload, Result, RuntimeEvent};
use tokio::sync::mpsc;
use tracing::debug;

use crate::consumer::{FrameStream, StreamSource};
use crate::frame::Frame;

#[derive(Clone)]
pub struct ActivityFeed {
    bridge: EventBridge,
}

impl ActivityFeed {
    pub fn new(bridge: EventBridge) -> Self {
        Self { bridge }
    }

    pub fn attach(&self) -> FrameFeed {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = self.bridge.subscribe(
            EventKind::ActivityCreate,
            move |event: &RuntimeEvent| {
                if let EventPayload::ActivityCreate(created) = event.payload() {
                    // A closed receiver means the feed is being torn down.
                    let _ = tx.send(Frame::New {
                        activity: created.activity.clone(),
                    });
                }
                Ok(())
            },
        );

        let history = self.bridge.history(Some(
            &EventFilter::new().kinds([EventKind::ActivityCreate, EventKind::ActivityUpdate]),
        ));
        let activities = recent_activities(&history);
        debug!(batch = activities.len(), "Activity feed attached");

        FrameFeed {
            pending: VecDeque::from([Frame::Connected, Frame::Batch { activities }]),
            live: rx,
            _subscription: subscription,
        }
    }
}

/// Frames for one attached client. Dropping it unsubscribes from the bridge.
pub struct FrameFeed {
    pending: VecDeque<Frame>,
    live: mpsc::UnboundedReceiver<Frame>,
    _subscription: Subscription,
}

impl FrameFeed {
    pub async fn next(&mut self) -> Option<Frame> {
        if let Some(frame) = self.pending.pop_front() {
            return Some(frame);
        }
        self.live.recv().await
    }

    pub fn into_stream(self) -> futures::stream::BoxStream<'static, Frame> {
        futures::stream::unfold(self, |mut feed| async move {
            feed.next().await.map(|frame| (frame, feed))
        })
        .boxed()
    }
}

/// Retained activities, newest first, with status updates applied.
fn recent_activities(history: &[RuntimeEvent]) -> Vec<ActivityItem> {
    let mut items: Vec<ActivityItem> = Vec::new();
    for event in history {
        match event.payload() {
            EventPayload::ActivityCreate(created) => {
                items.retain(|a| a.id != created.activity.id);
                items.push(created.activity.clone());
            }
            EventPayload::ActivityUpdate(update) => {
                if let Some(item) = items.iter_mut().find(|a| a.id == update.activity_id) {
                    apply_update(item, update);
                }
            }
            _ => {}
        }
    }
    items.reverse();
    items
}

fn apply_update(item: &mut ActivityItem, update: &ActivityUpdate) {
    for (key, value) in &update.updates {
        match (key.as_str(), value.as_str()) {
            ("status", Some(status)) => item.status = status.to_string(),
            ("description", Some(description)) => item.description = description.to_string(),
            _ => {
                item.extra.insert(key.clone(), value.clone());
            }
        }
    }
}

/// In-process [`StreamSource`] serving frames straight from a bridge.
pub struct BridgeSource {
    feed: ActivityFeed,
}

impl BridgeSource {
    pub fn new(bridge: EventBridge) -> Self {
        Self {
            feed: ActivityFeed::new(bridge),
        }
    }
}

#[async_trait]
impl StreamSource for BridgeSource {
    async fn connect(&self, endpoint: &str) -> Result<FrameStream> {
        debug!(endpoint = %endpoint, "Attaching in-process activity feed");
        let frames = self.feed.attach().into_stream().map(|frame| {
            frame
                .to_json()
                .map_err(|e| Error::Transport(format!("frame encoding failed: {}", e)))
        });
        Ok(frames.boxed())
    }
}
