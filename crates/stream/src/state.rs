use std::fmt;

use gatewatch_core::ActivityItem;
use serde::Serialize;

use crate::buffer::ActivityBuffer;
use crate::frame::Frame;

pub const ERROR_CONNECTION_LOST: &str = "Connection lost";
pub const ERROR_RECONNECTING: &str = "Reconnecting...";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Idle,
    Connecting,
    Connected,
    Reconnecting,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Idle => write!(f, "idle"),
            ConnectionStatus::Connecting => write!(f, "connecting"),
            ConnectionStatus::Connected => write!(f, "connected"),
            ConnectionStatus::Reconnecting => write!(f, "reconnecting"),
        }
    }
}

/// What a frame did to the buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    Handshake,
    Merged(Vec<ActivityItem>),
    Added(ActivityItem),
    Duplicate,
    Ignored,
}

/// Transport-free consumer state.
///
/// ```text
/// idle ──start──► connecting ──opened──► connected
///                    ▲                      │ transport_failed
///                    │ retry_fired          ▼
///                    └────────────── reconnecting
/// any ──stop──► idle
/// ```
///
/// Every transition is tagged with the run that requested it; once `stop`
/// or a new `start` bumps the run, transitions from the old run are refused.
#[derive(Debug, Clone)]
pub struct ConsumerState {
    status: ConnectionStatus,
    error: Option<String>,
    buffer: ActivityBuffer,
    run: u64,
}

impl ConsumerState {
    pub fn new(buffer_capacity: usize) -> Self {
        Self {
            status: ConnectionStatus::Idle,
            error: None,
            buffer: ActivityBuffer::new(buffer_capacity),
            run: 0,
        }
    }

    /// Begin a new run. Returns its id.
    pub fn start(&mut self) -> u64 {
        self.run += 1;
        self.status = ConnectionStatus::Connecting;
        self.run
    }

    pub fn stop(&mut self) {
        self.run += 1;
        self.status = ConnectionStatus::Idle;
    }

    pub fn is_current(&self, run: u64) -> bool {
        self.run == run && self.status != ConnectionStatus::Idle
    }

    pub fn opened(&mut self, run: u64) -> bool {
        if !self.is_current(run) {
            return false;
        }
        self.status = ConnectionStatus::Connected;
        self.error = None;
        true
    }

    pub fn apply_frame(&mut self, run: u64, text: &str) -> FrameOutcome {
        if !self.is_current(run) {
            return FrameOutcome::Ignored;
        }
        match Frame::parse(text) {
            Some(Frame::Connected) => FrameOutcome::Handshake,
            Some(Frame::Batch { activities }) => {
                FrameOutcome::Merged(self.buffer.merge_batch(activities))
            }
            Some(Frame::New { activity }) => {
                if self.buffer.push(activity.clone()) {
                    FrameOutcome::Added(activity)
                } else {
                    FrameOutcome::Duplicate
                }
            }
            None => FrameOutcome::Ignored,
        }
    }

    pub fn transport_failed(&mut self, run: u64) -> bool {
        if !self.is_current(run) {
            return false;
        }
        self.status = ConnectionStatus::Reconnecting;
        self.error = Some(ERROR_CONNECTION_LOST.to_string());
        true
    }

    pub fn retry_fired(&mut self, run: u64) -> bool {
        if !self.is_current(run) {
            return false;
        }
        self.status = ConnectionStatus::Connecting;
        self.error = Some(ERROR_RECONNECTING.to_string());
        true
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn buffer(&self) -> &ActivityBuffer {
        &self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NEW_A: &str = r#"{"type":"new","activity":{"id":"a","type":"note"}}"#;

    #[test]
    fn test_happy_path_transitions() {
        let mut state = ConsumerState::new(100);
        assert_eq!(state.status(), ConnectionStatus::Idle);

        let run = state.start();
        assert_eq!(state.status(), ConnectionStatus::Connecting);
        assert!(state.opened(run));
        assert_eq!(state.status(), ConnectionStatus::Connected);
        assert!(state.error().is_none());

        assert!(state.transport_failed(run));
        assert_eq!(state.status(), ConnectionStatus::Reconnecting);
        assert_eq!(state.error(), Some(ERROR_CONNECTION_LOST));

        assert!(state.retry_fired(run));
        assert_eq!(state.status(), ConnectionStatus::Connecting);
        assert_eq!(state.error(), Some(ERROR_RECONNECTING));

        assert!(state.opened(run));
        assert!(state.error().is_none());

        state.stop();
        assert_eq!(state.status(), ConnectionStatus::Idle);
    }

    #[test]
    fn test_stale_run_is_refused() {
        let mut state = ConsumerState::new(100);
        let old = state.start();
        state.stop();
        let new = state.start();

        assert!(!state.opened(old));
        assert!(!state.transport_failed(old));
        assert_eq!(state.apply_frame(old, NEW_A), FrameOutcome::Ignored);
        assert!(state.buffer().is_empty());

        assert!(state.opened(new));
    }

    #[test]
    fn test_nothing_applies_after_stop() {
        let mut state = ConsumerState::new(100);
        let run = state.start();
        state.opened(run);
        state.stop();

        assert!(!state.retry_fired(run));
        assert_eq!(state.apply_frame(run, NEW_A), FrameOutcome::Ignored);
        assert_eq!(state.status(), ConnectionStatus::Idle);
    }

    #[test]
    fn test_frame_outcomes() {
        let mut state = ConsumerState::new(100);
        let run = state.start();
        state.opened(run);

        assert_eq!(state.apply_frame(run, r#"{"type":"connected"}"#), FrameOutcome::Handshake);
        assert!(matches!(state.apply_frame(run, NEW_A), FrameOutcome::Added(a) if a.id == "a"));
        assert_eq!(state.apply_frame(run, NEW_A), FrameOutcome::Duplicate);
        assert_eq!(state.apply_frame(run, "{oops"), FrameOutcome::Ignored);

        let batch = r#"{"type":"batch","activities":[{"id":"a","type":"note"},{"id":"b","type":"note"}]}"#;
        match state.apply_frame(run, batch) {
            FrameOutcome::Merged(added) => {
                assert_eq!(added.len(), 1);
                assert_eq!(added[0].id, "b");
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        let ids: Vec<_> = state.buffer().items().iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }
}
