//! Runtime event vocabulary.
//!
//! Every event the gateway can publish is one variant of [`EventPayload`];
//! the variant decides the wire `type` tag and the payload shape, so a
//! payload can never be paired with the wrong kind.
//!
//! Wire shape:
//! ```text
//! { "id": "...", "timestamp": "...", "source": "...", "type": "activity:update", "payload": { ... } }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::activity::ActivityItem;
use crate::error::Error;

pub type EventFields = serde_json::Map<String, serde_json::Value>;

/// Discriminant of [`EventPayload`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    #[serde(rename = "activity:update")]
    ActivityUpdate,
    #[serde(rename = "activity:create")]
    ActivityCreate,
    #[serde(rename = "session:change")]
    SessionChange,
    #[serde(rename = "session:create")]
    SessionCreate,
    #[serde(rename = "session:delete")]
    SessionDelete,
    #[serde(rename = "notification:new")]
    NotificationNew,
    #[serde(rename = "notification:read")]
    NotificationRead,
    #[serde(rename = "status:change")]
    StatusChange,
    #[serde(rename = "gateway:status")]
    GatewayStatus,
    #[serde(rename = "model:change")]
    ModelChange,
}

impl EventKind {
    pub const ALL: [EventKind; 10] = [
        EventKind::ActivityUpdate,
        EventKind::ActivityCreate,
        EventKind::SessionChange,
        EventKind::SessionCreate,
        EventKind::SessionDelete,
        EventKind::NotificationNew,
        EventKind::NotificationRead,
        EventKind::StatusChange,
        EventKind::GatewayStatus,
        EventKind::ModelChange,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::ActivityUpdate => "activity:update",
            EventKind::ActivityCreate => "activity:create",
            EventKind::SessionChange => "session:change",
            EventKind::SessionCreate => "session:create",
            EventKind::SessionDelete => "session:delete",
            EventKind::NotificationNew => "notification:new",
            EventKind::NotificationRead => "notification:read",
            EventKind::StatusChange => "status:change",
            EventKind::GatewayStatus => "gateway:status",
            EventKind::ModelChange => "model:change",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| Error::Event(format!("unknown event kind: {}", s)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateStatus {
    Success,
    Error,
    Pending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayHealth {
    Online,
    Degraded,
    Offline,
}

impl fmt::Display for GatewayHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayHealth::Online => write!(f, "online"),
            GatewayHealth::Degraded => write!(f, "degraded"),
            GatewayHealth::Offline => write!(f, "offline"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityUpdate {
    pub activity_id: String,
    pub status: UpdateStatus,
    #[serde(default)]
    pub updates: EventFields,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityCreate {
    pub activity: ActivityItem,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionChange {
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default)]
    pub changes: EventFields,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCreate {
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDelete {
    pub session_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationNew {
    pub notification_id: String,
    pub title: String,
    #[serde(default)]
    pub message: String,
    pub level: NotificationLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRead {
    pub notification_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    pub agent_id: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayStatus {
    pub status: GatewayHealth,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelChange {
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// Payload of a runtime event, tagged by kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum EventPayload {
    #[serde(rename = "activity:update")]
    ActivityUpdate(ActivityUpdate),
    #[serde(rename = "activity:create")]
    ActivityCreate(ActivityCreate),
    #[serde(rename = "session:change")]
    SessionChange(SessionChange),
    #[serde(rename = "session:create")]
    SessionCreate(SessionCreate),
    #[serde(rename = "session:delete")]
    SessionDelete(SessionDelete),
    #[serde(rename = "notification:new")]
    NotificationNew(NotificationNew),
    #[serde(rename = "notification:read")]
    NotificationRead(NotificationRead),
    #[serde(rename = "status:change")]
    StatusChange(StatusChange),
    #[serde(rename = "gateway:status")]
    GatewayStatus(GatewayStatus),
    #[serde(rename = "model:change")]
    ModelChange(ModelChange),
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            EventPayload::ActivityUpdate(_) => EventKind::ActivityUpdate,
            EventPayload::ActivityCreate(_) => EventKind::ActivityCreate,
            EventPayload::SessionChange(_) => EventKind::SessionChange,
            EventPayload::SessionCreate(_) => EventKind::SessionCreate,
            EventPayload::SessionDelete(_) => EventKind::SessionDelete,
            EventPayload::NotificationNew(_) => EventKind::NotificationNew,
            EventPayload::NotificationRead(_) => EventKind::NotificationRead,
            EventPayload::StatusChange(_) => EventKind::StatusChange,
            EventPayload::GatewayStatus(_) => EventKind::GatewayStatus,
            EventPayload::ModelChange(_) => EventKind::ModelChange,
        }
    }
}

/// A runtime event. Fields are read-only once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeEvent {
    #[serde(default)]
    id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source: Option<String>,
    #[serde(flatten)]
    payload: EventPayload,
}

impl RuntimeEvent {
    /// Build a fully stamped event (id + timestamp).
    pub fn new(payload: EventPayload) -> Self {
        let mut event = Self::unstamped(payload);
        event.ensure_stamped();
        event
    }

    /// Build an event without id or timestamp; the bridge stamps it on emit.
    pub fn unstamped(payload: EventPayload) -> Self {
        Self {
            id: String::new(),
            timestamp: None,
            source: None,
            payload,
        }
    }

    pub fn with_source(mut self, source: &str) -> Self {
        self.source = Some(source.to_string());
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Assign timestamp and id if they are still missing. Existing values are
    /// never overwritten.
    pub fn ensure_stamped(&mut self) {
        let now = Utc::now();
        if self.timestamp.is_none() {
            self.timestamp = Some(now);
        }
        if self.id.is_empty() {
            self.id = new_event_id(self.timestamp.unwrap_or(now));
        }
    }

    pub fn is_stamped(&self) -> bool {
        self.timestamp.is_some() && !self.id.is_empty()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn payload(&self) -> &EventPayload {
        &self.payload
    }

    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    pub fn activity_update(activity_id: &str, status: UpdateStatus, updates: EventFields) -> Self {
        Self::new(EventPayload::ActivityUpdate(ActivityUpdate {
            activity_id: activity_id.to_string(),
            status,
            updates,
        }))
    }

    pub fn activity_create(activity: ActivityItem) -> Self {
        Self::new(EventPayload::ActivityCreate(ActivityCreate { activity }))
    }

    pub fn gateway_status(status: GatewayHealth, latency_ms: Option<u64>) -> Self {
        Self::new(EventPayload::GatewayStatus(GatewayStatus {
            status,
            latency_ms,
            message: None,
        }))
    }
}

/// `<unix-millis>-<8 hex chars>`.
fn new_event_id(at: DateTime<Utc>) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}", at.timestamp_millis(), &suffix[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_stamps_id_and_timestamp() {
        let event = RuntimeEvent::gateway_status(GatewayHealth::Online, Some(12));
        assert!(event.is_stamped());
        assert_eq!(event.kind(), EventKind::GatewayStatus);

        let (millis, suffix) = event.id().split_once('-').unwrap();
        assert_eq!(millis, event.timestamp().unwrap().timestamp_millis().to_string());
        assert_eq!(suffix.len(), 8);
    }

    #[test]
    fn test_ensure_stamped_keeps_producer_values() {
        let ts = DateTime::parse_from_rfc3339("2026-03-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let mut event = RuntimeEvent::unstamped(EventPayload::SessionDelete(SessionDelete {
            session_id: "s1".to_string(),
        }))
        .with_timestamp(ts);

        event.ensure_stamped();
        assert_eq!(event.timestamp(), Some(ts));
        let id = event.id().to_string();

        event.ensure_stamped();
        assert_eq!(event.id(), id);
    }

    #[test]
    fn test_ids_are_unique() {
        let a = RuntimeEvent::gateway_status(GatewayHealth::Online, None);
        let b = RuntimeEvent::gateway_status(GatewayHealth::Online, None);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_wire_shape() {
        let mut updates = EventFields::new();
        updates.insert("progress".to_string(), json!(50));
        let event = RuntimeEvent::activity_update("act-1", UpdateStatus::Pending, updates)
            .with_source("cron");

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "activity:update");
        assert_eq!(value["source"], "cron");
        assert_eq!(value["payload"]["activityId"], "act-1");
        assert_eq!(value["payload"]["status"], "pending");
        assert_eq!(value["payload"]["updates"]["progress"], 50);

        let parsed: RuntimeEvent = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, event);
    }

    #[test]
    fn test_payload_must_match_kind() {
        let bad = json!({
            "type": "session:delete",
            "payload": { "activityId": "a" }
        });
        assert!(serde_json::from_value::<RuntimeEvent>(bad).is_err());

        let unknown = json!({ "type": "nope", "payload": {} });
        assert!(serde_json::from_value::<RuntimeEvent>(unknown).is_err());
    }

    #[test]
    fn test_kind_names_round_trip() {
        for kind in EventKind::ALL {
            assert_eq!(kind.as_str().parse::<EventKind>().unwrap(), kind);
            assert_eq!(serde_json::to_value(kind).unwrap(), json!(kind.as_str()));
        }
        assert!("activity:delete".parse::<EventKind>().is_err());
    }
}
