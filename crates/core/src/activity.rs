use serde::{Deserialize, Serialize};

/// An activity-like item as shown in the dashboard feed.
///
/// Only `id` participates in deduplication; fields the dashboard does not
/// know about are carried through untouched in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityItem {
    pub id: String,
    #[serde(rename = "type")]
    pub activity_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub status: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ActivityItem {
    pub fn new(id: &str, activity_type: &str, description: &str) -> Self {
        Self {
            id: id.to_string(),
            activity_type: activity_type.to_string(),
            description: description.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            status: "pending".to_string(),
            extra: serde_json::Map::new(),
        }
    }

    pub fn with_extra(mut self, key: &str, value: serde_json::Value) -> Self {
        self.extra.insert(key.to_string(), value);
        self
    }
}
