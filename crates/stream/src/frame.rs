use gatewatch_core::ActivityItem;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

/// One message on the activity push stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Frame {
    /// Handshake sent once per connection.
    Connected,
    /// Snapshot of recent activities, newest first.
    Batch { activities: Vec<ActivityItem> },
    /// A single freshly created activity.
    New { activity: ActivityItem },
}

impl Frame {
    /// Classify a raw frame. Unknown types and unparseable text yield `None`.
    ///
    /// Inside a batch, items that do not parse are dropped individually.
    pub fn parse(text: &str) -> Option<Frame> {
        let value: Value = match serde_json::from_str(text) {
            Ok(v) => v,
            Err(e) => {
                debug!(error = %e, "Ignoring non-JSON frame");
                return None;
            }
        };

        match value.get("type").and_then(|t| t.as_str()) {
            Some("connected") => Some(Frame::Connected),
            Some("batch") => {
                let items = value.get("activities")?.as_array()?;
                let activities = items
                    .iter()
                    .filter_map(|item| match serde_json::from_value::<ActivityItem>(item.clone()) {
                        Ok(activity) => Some(activity),
                        Err(e) => {
                            debug!(error = %e, "Dropping malformed batch item");
                            None
                        }
                    })
                    .collect();
                Some(Frame::Batch { activities })
            }
            Some("new") => {
                let activity = serde_json::from_value(value.get("activity")?.clone()).ok()?;
                Some(Frame::New { activity })
            }
            other => {
                debug!(frame_type = ?other, "Ignoring unknown frame type");
                None
            }
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
