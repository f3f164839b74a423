pub mod activity;
pub mod config;
pub mod error;
pub mod event;
pub mod paths;

pub use activity::ActivityItem;
pub use config::{ActionsConfig, BridgeConfig, Config, StreamConfig};
pub use error::{Error, Result};
pub use event::{EventKind, EventPayload, RuntimeEvent};
pub use paths::Paths;
