use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::error::{Error, Result};
use crate::paths::Paths;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeConfig {
    /// Number of most recent events retained in the history ring.
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
    /// Nested `emit` calls deeper than this are recorded but not fanned out.
    #[serde(default = "default_max_emit_depth")]
    pub max_emit_depth: usize,
}

fn default_history_capacity() -> usize {
    100
}

fn default_max_emit_depth() -> usize {
    8
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            history_capacity: default_history_capacity(),
            max_emit_depth: default_max_emit_depth(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamConfig {
    #[serde(default = "default_stream_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,
}

fn default_stream_endpoint() -> String {
    "/api/activities/stream".to_string()
}

fn default_reconnect_delay_ms() -> u64 {
    3000
}

fn default_buffer_capacity() -> usize {
    100
}

impl StreamConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            endpoint: default_stream_endpoint(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            buffer_capacity: default_buffer_capacity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionsConfig {
    /// How long a dispatched action's outcome stays pollable by request id.
    #[serde(default = "default_result_ttl_secs")]
    pub result_ttl_secs: u64,
}

fn default_result_ttl_secs() -> u64 {
    300
}

impl ActionsConfig {
    pub fn result_ttl(&self) -> Duration {
        Duration::from_secs(self.result_ttl_secs)
    }
}

impl Default for ActionsConfig {
    fn default() -> Self {
        Self {
            result_ttl_secs: default_result_ttl_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub bridge: BridgeConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub actions: ActionsConfig,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        match serde_json::from_str::<Config>(&content) {
            Ok(config) => Ok(config),
            Err(json_err) => {
                // Hand-edited files often carry comments or trailing commas.
                debug!(
                    error = %json_err,
                    path = %path.display(),
                    "Strict JSON parse failed, retrying as JSON5"
                );
                json5::from_str(&content)
                    .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
            }
        }
    }

    pub fn load_or_default(paths: &Paths) -> Result<Self> {
        let config_path = paths.config_file();
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }
}
