use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Scope watcher polling and buffering
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WatcherConfig {
    /// Interval between two scans of the membership markers (unit: milliseconds)
    /// Default: 50
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Per-watcher event channel capacity
    /// Default: 64
    #[serde(default = "default_event_buffer_size")]
    pub event_buffer_size: usize,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            event_buffer_size: default_event_buffer_size(),
        }
    }
}

impl WatcherConfig {
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "watcher.poll_interval_ms must be at least 1ms".into(),
            )));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(ConfigError::Message(
                "watcher.event_buffer_size must be greater than 0".into(),
            )));
        }

        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn default_poll_interval_ms() -> u64 {
    50
}
fn default_event_buffer_size() -> usize {
    64
}
