//! Hub configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Broadcast hub configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    /// How long a broadcast waits on one observer's full queue (ms).
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,
    /// Per-observer queue capacity, in frames.
    #[serde(default = "default_observer_buffer")]
    pub observer_buffer: usize,
    /// Maximum concurrently registered observers.
    #[serde(default = "default_max_observers")]
    pub max_observers: usize,
    /// Longest a single socket write to an observer may take (ms).
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,
}

fn default_send_timeout_ms() -> u64 {
    250
}

fn default_observer_buffer() -> usize {
    64
}

fn default_max_observers() -> usize {
    256
}

fn default_write_timeout_ms() -> u64 {
    10_000
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            send_timeout_ms: default_send_timeout_ms(),
            observer_buffer: default_observer_buffer(),
            max_observers: default_max_observers(),
            write_timeout_ms: default_write_timeout_ms(),
        }
    }
}

impl HubConfig {
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}
