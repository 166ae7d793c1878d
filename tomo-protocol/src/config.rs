//! Configuration for the messaging layer

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Protocol configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Message relay endpoint
    pub endpoint: String,

    /// Timeout for outbound queries that do not override it (ms)
    pub default_query_timeout_ms: u64,

    /// Timeout for `speak` queries, which wait for synthesis and playback (ms)
    pub speak_timeout_ms: u64,

    /// Seconds to wait for the relay connection
    pub connect_timeout_secs: u64,

    /// Outbound frames buffered before senders wait
    pub outbound_buffer: usize,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            endpoint: "ws://localhost:8080".to_string(),
            default_query_timeout_ms: 10_000,
            speak_timeout_ms: 100_000,
            connect_timeout_secs: 10,
            outbound_buffer: 256,
        }
    }
}

impl ProtocolConfig {
    pub fn default_query_timeout(&self) -> Duration {
        Duration::from_millis(self.default_query_timeout_ms)
    }

    pub fn speak_timeout(&self) -> Duration {
        Duration::from_millis(self.speak_timeout_ms)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if !(self.endpoint.starts_with("ws://") || self.endpoint.starts_with("wss://")) {
            return Err(format!("endpoint must be a ws:// or wss:// URL, got {}", self.endpoint));
        }

        if self.default_query_timeout_ms == 0 {
            return Err("default_query_timeout_ms must be > 0".to_string());
        }

        if self.speak_timeout_ms == 0 {
            return Err("speak_timeout_ms must be > 0".to_string());
        }

        if self.connect_timeout_secs == 0 {
            return Err("connect_timeout_secs must be > 0".to_string());
        }

        if self.outbound_buffer == 0 {
            return Err("outbound_buffer must be > 0".to_string());
        }

        Ok(())
    }
}
