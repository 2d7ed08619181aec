//! Client configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the Backtalk client.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientConfig {
    /// WebSocket endpoint of the feedback server.
    pub server_url: String,
    /// Heartbeat interval in milliseconds.
    pub heartbeat_interval_ms: u64,
    /// Reconnect attempts before entering the terminal `Failed` state.
    pub max_reconnect_attempts: u32,
    /// Base delay for exponential reconnect backoff, in milliseconds.
    pub reconnect_base_delay_ms: u64,
    /// How long a terminal outcome stays visible before the UI resets to
    /// idle, in milliseconds.
    pub display_hold_ms: u64,
    /// Language code stamped into submitted feedback.
    pub language: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "ws://127.0.0.1:9999/ws".into(),
            heartbeat_interval_ms: 30_000,
            max_reconnect_attempts: 5,
            reconnect_base_delay_ms: 1000,
            display_hold_ms: 3000,
            language: "CN".into(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
