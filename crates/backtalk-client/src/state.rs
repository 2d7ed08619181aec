//! Connection lifecycle states.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The lifecycle state of the server connection.
///
/// Transitions are driven exclusively by the connection manager; observers
/// receive the new state through its watch channel on every change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No transport. Either never connected or cleanly closed.
    Disconnected,
    /// A transport open is in flight.
    Connecting,
    /// Transport open; heartbeat running.
    Connected,
    /// Waiting out a backoff delay before the next attempt.
    Reconnecting,
    /// Reconnect attempts exhausted. Terminal until an explicit
    /// `connect()` call.
    Failed,
}

impl ConnectionState {
    /// Status label shown to observers and logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Failed => "failed",
        }
    }

    /// Whether an open or in-flight transport exists.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Connecting | Self::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
