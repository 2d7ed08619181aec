//! # backtalk-client
//!
//! Connection lifecycle and feedback coordination for the Backtalk client.
//!
//! - **[`connection`]**: WebSocket lifecycle — connect, heartbeat,
//!   exponential-backoff reconnect, inbound routing, explicit disconnect
//! - **[`coordinator`]**: the single-live-request feedback state machine
//! - **[`dispatch`]**: inbound frame parsing and the handler seam
//! - **[`heartbeat`]**: periodic liveness pings while connected
//! - **[`view`]**: the trait the external view layer implements
//!
//! Wiring order (one application context, no globals): construct a
//! [`ConnectionManager`], construct a [`FeedbackCoordinator`] over it and a
//! view, register the coordinator via
//! [`ConnectionManager::set_handler`], then `connect()`.

#![deny(unsafe_code)]

pub mod config;
pub mod connection;
pub mod coordinator;
pub mod dispatch;
pub mod heartbeat;
pub mod state;
pub mod view;

pub use config::ClientConfig;
pub use connection::ConnectionManager;
pub use coordinator::{FeedbackCoordinator, OutboundSink, RequestStatus};
pub use dispatch::{DispatchError, MessageHandler};
pub use state::ConnectionState;
pub use view::{DraftPayload, FeedbackView, NoticeLevel, OutcomeKind, PendingRequest};

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn re_exports_work() {
        let _config = ClientConfig::default();
        let _state = ConnectionState::Disconnected;
    }
}
