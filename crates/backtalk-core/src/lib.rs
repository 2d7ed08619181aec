//! # backtalk-core
//!
//! Foundation types for the Backtalk feedback client.
//!
//! This crate provides the shared vocabulary the other Backtalk crates
//! depend on:
//!
//! - **Branded IDs**: [`RequestId`] as a newtype for type safety
//! - **Protocol**: [`ServerMessage`] / [`ClientMessage`] tagged unions
//!   covering every frame on the wire, plus [`ImageAttachment`]
//! - **Backoff**: [`BackoffPolicy`] — pure exponential reconnect delays

#![deny(unsafe_code)]

pub mod backoff;
pub mod ids;
pub mod protocol;

pub use backoff::BackoffPolicy;
pub use ids::RequestId;
pub use protocol::{ClientMessage, ImageAttachment, ServerMessage};

/// Current UTC time as an RFC 3339 timestamp string.
///
/// Every outbound frame carries one of these; the server does the same on
/// inbound frames.
#[must_use]
pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
