//! Inbound frame dispatch — parses raw text into the [`ServerMessage`]
//! tagged union and hands it to the registered handler.
//!
//! The dispatcher is deliberately silent: classification errors are
//! returned to the caller (the connection manager), which logs and drops.
//! There is no catch-all handler and no default routing.

use serde_json::Value;
use thiserror::Error;

use backtalk_core::ServerMessage;

/// Why an inbound frame could not be routed.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The frame was not valid JSON.
    #[error("malformed frame: {0}")]
    Malformed(#[source] serde_json::Error),
    /// The frame parsed but carried a type tag no handler covers (or a
    /// known tag with an incompatible body).
    #[error("no handler for message type `{kind}`: {source}")]
    UnknownType {
        /// The wire `type` tag, or `<missing>` when absent.
        kind: String,
        /// The underlying deserialization failure.
        #[source]
        source: serde_json::Error,
    },
}

/// Receives every successfully parsed inbound frame.
///
/// Implementations run to completion on the reader task; panics are the
/// implementor's bug, not absorbed here.
pub trait MessageHandler: Send + Sync {
    /// Handle one inbound frame.
    fn handle(&self, message: ServerMessage);
}

/// Parse one raw text frame into a [`ServerMessage`].
///
/// Distinguishes malformed JSON from an unrecognized (or ill-shaped) frame
/// so the caller can log the two protocol-error cases separately.
pub fn parse_frame(text: &str) -> Result<ServerMessage, DispatchError> {
    let value: Value = serde_json::from_str(text).map_err(DispatchError::Malformed)?;
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or("<missing>")
        .to_owned();
    serde_json::from_value(value).map_err(|source| DispatchError::UnknownType { kind, source })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
