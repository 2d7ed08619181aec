//! Wire protocol frames.
//!
//! Every frame is a JSON object whose `type` field discriminates the
//! variant, so both directions are modeled as internally tagged enums:
//!
//! - **[`ServerMessage`]**: frames the server pushes to the client
//!   (feedback requests, outcome notices, interface resets, heartbeat
//!   chatter).
//! - **[`ClientMessage`]**: frames the client emits (submit, cancel,
//!   heartbeat).
//!
//! Field names are the wire contract — renames like `uploadTime` are
//! deliberate and must not be "fixed".

use serde::{Deserialize, Serialize};

use crate::ids::RequestId;

/// Timeout applied to a feedback request when the server omits one.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 600;

fn default_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

// ─────────────────────────────────────────────────────────────────────────────
// ServerMessage — inbound frames
// ─────────────────────────────────────────────────────────────────────────────

/// Frames pushed by the server.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// A new feedback request. Replaces any request currently live.
    #[serde(rename = "request_feedback")]
    RequestFeedback {
        /// Server-assigned request id.
        id: RequestId,
        /// Seconds the server will wait for a response (default 600).
        #[serde(default = "default_timeout")]
        timeout: u64,
        /// When the request was issued (RFC 3339).
        #[serde(default)]
        timestamp: String,
    },

    /// Server verdict on a submitted feedback. Advisory only — local
    /// success is declared optimistically at send time.
    #[serde(rename = "feedback_response")]
    FeedbackResponse {
        /// `"success"` or an error label.
        #[serde(default)]
        status: String,
        /// Human-readable detail.
        #[serde(default)]
        message: String,
    },

    /// The live request expired server-side.
    #[serde(rename = "request_timeout")]
    RequestTimeout {
        /// Human-readable detail.
        #[serde(default)]
        message: String,
    },

    /// The live request was cancelled server-side.
    #[serde(rename = "request_cancelled")]
    RequestCancelled {
        /// Human-readable detail.
        #[serde(default)]
        message: String,
    },

    /// Forced reset: discard any live request and return to idle.
    #[serde(rename = "clear_interface")]
    ClearInterface,

    /// Handshake banner sent right after the connection is accepted.
    #[serde(rename = "connection_established")]
    ConnectionEstablished {
        /// When the server accepted the connection (RFC 3339).
        #[serde(default)]
        timestamp: String,
        /// Greeting text.
        #[serde(default)]
        message: String,
    },

    /// Server-initiated heartbeat probe. Logged and dropped — liveness is
    /// close-driven, not ack-driven.
    #[serde(rename = "heartbeat_request")]
    HeartbeatRequest {
        /// When the probe was sent (RFC 3339).
        #[serde(default)]
        timestamp: String,
    },

    /// Server acknowledgment of a client heartbeat. Logged and dropped.
    #[serde(rename = "heartbeat_response")]
    HeartbeatResponse {
        /// When the ack was sent (RFC 3339).
        #[serde(default)]
        timestamp: String,
    },

    /// Server-reported protocol error.
    #[serde(rename = "error")]
    Error {
        /// What the server objected to.
        #[serde(default)]
        message: String,
    },
}

impl ServerMessage {
    /// The wire `type` tag of this frame.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RequestFeedback { .. } => "request_feedback",
            Self::FeedbackResponse { .. } => "feedback_response",
            Self::RequestTimeout { .. } => "request_timeout",
            Self::RequestCancelled { .. } => "request_cancelled",
            Self::ClearInterface => "clear_interface",
            Self::ConnectionEstablished { .. } => "connection_established",
            Self::HeartbeatRequest { .. } => "heartbeat_request",
            Self::HeartbeatResponse { .. } => "heartbeat_response",
            Self::Error { .. } => "error",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ClientMessage — outbound frames
// ─────────────────────────────────────────────────────────────────────────────

/// Frames emitted by the client.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Deliver the user's feedback for the live request.
    #[serde(rename = "feedback_submit")]
    FeedbackSubmit {
        /// Id of the request being answered.
        request_id: RequestId,
        /// Feedback text (may be empty when images are attached).
        text: String,
        /// Attached images.
        images: Vec<ImageAttachment>,
        /// Whether the server should append its canned follow-up prompt.
        auto_append: bool,
        /// UI language code the feedback was written under.
        language: String,
        /// When the user submitted (RFC 3339).
        timestamp: String,
    },

    /// Decline the live request.
    #[serde(rename = "feedback_cancel")]
    FeedbackCancel {
        /// Id of the request being declined.
        request_id: RequestId,
        /// When the user cancelled (RFC 3339).
        timestamp: String,
    },

    /// Periodic liveness ping.
    #[serde(rename = "heartbeat")]
    Heartbeat {
        /// When the ping was emitted (RFC 3339).
        timestamp: String,
    },
}

impl ClientMessage {
    /// The wire `type` tag of this frame.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::FeedbackSubmit { .. } => "feedback_submit",
            Self::FeedbackCancel { .. } => "feedback_cancel",
            Self::Heartbeat { .. } => "heartbeat",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ImageAttachment
// ─────────────────────────────────────────────────────────────────────────────

/// An image carried inside a `feedback_submit` frame.
///
/// The `type` and `uploadTime` field names match what the server stores
/// verbatim.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageAttachment {
    /// Original file name.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    /// MIME type, e.g. `image/png`.
    #[serde(rename = "type")]
    pub mime_type: String,
    /// Base64 data URL (`data:image/png;base64,...`).
    pub data: String,
    /// When the image was attached (RFC 3339).
    #[serde(rename = "uploadTime")]
    pub upload_time: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
