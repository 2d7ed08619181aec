//! The seam between the coordinator and the view layer.
//!
//! Rendering, draft editing, and preference persistence live outside this
//! crate; the coordinator drives them exclusively through [`FeedbackView`].

use backtalk_core::{ImageAttachment, RequestId};

/// Metadata of the feedback request currently awaiting input.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingRequest {
    /// Server-assigned request id.
    pub id: RequestId,
    /// Seconds the server will wait for a response.
    pub timeout_secs: u64,
    /// Server-side issue time (RFC 3339, as received).
    pub issued_at: String,
}

/// What the user has drafted so far.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DraftPayload {
    /// Feedback text.
    pub text: String,
    /// Attached images.
    pub images: Vec<ImageAttachment>,
    /// Whether the server should append its canned follow-up prompt.
    pub auto_append: bool,
}

/// Flavor of a terminal outcome display.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutcomeKind {
    /// The exchange completed successfully.
    Success,
    /// The exchange ended in an error, timeout, or cancellation.
    Error,
}

/// Severity of a transient notice.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeLevel {
    /// Informational.
    Info,
    /// Positive confirmation.
    Success,
    /// Something the user should look at.
    Warning,
    /// Something went wrong.
    Error,
}

/// View collaborator driven by the coordinator.
///
/// Implementations must be cheap and non-blocking: every method is called
/// from protocol tasks between awaits.
pub trait FeedbackView: Send + Sync {
    /// A feedback request arrived; show its metadata and open the draft.
    fn show_pending(&self, request: &PendingRequest);

    /// Show a terminal outcome (kept visible through the display hold).
    fn show_outcome(&self, kind: OutcomeKind, title: &str, message: &str);

    /// Return to the idle/waiting display.
    fn show_idle(&self);

    /// Surface a transient notice.
    fn notify(&self, level: NoticeLevel, text: &str);

    /// Snapshot the current draft.
    fn draft(&self) -> DraftPayload;

    /// Discard the draft (text and images; preferences survive).
    fn clear_draft(&self);
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
