//! Feedback request coordination.
//!
//! Tracks the single live feedback request from arrival to resolution:
//!
//! - `request_feedback` installs a new live request (last request wins —
//!   a replaced request is discarded silently, no cancel is emitted)
//! - a local submit emits `feedback_submit` and declares success
//!   optimistically as soon as the transport accepts the frame
//! - a local cancel emits `feedback_cancel` and discards immediately
//! - `request_timeout` / `request_cancelled` show the outcome, then
//!   discard after the display hold
//! - `clear_interface` is a forced reset that wins over everything
//!
//! Display-hold timers capture the target request id and compare it to the
//! current live id when they fire; a stale timer is a silent no-op.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use backtalk_core::{now_rfc3339, ClientMessage, RequestId, ServerMessage};

use crate::config::ClientConfig;
use crate::dispatch::MessageHandler;
use crate::view::{FeedbackView, NoticeLevel, OutcomeKind, PendingRequest};

/// Accepts outbound frames for transmission.
///
/// Implemented by the connection manager; the returned flag reports whether
/// the frame was accepted for transmission (`false` when not connected or
/// the frame could not be serialized).
pub trait OutboundSink: Send + Sync {
    /// Enqueue one frame. Never blocks, never panics.
    fn send(&self, message: &ClientMessage) -> bool;
}

/// Lifecycle status of the live feedback request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestStatus {
    /// Waiting for the user to submit or cancel.
    AwaitingInput,
    /// A submit is being handed to the transport.
    Submitting,
    /// Submitted successfully (optimistically — no server ack awaited).
    Resolved,
    /// Cancelled locally or by the server.
    Cancelled,
    /// Expired server-side.
    TimedOut,
}

#[derive(Clone, Debug)]
struct LiveRequest {
    id: RequestId,
    timeout_secs: u64,
    issued_at: String,
    status: RequestStatus,
}

struct CoordInner {
    sink: Arc<dyn OutboundSink>,
    view: Arc<dyn FeedbackView>,
    live: Mutex<Option<LiveRequest>>,
    language: String,
    display_hold: Duration,
}

/// Owns the single-live-request state machine.
///
/// One instance exists per application context; clones share state.
#[derive(Clone)]
pub struct FeedbackCoordinator {
    inner: Arc<CoordInner>,
}

impl FeedbackCoordinator {
    /// Create a coordinator wired to the given sink and view.
    pub fn new(
        sink: Arc<dyn OutboundSink>,
        view: Arc<dyn FeedbackView>,
        config: &ClientConfig,
    ) -> Self {
        Self {
            inner: Arc::new(CoordInner {
                sink,
                view,
                live: Mutex::new(None),
                language: config.language.clone(),
                display_hold: Duration::from_millis(config.display_hold_ms),
            }),
        }
    }

    /// Id of the live request, if any.
    #[must_use]
    pub fn live_request_id(&self) -> Option<RequestId> {
        self.inner.live.lock().as_ref().map(|r| r.id.clone())
    }

    /// Status of the live request, if any.
    #[must_use]
    pub fn status(&self) -> Option<RequestStatus> {
        self.inner.live.lock().as_ref().map(|r| r.status)
    }

    /// Submit the current draft for the live request.
    ///
    /// Guarded: a no-op without a live request awaiting input, and a
    /// reject-with-warning when the draft is empty (no text, no images).
    /// On transport refusal the request reverts to awaiting input so the
    /// user can retry; on acceptance the request resolves optimistically
    /// and the view returns to idle after the display hold.
    pub fn submit(&self) {
        let inner = &self.inner;
        let draft = inner.view.draft();

        let (id, frame) = {
            let mut live = inner.live.lock();
            let Some(request) = live.as_mut() else {
                debug!("submit ignored: no live feedback request");
                return;
            };
            if request.status != RequestStatus::AwaitingInput {
                debug!(status = ?request.status, "submit ignored: request not awaiting input");
                return;
            }

            let text = draft.text.trim();
            if text.is_empty() && draft.images.is_empty() {
                drop(live);
                inner
                    .view
                    .notify(NoticeLevel::Warning, "enter feedback text or attach an image");
                return;
            }

            request.status = RequestStatus::Submitting;
            let id = request.id.clone();
            let frame = ClientMessage::FeedbackSubmit {
                request_id: id.clone(),
                text: text.to_owned(),
                images: draft.images,
                auto_append: draft.auto_append,
                language: inner.language.clone(),
                timestamp: now_rfc3339(),
            };
            (id, frame)
        };

        let sent = inner.sink.send(&frame);

        let mut live = inner.live.lock();
        // A clear_interface may have landed while the frame was in flight.
        let Some(request) = live.as_mut().filter(|r| r.id == id) else {
            debug!(request_id = %id, "request vanished during submit");
            return;
        };

        if !sent {
            request.status = RequestStatus::AwaitingInput;
            drop(live);
            warn!(request_id = %id, "feedback submit not delivered");
            inner.view.notify(
                NoticeLevel::Error,
                "sending failed, check the connection and retry",
            );
            return;
        }

        request.status = RequestStatus::Resolved;
        drop(live);

        info!(request_id = %id, "feedback submitted");
        inner.view.clear_draft();
        inner
            .view
            .show_outcome(OutcomeKind::Success, "submitted", "feedback delivered");
        inner.view.notify(NoticeLevel::Success, "feedback submitted");
        schedule_discard(inner, id);
    }

    /// Cancel the live request.
    ///
    /// A no-op without a live request awaiting input (in particular while a
    /// submission is in flight or holding its success display). Delivery of
    /// the cancel frame is best-effort; the local discard happens
    /// regardless.
    pub fn cancel(&self) {
        let inner = &self.inner;

        let id = {
            let mut live = inner.live.lock();
            let Some(request) = live.as_ref() else {
                debug!("cancel ignored: no live feedback request");
                return;
            };
            if request.status != RequestStatus::AwaitingInput {
                debug!(status = ?request.status, "cancel ignored: request not awaiting input");
                return;
            }
            let id = request.id.clone();
            *live = None;
            id
        };

        let frame = ClientMessage::FeedbackCancel {
            request_id: id.clone(),
            timestamp: now_rfc3339(),
        };
        if !inner.sink.send(&frame) {
            warn!(request_id = %id, "cancel frame not delivered");
        }

        info!(request_id = %id, "feedback request cancelled locally");
        inner.view.clear_draft();
        inner.view.show_idle();
        inner.view.notify(NoticeLevel::Info, "feedback cancelled");
    }

    // ── Inbound frames ──────────────────────────────────────────────────────

    fn on_request_feedback(&self, id: RequestId, timeout_secs: u64, issued_at: String) {
        let inner = &self.inner;
        let meta = {
            let mut live = inner.live.lock();
            if let Some(previous) = live.as_ref() {
                info!(
                    previous_id = %previous.id,
                    new_id = %id,
                    "replacing live feedback request"
                );
            }
            let request = LiveRequest {
                id,
                timeout_secs,
                issued_at,
                status: RequestStatus::AwaitingInput,
            };
            let meta = PendingRequest {
                id: request.id.clone(),
                timeout_secs: request.timeout_secs,
                issued_at: request.issued_at.clone(),
            };
            *live = Some(request);
            meta
        };

        info!(request_id = %meta.id, timeout_secs = meta.timeout_secs, "feedback request received");
        inner.view.clear_draft();
        inner.view.show_pending(&meta);
    }

    fn on_feedback_response(&self, status: &str, message: &str) {
        let inner = &self.inner;
        let id = {
            let live = inner.live.lock();
            match live.as_ref() {
                Some(request) => request.id.clone(),
                None => {
                    // Past the optimistic-success window: informational only.
                    debug!(status, message, "feedback response after discard");
                    return;
                }
            }
        };

        if status == "success" {
            inner
                .view
                .show_outcome(OutcomeKind::Success, "submitted", message);
            inner.view.notify(NoticeLevel::Success, "feedback accepted");
        } else {
            inner.view.show_outcome(OutcomeKind::Error, "error", message);
            inner
                .view
                .notify(NoticeLevel::Error, &format!("submit failed: {message}"));
        }
        schedule_discard(inner, id);
    }

    fn on_request_timeout(&self, message: &str) {
        self.finish_from_server(RequestStatus::TimedOut, "timed out", message, NoticeLevel::Warning);
    }

    fn on_request_cancelled(&self, message: &str) {
        self.finish_from_server(RequestStatus::Cancelled, "cancelled", message, NoticeLevel::Info);
    }

    /// Server-driven terminal outcome: mark, display through the hold
    /// window, then discard.
    fn finish_from_server(
        &self,
        status: RequestStatus,
        title: &str,
        message: &str,
        level: NoticeLevel,
    ) {
        let inner = &self.inner;
        let id = {
            let mut live = inner.live.lock();
            let Some(request) = live.as_mut() else {
                debug!(?status, "server outcome with no live request");
                return;
            };
            request.status = status;
            request.id.clone()
        };

        info!(request_id = %id, ?status, "feedback request finished by server");
        inner.view.show_outcome(OutcomeKind::Error, title, message);
        inner.view.notify(level, title);
        schedule_discard(inner, id);
    }

    fn on_clear_interface(&self) {
        let inner = &self.inner;
        let had_live = {
            let mut live = inner.live.lock();
            live.take().is_some()
        };

        info!(had_live, "interface cleared by server");
        inner.view.clear_draft();
        inner.view.show_idle();
    }
}

impl MessageHandler for FeedbackCoordinator {
    fn handle(&self, message: ServerMessage) {
        match message {
            ServerMessage::RequestFeedback {
                id,
                timeout,
                timestamp,
            } => self.on_request_feedback(id, timeout, timestamp),
            ServerMessage::FeedbackResponse { status, message } => {
                self.on_feedback_response(&status, &message);
            }
            ServerMessage::RequestTimeout { message } => self.on_request_timeout(&message),
            ServerMessage::RequestCancelled { message } => self.on_request_cancelled(&message),
            ServerMessage::ClearInterface => self.on_clear_interface(),
            ServerMessage::ConnectionEstablished { message, .. } => {
                debug!(message, "server connection banner");
            }
            ServerMessage::HeartbeatRequest { .. } | ServerMessage::HeartbeatResponse { .. } => {
                debug!("server heartbeat chatter dropped");
            }
            ServerMessage::Error { message } => {
                warn!(message, "server reported an error");
                self.inner
                    .view
                    .notify(NoticeLevel::Error, &format!("server error: {message}"));
            }
        }
    }
}

/// Discard `id` after the display hold, unless a newer request (or a
/// forced clear) got there first.
fn schedule_discard(inner: &Arc<CoordInner>, id: RequestId) {
    let inner = Arc::clone(inner);
    drop(tokio::spawn(async move {
        tokio::time::sleep(inner.display_hold).await;
        let mut live = inner.live.lock();
        let is_current = matches!(live.as_ref(), Some(request) if request.id == id);
        if is_current {
            *live = None;
            drop(live);
            inner.view.show_idle();
        } else {
            debug!(request_id = %id, "display-hold timer fired for a stale request");
        }
    }));
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
