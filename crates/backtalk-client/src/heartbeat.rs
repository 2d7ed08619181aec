//! Heartbeat emission while connected.
//!
//! The client pings unilaterally; there is no heartbeat acknowledgment in
//! this protocol. Liveness detection is transport-close driven, so a failed
//! send is absorbed (the close event that caused it arrives on its own).

use std::time::Duration;

use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Run the heartbeat loop.
///
/// At each `interval` tick, `send` is asked to emit one heartbeat frame.
/// The returned flag is advisory only — a `false` (not connected, channel
/// full) is logged at debug level and never retried. The loop exits only
/// when `cancel` fires, which the connection manager does on every
/// transition away from `Connected`.
pub async fn run_heartbeat<F>(interval: Duration, cancel: CancellationToken, send: F)
where
    F: Fn() -> bool + Send,
{
    let mut ticker = time::interval(interval);
    // Skip the immediate first tick
    let _ = ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if !send() {
                    debug!("heartbeat frame not sent; liveness is close-driven");
                }
            }
            () = cancel.cancelled() => {
                debug!("heartbeat stopped");
                return;
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
