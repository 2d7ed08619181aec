//! Reconnect backoff calculation.
//!
//! A pure, deterministic policy: the delay before reconnect attempt `n`
//! (1-based) is `base * 2^(n-1)`. There is no jitter and no cap — callers
//! bound the total wait by capping the attempt count instead.

use std::time::Duration;

/// Default base delay in milliseconds (first retry waits this long).
pub const DEFAULT_BASE_DELAY_MS: u64 = 1000;

/// Exponential backoff policy for reconnect scheduling.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BackoffPolicy {
    base_delay_ms: u64,
}

impl BackoffPolicy {
    /// Create a policy with the given base delay.
    #[must_use]
    pub const fn new(base_delay_ms: u64) -> Self {
        Self { base_delay_ms }
    }

    /// The configured base delay in milliseconds.
    #[must_use]
    pub const fn base_delay_ms(&self) -> u64 {
        self.base_delay_ms
    }

    /// Delay before reconnect attempt `attempt` (1-based).
    ///
    /// `delay(1) == base`, doubling with each further attempt. Attempt `0`
    /// is treated as `1` — there is no zeroth retry. Overflow saturates
    /// rather than wrapping.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(63);
        Duration::from_millis(self.base_delay_ms.saturating_mul(1u64 << exponent))
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_DELAY_MS)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
