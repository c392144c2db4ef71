//! Limiter state types and snapshots.

use serde::Serialize;
use tokio::time::Instant;

/// A single token-usage entry in the sliding window.
#[derive(Debug, Clone, Copy)]
pub(crate) struct UsageRecord {
    pub timestamp: Instant,
    pub tokens: u64,
}

/// Per-request retry bookkeeping.
///
/// Created lazily on the first `run` for a request id, reset (not removed)
/// on success so the success streak survives across calls.
#[derive(Debug, Clone)]
pub struct RetryState {
    /// Consecutive failures for the current attempt sequence
    pub retry_count: u32,
    /// Consecutive successful completions for this request id
    pub success_streak: u32,
    /// When the last retry was scheduled (also used for staleness sweeps)
    pub last_retry_time: Instant,
}

impl RetryState {
    pub(crate) fn new() -> Self {
        Self { retry_count: 0, success_streak: 0, last_retry_time: Instant::now() }
    }
}

/// Point-in-time view of the usage ledger, for stats endpoints and logging.
#[derive(Debug, Clone, Serialize)]
pub struct UsageSnapshot {
    pub current_usage: u64,
    pub tokens_per_minute: u64,
    pub available_tokens: u64,
    pub records_in_window: usize,
    pub peaks_last_day: usize,
}

/// Point-in-time view of the server health state.
#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub is_overloaded: bool,
    pub error_count: u32,
    pub seconds_since_last_error: Option<u64>,
}
