//! Sliding-window token usage accounting.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};

use super::types::{UsageRecord, UsageSnapshot};
use crate::prometheus;

/// Usage above this fraction of the per-window budget marks a peak period.
const PEAK_USAGE_RATIO: f64 = 0.8;

/// How long peak timestamps are retained for backoff biasing.
const PEAK_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Default)]
struct LedgerState {
    history: VecDeque<UsageRecord>,
    peaks: Vec<Instant>,
}

/// Sliding-window ledger of token usage against a per-window budget.
///
/// Records expire once they are `window` old; the sum of the remaining
/// records is the current usage. Moments where usage crossed 80% of the
/// budget are kept for 24h and bias future backoff upward.
pub struct UsageLedger {
    tokens_per_minute: u64,
    window: Duration,
    state: Mutex<LedgerState>,
}

impl UsageLedger {
    pub fn new(tokens_per_minute: u64, window: Duration) -> Self {
        Self { tokens_per_minute, window, state: Mutex::new(LedgerState::default()) }
    }

    /// Record token usage at the current time.
    pub fn record_usage(&self, tokens: u64) {
        let now = Instant::now();
        let mut state = self.state.lock();
        state.history.push_back(UsageRecord { timestamp: now, tokens });
        self.prune(&mut state, now);
        self.update_peaks(&mut state, now);
    }

    /// Total token usage within the current window.
    pub fn current_usage(&self) -> u64 {
        let now = Instant::now();
        let mut state = self.state.lock();
        self.prune(&mut state, now);
        Self::sum(&state)
    }

    /// Check whether `tokens` more would still fit in the budget.
    pub fn can_make_request(&self, tokens: u64) -> bool {
        self.current_usage() + tokens <= self.tokens_per_minute
    }

    /// Tokens still available in the current window.
    pub fn available_tokens(&self) -> u64 {
        self.tokens_per_minute.saturating_sub(self.current_usage())
    }

    /// Suspend until `tokens` more would fit in the budget.
    ///
    /// Sleeps until the oldest record exits the window, then re-prunes.
    /// Never waits when the ledger is empty: a single request larger than
    /// the whole budget is admitted immediately (and recorded afterwards).
    pub async fn wait_if_needed(&self, tokens: u64) {
        let deadline = {
            let now = Instant::now();
            let mut state = self.state.lock();
            self.prune(&mut state, now);
            self.update_peaks(&mut state, now);
            if Self::sum(&state) + tokens > self.tokens_per_minute {
                state.history.front().map(|oldest| oldest.timestamp + self.window)
            } else {
                None
            }
        };

        if let Some(deadline) = deadline {
            let now = Instant::now();
            if deadline > now {
                let wait_secs = (deadline - now).as_secs_f64();
                tracing::warn!(wait_secs, "rate limit reached, waiting for window to slide");
                prometheus::record_rate_limit_wait(wait_secs);
                sleep_until(deadline).await;

                let now = Instant::now();
                let mut state = self.state.lock();
                self.prune(&mut state, now);
            }
        }
    }

    /// Timestamps of recent peak-usage moments (for backoff biasing).
    pub fn recent_peaks(&self) -> Vec<Instant> {
        let now = Instant::now();
        let mut state = self.state.lock();
        state.peaks.retain(|peak| now.duration_since(*peak) <= PEAK_RETENTION);
        state.peaks.clone()
    }

    /// Point-in-time view of the ledger for stats display.
    pub fn snapshot(&self) -> UsageSnapshot {
        let now = Instant::now();
        let mut state = self.state.lock();
        self.prune(&mut state, now);
        let current_usage = Self::sum(&state);
        UsageSnapshot {
            current_usage,
            tokens_per_minute: self.tokens_per_minute,
            available_tokens: self.tokens_per_minute.saturating_sub(current_usage),
            records_in_window: state.history.len(),
            peaks_last_day: state.peaks.len(),
        }
    }

    /// Drop records that have slid out of the window.
    fn prune(&self, state: &mut LedgerState, now: Instant) {
        while state
            .history
            .front()
            .is_some_and(|record| now.duration_since(record.timestamp) >= self.window)
        {
            state.history.pop_front();
        }
    }

    /// Mark a peak if usage crossed the threshold; expire old peaks.
    fn update_peaks(&self, state: &mut LedgerState, now: Instant) {
        let current = Self::sum(state);
        if current as f64 > self.tokens_per_minute as f64 * PEAK_USAGE_RATIO {
            state.peaks.push(now);
        }
        state.peaks.retain(|peak| now.duration_since(*peak) <= PEAK_RETENTION);
    }

    fn sum(state: &LedgerState) -> u64 {
        state.history.iter().map(|record| record.tokens).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    fn ledger() -> UsageLedger {
        UsageLedger::new(100, Duration::from_secs(60))
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_accounting() {
        let ledger = ledger();
        ledger.record_usage(30);
        advance(Duration::from_secs(30)).await;
        ledger.record_usage(40);
        assert_eq!(ledger.current_usage(), 70);

        // First record expires at t=60
        advance(Duration::from_secs(30)).await;
        assert_eq!(ledger.current_usage(), 40);

        advance(Duration::from_secs(30)).await;
        assert_eq!(ledger.current_usage(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_can_make_request_and_available() {
        let ledger = ledger();
        assert!(ledger.can_make_request(100));
        ledger.record_usage(80);
        assert!(ledger.can_make_request(20));
        assert!(!ledger.can_make_request(21));
        assert_eq!(ledger.available_tokens(), 20);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_if_needed_under_budget_returns_immediately() {
        let ledger = ledger();
        ledger.record_usage(50);
        let start = Instant::now();
        ledger.wait_if_needed(50).await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_if_needed_empty_ledger_admits_oversized_request() {
        let ledger = ledger();
        let start = Instant::now();
        ledger.wait_if_needed(1_000_000).await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_if_needed_suspends_until_oldest_expires() {
        let ledger = ledger();
        ledger.record_usage(60);
        advance(Duration::from_secs(10)).await;
        ledger.record_usage(30);

        let start = Instant::now();
        ledger.wait_if_needed(20).await;

        // Oldest record was 10s old, so the wait is the remaining 50s.
        assert_eq!(start.elapsed(), Duration::from_secs(50));
        assert_eq!(ledger.current_usage(), 30);
    }

    #[tokio::test(start_paused = true)]
    async fn test_peaks_recorded_above_threshold_and_expire() {
        let ledger = ledger();
        ledger.record_usage(50);
        assert!(ledger.recent_peaks().is_empty());

        ledger.record_usage(40);
        assert_eq!(ledger.recent_peaks().len(), 1);

        advance(PEAK_RETENTION + Duration::from_secs(1)).await;
        assert!(ledger.recent_peaks().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_reflects_window() {
        let ledger = ledger();
        ledger.record_usage(90);
        let snapshot = ledger.snapshot();
        assert_eq!(snapshot.current_usage, 90);
        assert_eq!(snapshot.available_tokens, 10);
        assert_eq!(snapshot.records_in_window, 1);
        assert_eq!(snapshot.peaks_last_day, 1);
    }
}
