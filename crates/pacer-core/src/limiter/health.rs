//! Overload detection state machine.

use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;

use super::types::HealthSnapshot;
use crate::prometheus;

/// Status code the remote service uses to signal it is at capacity.
const OVERLOAD_STATUS: u16 = 529;

/// Accumulated errors at or above this count mark the server overloaded.
const OVERLOAD_ERROR_THRESHOLD: u32 = 3;

/// An error within this window keeps the server marked overloaded.
const RECENT_ERROR_WINDOW: Duration = Duration::from_secs(60);

/// After this long without errors, the error count decays by one per check.
const ERROR_DECAY_AFTER: Duration = Duration::from_secs(300);

#[derive(Debug)]
struct ServerHealth {
    last_check: Instant,
    is_overloaded: bool,
    error_count: u32,
    last_error_time: Option<Instant>,
}

/// Tracks whether the remote service is overloaded.
///
/// Two states, healthy and overloaded, re-evaluated at most once per
/// check interval (on every check while overloaded, so recovery is not
/// delayed). Health is advisory: callers may still attempt work while
/// overloaded; the retry coordinator uses it to pause before admission.
pub struct ServerHealthMonitor {
    check_interval: Duration,
    state: Mutex<ServerHealth>,
}

impl ServerHealthMonitor {
    pub fn new(check_interval: Duration) -> Self {
        Self {
            check_interval,
            state: Mutex::new(ServerHealth {
                last_check: Instant::now(),
                is_overloaded: false,
                error_count: 0,
                last_error_time: None,
            }),
        }
    }

    /// Record an error status from the remote service.
    ///
    /// Only the overload signal (529) moves this state machine; other
    /// codes are handled by the generic retry path.
    pub fn record_error(&self, status_code: u16) {
        if status_code != OVERLOAD_STATUS {
            return;
        }
        let mut state = self.state.lock();
        state.is_overloaded = true;
        state.error_count += 1;
        state.last_error_time = Some(Instant::now());
        tracing::warn!(error_count = state.error_count, "server overload detected");
        prometheus::record_overload_signal();
    }

    /// Re-evaluate and report server health. Returns `true` if healthy.
    pub fn check_status(&self) -> bool {
        let now = Instant::now();
        let mut state = self.state.lock();

        if now.duration_since(state.last_check) >= self.check_interval || state.is_overloaded {
            let time_since_error = state.last_error_time.map(|t| now.duration_since(t));

            // Errors age out: one decrement per check once the server has
            // been quiet long enough.
            if time_since_error.is_some_and(|elapsed| elapsed > ERROR_DECAY_AFTER) {
                state.error_count = state.error_count.saturating_sub(1);
            }

            state.last_check = now;
            state.is_overloaded = state.error_count >= OVERLOAD_ERROR_THRESHOLD
                || time_since_error.is_some_and(|elapsed| elapsed < RECENT_ERROR_WINDOW);
        }

        !state.is_overloaded
    }

    /// Current overload flag without re-evaluation.
    pub fn is_overloaded(&self) -> bool {
        self.state.lock().is_overloaded
    }

    /// Point-in-time view of the health state.
    pub fn snapshot(&self) -> HealthSnapshot {
        let now = Instant::now();
        let state = self.state.lock();
        HealthSnapshot {
            is_overloaded: state.is_overloaded,
            error_count: state.error_count,
            seconds_since_last_error: state
                .last_error_time
                .map(|t| now.duration_since(t).as_secs()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    fn monitor() -> ServerHealthMonitor {
        ServerHealthMonitor::new(Duration::from_secs(60))
    }

    #[tokio::test(start_paused = true)]
    async fn test_healthy_by_default() {
        let monitor = monitor();
        assert!(monitor.check_status());
        assert!(!monitor.is_overloaded());
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_overload_codes_are_ignored() {
        let monitor = monitor();
        monitor.record_error(500);
        monitor.record_error(429);
        assert!(monitor.check_status());
        assert_eq!(monitor.snapshot().error_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overload_signal_marks_overloaded() {
        let monitor = monitor();
        monitor.record_error(529);
        assert!(!monitor.check_status());
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_error_recovers_after_quiet_period() {
        let monitor = monitor();
        monitor.record_error(529);
        assert!(!monitor.check_status());

        advance(Duration::from_secs(301)).await;
        assert!(monitor.check_status());
        assert_eq!(monitor.snapshot().error_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_count_decays_one_per_spaced_check() {
        let monitor = monitor();
        for _ in 0..3 {
            monitor.record_error(529);
        }
        assert!(!monitor.check_status());
        assert_eq!(monitor.snapshot().error_count, 3);

        advance(Duration::from_secs(301)).await;
        assert!(monitor.check_status());
        assert_eq!(monitor.snapshot().error_count, 2);

        advance(Duration::from_secs(60)).await;
        assert!(monitor.check_status());
        assert_eq!(monitor.snapshot().error_count, 1);

        advance(Duration::from_secs(60)).await;
        assert!(monitor.check_status());
        assert_eq!(monitor.snapshot().error_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_check_status_idempotent_within_interval() {
        let monitor = monitor();
        monitor.record_error(529);
        advance(Duration::from_secs(301)).await;

        let first = monitor.check_status();
        let count_after_first = monitor.snapshot().error_count;
        let second = monitor.check_status();

        assert_eq!(first, second);
        assert_eq!(monitor.snapshot().error_count, count_after_first);
    }
}
