//! Adaptive backoff calculation.

use std::time::Duration;
use tokio::time::Instant;

use super::types::{HealthSnapshot, RetryState};

/// A peak within this window of now biases the backoff upward.
const PEAK_INFLUENCE: Duration = Duration::from_secs(30 * 60);

/// Multiplier applied while inside a peak-usage period.
const PEAK_MULTIPLIER: f64 = 1.5;

/// Multiplier applied while the server is overloaded.
const OVERLOAD_MULTIPLIER: f64 = 2.0;

/// Discount per consecutive success, capped at [`MAX_STREAK_DISCOUNT`].
const STREAK_DISCOUNT_STEP: f64 = 0.1;
const MAX_STREAK_DISCOUNT: f64 = 0.5;

/// Computes adaptive wait durations from retry, peak, and health signals.
///
/// The computation is a pure function of its inputs and the current time;
/// no request-level state is mutated. Order matters: the exponential base
/// is clamped to the maximum first, the peak and overload multipliers
/// compose on the clamped base, the success-streak discount applies last,
/// and the floor at the initial backoff applies after the discount.
#[derive(Debug, Clone)]
pub struct BackoffCalculator {
    initial: Duration,
    max: Duration,
    multiplier: f64,
}

impl BackoffCalculator {
    pub fn new(initial: Duration, max: Duration, multiplier: f64) -> Self {
        Self { initial, max, multiplier }
    }

    /// Compute the wait before the next attempt.
    ///
    /// A request with no retry state yet gets the initial backoff.
    pub fn compute(
        &self,
        state: Option<&RetryState>,
        health: &HealthSnapshot,
        peaks: &[Instant],
    ) -> Duration {
        let Some(state) = state else {
            return self.initial;
        };

        let base = (self.initial.as_secs_f64() * self.multiplier.powf(f64::from(state.retry_count)))
            .min(self.max.as_secs_f64());

        let now = Instant::now();
        let is_peak_time = peaks.iter().any(|peak| now.duration_since(*peak) <= PEAK_INFLUENCE);

        let mut backoff = base;
        if is_peak_time {
            backoff *= PEAK_MULTIPLIER;
        }
        if health.is_overloaded {
            backoff *= OVERLOAD_MULTIPLIER;
        }

        let discount = (f64::from(state.success_streak) * STREAK_DISCOUNT_STEP)
            .min(MAX_STREAK_DISCOUNT);
        backoff *= 1.0 - discount;

        Duration::from_secs_f64(backoff.max(self.initial.as_secs_f64()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calculator() -> BackoffCalculator {
        BackoffCalculator::new(Duration::from_secs(1), Duration::from_secs(60), 2.0)
    }

    fn healthy() -> HealthSnapshot {
        HealthSnapshot { is_overloaded: false, error_count: 0, seconds_since_last_error: None }
    }

    fn overloaded() -> HealthSnapshot {
        HealthSnapshot { is_overloaded: true, error_count: 3, seconds_since_last_error: Some(0) }
    }

    fn state(retry_count: u32, success_streak: u32) -> RetryState {
        RetryState { retry_count, success_streak, last_retry_time: Instant::now() }
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_state_yields_initial_backoff() {
        let calc = calculator();
        assert_eq!(calc.compute(None, &healthy(), &[]), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exponential_growth_clamped_at_max() {
        let calc = calculator();
        assert_eq!(calc.compute(Some(&state(0, 0)), &healthy(), &[]), Duration::from_secs(1));
        assert_eq!(calc.compute(Some(&state(3, 0)), &healthy(), &[]), Duration::from_secs(8));
        assert_eq!(calc.compute(Some(&state(10, 0)), &healthy(), &[]), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_peak_and_overload_multipliers_compose() {
        let calc = calculator();
        let peaks = vec![Instant::now()];

        assert_eq!(
            calc.compute(Some(&state(3, 0)), &healthy(), &peaks),
            Duration::from_secs(12)
        );
        assert_eq!(
            calc.compute(Some(&state(3, 0)), &overloaded(), &peaks),
            Duration::from_secs(24)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_peaks_have_no_influence() {
        let calc = calculator();
        let peaks = vec![Instant::now()];
        tokio::time::advance(PEAK_INFLUENCE + Duration::from_secs(1)).await;

        assert_eq!(calc.compute(Some(&state(3, 0)), &healthy(), &peaks), Duration::from_secs(8));
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_streak_discount_capped() {
        let calc = calculator();
        assert_eq!(
            calc.compute(Some(&state(3, 2)), &healthy(), &[]),
            Duration::from_secs_f64(8.0 * 0.8)
        );
        // Streaks beyond 5 are capped at a 50% discount
        assert_eq!(
            calc.compute(Some(&state(3, 50)), &healthy(), &[]),
            Duration::from_secs_f64(4.0)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_floor_applies_after_discount() {
        let calc = calculator();
        // Base 1s discounted to 0.5s would undercut the floor
        assert_eq!(calc.compute(Some(&state(0, 5)), &healthy(), &[]), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_monotonic_in_retry_count() {
        let calc = calculator();
        let mut previous = Duration::ZERO;
        for retry_count in 0..16 {
            let backoff = calc.compute(Some(&state(retry_count, 0)), &overloaded(), &[]);
            assert!(backoff >= previous, "backoff decreased at retry {}", retry_count);
            previous = backoff;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounds_hold_under_all_multipliers() {
        let calc = calculator();
        let peaks = vec![Instant::now()];
        for retry_count in 0..20 {
            for streak in 0..10 {
                let backoff =
                    calc.compute(Some(&state(retry_count, streak)), &overloaded(), &peaks);
                assert!(backoff >= Duration::from_secs(1));
                assert!(backoff <= Duration::from_secs_f64(60.0 * 2.0 * 1.5));
            }
        }
    }
}
