//! The retry loop coupling health, admission, backoff, and usage signals.

use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};

use pacer_types::{ErrorSignal, PacerConfig};

use super::backoff::BackoffCalculator;
use super::gate::ConcurrencyGate;
use super::health::ServerHealthMonitor;
use super::ledger::UsageLedger;
use super::types::RetryState;
use crate::prometheus;

/// Sweep the retry-state map once it grows past this many entries.
const RETRY_STATE_CLEANUP_THRESHOLD: usize = 1024;

/// Entries idle longer than this are dropped by the sweep.
const RETRY_STATE_EXPIRY: Duration = Duration::from_secs(3600);

/// Orchestrates an operation through health check, admission, execution,
/// and outcome recording.
///
/// Per request id the attempt sequence is strictly sequential. The
/// coordinator does not deduplicate concurrent `run` calls sharing an id;
/// callers are expected to serialize retries per id.
pub struct RetryCoordinator {
    max_retries: u32,
    overload_cooldown: Duration,
    backoff: BackoffCalculator,
    retry_states: DashMap<String, RetryState>,
    ledger: Arc<UsageLedger>,
    health: Arc<ServerHealthMonitor>,
    gate: Arc<ConcurrencyGate>,
}

impl RetryCoordinator {
    pub fn new(
        config: &PacerConfig,
        ledger: Arc<UsageLedger>,
        health: Arc<ServerHealthMonitor>,
        gate: Arc<ConcurrencyGate>,
    ) -> Self {
        Self {
            max_retries: config.max_retries,
            overload_cooldown: config.overload_cooldown(),
            backoff: BackoffCalculator::new(
                config.initial_backoff(),
                config.max_backoff(),
                config.backoff_multiplier,
            ),
            retry_states: DashMap::new(),
            ledger,
            health,
            gate,
        }
    }

    /// Run `operation`, retrying failures with adaptive backoff.
    ///
    /// While the server is marked overloaded the loop pauses for the
    /// configured cooldown without consuming an attempt. Each attempt
    /// occupies an admission slot only for the duration of the call; the
    /// slot is returned on success, failure, and cancellation alike.
    ///
    /// Failures carrying a classifiable status code (via [`ErrorSignal`])
    /// are forwarded to the health monitor. Once `max_retries` is
    /// exceeded, the final operation error is returned unchanged.
    ///
    /// Every sleep and wait in here is a cancellation point: dropping the
    /// returned future abandons the request without leaking a slot.
    pub async fn run<T, E, F, Fut>(&self, request_id: &str, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: ErrorSignal,
    {
        self.cleanup_if_needed();
        self.retry_states.entry(request_id.to_string()).or_insert_with(RetryState::new);

        loop {
            // Health is advisory: pause before admission, don't count an attempt.
            if !self.health.check_status() {
                tracing::warn!(
                    request_id,
                    cooldown_secs = self.overload_cooldown.as_secs_f64(),
                    "server overloaded, pausing before admission"
                );
                sleep(self.overload_cooldown).await;
                continue;
            }

            let result = {
                let _slot = self.gate.acquire().await;
                operation().await
            };

            match result {
                Ok(value) => {
                    if let Some(mut state) = self.retry_states.get_mut(request_id) {
                        state.success_streak += 1;
                        state.retry_count = 0;
                    }
                    return Ok(value);
                },
                Err(error) => {
                    let attempt = {
                        let mut state = self
                            .retry_states
                            .entry(request_id.to_string())
                            .or_insert_with(RetryState::new);
                        state.retry_count += 1;
                        state.success_streak = 0;
                        state.retry_count
                    };

                    if let Some(code) = error.status_code() {
                        self.health.record_error(code);
                    }

                    if attempt > self.max_retries {
                        tracing::error!(
                            request_id,
                            attempts = attempt,
                            max_retries = self.max_retries,
                            %error,
                            "maximum retry count exceeded"
                        );
                        prometheus::record_retry_exhausted();
                        return Err(error);
                    }

                    let backoff = {
                        let state = self.retry_states.get(request_id);
                        self.backoff.compute(
                            state.as_deref(),
                            &self.health.snapshot(),
                            &self.ledger.recent_peaks(),
                        )
                    };
                    tracing::warn!(
                        request_id,
                        attempt,
                        max_retries = self.max_retries,
                        backoff_secs = backoff.as_secs_f64(),
                        %error,
                        "request failed, retrying"
                    );
                    prometheus::record_retry(backoff.as_secs_f64());
                    sleep(backoff).await;

                    if let Some(mut state) = self.retry_states.get_mut(request_id) {
                        state.last_retry_time = Instant::now();
                    }
                },
            }
        }
    }

    /// Retry bookkeeping for a request id, if any.
    pub fn retry_state(&self, request_id: &str) -> Option<RetryState> {
        self.retry_states.get(request_id).map(|state| state.clone())
    }

    /// Drop the retry bookkeeping for a request id.
    pub fn clear_retry_state(&self, request_id: &str) -> bool {
        self.retry_states.remove(request_id).is_some()
    }

    /// Size-triggered sweep keeping the per-request map bounded in
    /// long-running processes.
    fn cleanup_if_needed(&self) {
        if self.retry_states.len() > RETRY_STATE_CLEANUP_THRESHOLD {
            let now = Instant::now();
            self.retry_states
                .retain(|_, state| now.duration_since(state.last_retry_time) < RETRY_STATE_EXPIRY);
        }
    }
}
