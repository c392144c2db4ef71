//! Adaptive rate limiting and retry coordination.
//!
//! This module gates outbound calls to a capacity-constrained remote
//! service. Four components compose into a retry loop:
//!
//! - [`UsageLedger`] - sliding-window token usage accounting
//! - [`ServerHealthMonitor`] - overload detection driven by error signals
//! - [`BackoffCalculator`] - adaptive wait durations from retry/peak/health signals
//! - [`ConcurrencyGate`] - bounded admission over simultaneous in-flight calls
//!
//! [`RetryCoordinator`] couples them; [`RateLimiter`] is the composition
//! root collaborators hold. Typical flow: `wait_if_needed` before issuing
//! work, `run` around the outbound call, `record_usage` after it.
//!
//! Usage and retry state live in memory only; nothing survives a process
//! restart, and quota is not shared across processes.

mod backoff;
mod coordinator;
mod gate;
mod health;
mod ledger;
mod types;


pub use backoff::BackoffCalculator;
pub use coordinator::RetryCoordinator;
pub use gate::{ConcurrencyGate, SlotGuard};
pub use health::ServerHealthMonitor;
pub use ledger::UsageLedger;
pub use types::{HealthSnapshot, RetryState, UsageSnapshot};

use pacer_types::{ErrorSignal, PacerConfig};
use std::future::Future;
use std::sync::Arc;

/// The rate-limiting and retry subsystem, assembled.
pub struct RateLimiter {
    config: PacerConfig,
    ledger: Arc<UsageLedger>,
    health: Arc<ServerHealthMonitor>,
    gate: Arc<ConcurrencyGate>,
    coordinator: RetryCoordinator,
}

impl RateLimiter {
    pub fn new(config: PacerConfig) -> Self {
        let ledger = Arc::new(UsageLedger::new(config.tokens_per_minute, config.window()));
        let health = Arc::new(ServerHealthMonitor::new(config.server_check_interval()));
        let gate = Arc::new(ConcurrencyGate::new(config.max_concurrent));
        let coordinator = RetryCoordinator::new(
            &config,
            Arc::clone(&ledger),
            Arc::clone(&health),
            Arc::clone(&gate),
        );
        Self { config, ledger, health, gate, coordinator }
    }

    /// Record token usage against the sliding window.
    pub fn record_usage(&self, tokens: u64) {
        self.ledger.record_usage(tokens);
    }

    /// Suspend until `tokens` more would fit in the window budget.
    pub async fn wait_if_needed(&self, tokens: u64) {
        self.ledger.wait_if_needed(tokens).await;
    }

    /// Check whether `tokens` more would still fit in the budget.
    pub fn can_make_request(&self, tokens: u64) -> bool {
        self.ledger.can_make_request(tokens)
    }

    /// Tokens still available in the current window.
    pub fn available_tokens(&self) -> u64 {
        self.ledger.available_tokens()
    }

    /// Total token usage within the current window.
    pub fn current_usage(&self) -> u64 {
        self.ledger.current_usage()
    }

    /// Forward an error status from the remote service to the health monitor.
    pub fn record_error(&self, status_code: u16) {
        self.health.record_error(status_code);
    }

    /// Run `operation` through the retry loop. See [`RetryCoordinator::run`].
    pub async fn run<T, E, F, Fut>(&self, request_id: &str, operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: ErrorSignal,
    {
        self.coordinator.run(request_id, operation).await
    }

    /// Retry bookkeeping for a request id, if any.
    pub fn retry_state(&self, request_id: &str) -> Option<RetryState> {
        self.coordinator.retry_state(request_id)
    }

    /// Drop the retry bookkeeping for a request id.
    pub fn clear_retry_state(&self, request_id: &str) -> bool {
        self.coordinator.clear_retry_state(request_id)
    }

    /// Number of operations currently holding an admission slot.
    pub fn in_flight(&self) -> usize {
        self.gate.in_flight()
    }

    /// Point-in-time view of the usage ledger.
    pub fn usage_snapshot(&self) -> UsageSnapshot {
        self.ledger.snapshot()
    }

    /// Point-in-time view of the server health state.
    pub fn health_snapshot(&self) -> HealthSnapshot {
        self.health.snapshot()
    }

    pub fn config(&self) -> &PacerConfig {
        &self.config
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(PacerConfig::default())
    }
}
