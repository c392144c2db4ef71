//! # Pacer Core
//!
//! Adaptive rate limiting and retry coordination for quota-limited APIs.
//!
//! ## Architecture
//!
//! ```text
//! pacer-core/src/limiter/
//! ├── ledger.rs       # Sliding-window token usage accounting + peak tracking
//! ├── health.rs       # Overload detection state machine (529 signals)
//! ├── backoff.rs      # Adaptive backoff calculation
//! ├── gate.rs         # Bounded concurrency admission control
//! ├── coordinator.rs  # The retry loop coupling the four components
//! └── mod.rs          # RateLimiter facade
//! ```
//!
//! Collaborators (a task executor, a plan runner) call
//! [`RateLimiter::wait_if_needed`] before issuing work, wrap the outbound
//! call in [`RateLimiter::run`], and report usage/outcomes back through
//! [`RateLimiter::record_usage`] and [`RateLimiter::record_error`].

pub mod limiter;
pub mod prometheus;

// Re-export commonly used types
pub use limiter::{
    BackoffCalculator, ConcurrencyGate, HealthSnapshot, RateLimiter, RetryCoordinator, RetryState,
    ServerHealthMonitor, SlotGuard, UsageLedger, UsageSnapshot,
};
pub use pacer_types::{ErrorSignal, PacerConfig, UpstreamError};
