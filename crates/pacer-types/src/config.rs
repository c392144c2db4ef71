//! Limiter configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the rate-limiting and retry subsystem.
///
/// All fields are fixed at construction time; the limiter never mutates
/// them. No validation beyond types is performed here; callers are
/// expected to validate before construction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PacerConfig {
    /// Maximum number of tokens admitted per sliding window (default: 40000)
    pub tokens_per_minute: u64,
    /// Sliding window size in seconds (default: 60)
    pub window_seconds: u64,
    /// Maximum number of retry attempts per request (default: 5)
    pub max_retries: u32,
    /// Initial backoff in seconds; also the floor for every computed backoff (default: 1.0)
    pub initial_backoff_secs: f64,
    /// Maximum base backoff in seconds, before health/peak multipliers (default: 60.0)
    pub max_backoff_secs: f64,
    /// Exponential growth factor applied per retry (default: 2.0)
    pub backoff_multiplier: f64,
    /// Maximum number of concurrent in-flight operations (default: 5)
    pub max_concurrent: usize,
    /// Minimum interval between server health re-evaluations in seconds (default: 60)
    pub server_check_interval_seconds: u64,
    /// Fixed pause before re-checking admission while the server is
    /// overloaded, in seconds. Deliberately separate from the adaptive
    /// backoff path (default: 5)
    pub overload_cooldown_seconds: u64,
}

impl Default for PacerConfig {
    fn default() -> Self {
        Self {
            tokens_per_minute: 40_000,
            window_seconds: 60,
            max_retries: 5,
            initial_backoff_secs: 1.0,
            max_backoff_secs: 60.0,
            backoff_multiplier: 2.0,
            max_concurrent: 5,
            server_check_interval_seconds: 60,
            overload_cooldown_seconds: 5,
        }
    }
}

impl PacerConfig {
    /// Sliding window size as a `Duration`.
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_seconds)
    }

    /// Initial backoff as a `Duration`.
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_secs_f64(self.initial_backoff_secs)
    }

    /// Maximum base backoff as a `Duration`.
    pub fn max_backoff(&self) -> Duration {
        Duration::from_secs_f64(self.max_backoff_secs)
    }

    /// Health re-evaluation interval as a `Duration`.
    pub fn server_check_interval(&self) -> Duration {
        Duration::from_secs(self.server_check_interval_seconds)
    }

    /// Overload cooldown as a `Duration`.
    pub fn overload_cooldown(&self) -> Duration {
        Duration::from_secs(self.overload_cooldown_seconds)
    }
}
