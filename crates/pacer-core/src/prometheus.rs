//! Prometheus metrics for limiter observability.
//!
//! Exposes metrics compatible with Prometheus/OpenMetrics format:
//! - `pacer_retries_total` - Counter of retried attempts
//! - `pacer_retry_exhausted_total` - Counter of terminal retry failures
//! - `pacer_overload_signals_total` - Counter of overload signals (status 529)
//! - `pacer_rate_limit_waits_total` - Counter of window-slide suspensions
//! - `pacer_backoff_seconds` - Histogram of computed backoff durations
//! - `pacer_rate_limit_wait_seconds` - Histogram of window-slide wait durations
//!
//! Emission is fire-and-forget: if no recorder is installed, every call is
//! a no-op. Call [`init_metrics`] once at application startup to install
//! the Prometheus recorder and obtain a render handle.

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

/// Global Prometheus handle for rendering metrics
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Backoff/wait buckets: the limiter sleeps anywhere from sub-second
/// (initial backoff) to a full window slide (60s+).
const WAIT_BUCKETS: &[f64] = &[0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 120.0];

/// Initialize the Prometheus metrics recorder.
/// Must be called once at application startup before any metrics are recorded.
///
/// Returns the handle that can be used to render metrics as text.
pub fn init_metrics() -> PrometheusHandle {
    let handle = PROMETHEUS_HANDLE.get_or_init(|| {
        let builder =
            PrometheusBuilder::new().set_buckets(WAIT_BUCKETS).expect("bucket list is non-empty");
        let handle =
            builder.install_recorder().expect("Failed to install Prometheus metrics recorder");

        // Register metric descriptions
        describe_counter!("pacer_retries_total", "Total number of retried attempts");
        describe_counter!(
            "pacer_retry_exhausted_total",
            "Total requests that exhausted their retry budget"
        );
        describe_counter!(
            "pacer_overload_signals_total",
            "Total overload signals (status 529) recorded by the health monitor"
        );
        describe_counter!(
            "pacer_rate_limit_waits_total",
            "Total suspensions waiting for the usage window to slide"
        );
        describe_histogram!("pacer_backoff_seconds", "Computed backoff durations in seconds");
        describe_histogram!(
            "pacer_rate_limit_wait_seconds",
            "Window-slide wait durations in seconds"
        );

        handle
    });

    handle.clone()
}

/// Get the Prometheus handle for rendering metrics.
/// Returns None if metrics have not been initialized.
pub fn get_prometheus_handle() -> Option<&'static PrometheusHandle> {
    PROMETHEUS_HANDLE.get()
}

/// Record a retried attempt and the backoff applied before it.
pub(crate) fn record_retry(backoff_secs: f64) {
    counter!("pacer_retries_total").increment(1);
    histogram!("pacer_backoff_seconds").record(backoff_secs);
}

/// Record a terminal retry failure.
pub(crate) fn record_retry_exhausted() {
    counter!("pacer_retry_exhausted_total").increment(1);
}

/// Record an overload signal accepted by the health monitor.
pub(crate) fn record_overload_signal() {
    counter!("pacer_overload_signals_total").increment(1);
}

/// Record a suspension waiting for the usage window to slide.
pub(crate) fn record_rate_limit_wait(wait_secs: f64) {
    counter!("pacer_rate_limit_waits_total").increment(1);
    histogram!("pacer_rate_limit_wait_seconds").record(wait_secs);
}
