//! Typed error definitions for Pacer.
//!
//! This module provides the error contract at the collaborator boundary.
//! Operation errors are designed to be:
//!
//! - **Classifiable** via the [`ErrorSignal`] trait (optional status code)
//! - **Displayable** for logging via Display trait
//! - **Composable** via thiserror derive macros

mod upstream;

pub use upstream::UpstreamError;

/// Classification contract for operation errors.
///
/// The retry coordinator consults this trait to decide whether a failure
/// carries a classifiable status code worth forwarding to the health
/// monitor. A `None` status is not an error, it simply skips health
/// recording.
///
/// Implement this on whatever error type your outbound calls produce:
///
/// ```
/// use pacer_types::ErrorSignal;
///
/// #[derive(Debug, thiserror::Error)]
/// #[error("api call failed with status {status}")]
/// struct ApiError {
///     status: u16,
/// }
///
/// impl ErrorSignal for ApiError {
///     fn status_code(&self) -> Option<u16> {
///         Some(self.status)
///     }
/// }
/// ```
pub trait ErrorSignal: std::error::Error {
    /// Numeric status code carried by this error, if any.
    fn status_code(&self) -> Option<u16> {
        None
    }
}
