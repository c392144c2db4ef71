//! Upstream call errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ErrorSignal;

/// Errors produced by calls to the capacity-constrained remote service.
///
/// Collaborators that do not already have their own error type can use
/// this one directly; the retry coordinator only requires [`ErrorSignal`].
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "details")]
pub enum UpstreamError {
    /// Remote service signalled it is at capacity (status 529)
    #[error("service overloaded (status {status})")]
    Overloaded { status: u16 },

    /// Rate limited by the remote service (429)
    #[error("rate limited{}", retry_after_secs.map(|s| format!(", retry after {}s", s)).unwrap_or_default())]
    RateLimited { retry_after_secs: Option<u64> },

    /// Remote service returned a failure status
    #[error("upstream returned status {status}: {message}")]
    Status { status: u16, message: String },

    /// Transport-level failure with no status code
    #[error("transport error: {message}")]
    Transport { message: String },
}

impl UpstreamError {
    /// Shorthand for the overload signal the health monitor reacts to.
    pub fn overloaded() -> Self {
        Self::Overloaded { status: 529 }
    }

    /// Check if this error is the explicit overload signal.
    pub fn is_overload(&self) -> bool {
        self.status_code() == Some(529)
    }
}

impl ErrorSignal for UpstreamError {
    fn status_code(&self) -> Option<u16> {
        match self {
            Self::Overloaded { status } | Self::Status { status, .. } => Some(*status),
            Self::RateLimited { .. } => Some(429),
            Self::Transport { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(UpstreamError::overloaded().status_code(), Some(529));
        assert_eq!(
            UpstreamError::RateLimited { retry_after_secs: Some(30) }.status_code(),
            Some(429)
        );
        assert_eq!(
            UpstreamError::Transport { message: "reset".to_string() }.status_code(),
            None
        );
    }

    #[test]
    fn test_error_serialization() {
        let err = UpstreamError::Status { status: 503, message: "unavailable".to_string() };

        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("503"));

        let deserialized: UpstreamError = serde_json::from_str(&json).unwrap();
        assert_eq!(err, deserialized);
    }

    #[test]
    fn test_error_display() {
        let msg = format!("{}", UpstreamError::RateLimited { retry_after_secs: Some(60) });
        assert!(msg.contains("60"));
    }
}
