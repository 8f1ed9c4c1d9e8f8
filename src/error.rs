//! Error types for the softener poller
//!
//! Errors fall into three classes: fetch failures (transient, retried on the
//! next scheduled tick), caller misuse (reading before the first successful
//! refresh) and fatal conditions (bad configuration, shutdown).

use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

/// Result type alias for softener operations
pub type Result<T> = std::result::Result<T, SoftenerError>;

/// Error types for softener polling and reading derivation
#[derive(Error, Debug)]
pub enum SoftenerError {
    /// Connection errors (device unreachable, server errors)
    #[error("Connection error: {0}")]
    Connection(String),

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// HTTP client errors
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing errors
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed device responses
    #[error("Parsing error: {0}")]
    Parsing(String),

    /// Timeout errors
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A scheduled or requested update failed; the cause is kept as the source
    #[error("Failed to fetch {name} data: {source}")]
    UpdateFailed {
        name: String,
        source: Arc<SoftenerError>,
    },

    /// The first refresh did not succeed, the coordinator is not ready
    #[error("Coordinator not ready: {0}")]
    NotReady(#[source] Box<SoftenerError>),

    /// A reading was requested before any snapshot was fetched
    #[error("No snapshot available: refresh() has not completed successfully yet")]
    NoSnapshot,

    /// The coordinator was shut down
    #[error("Coordinator has been shut down")]
    ShutDown,

    /// Internal errors (worker task panics and the like)
    #[error("Internal error: {0}")]
    Internal(String),
}

/// How a failure should be treated by whoever owns the schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// Transient fetch failure, retried on the next tick
    Fetch,
    /// Contract violation by the caller, never retried
    CallerMisuse,
    /// Not recoverable by retrying
    Fatal,
}

impl SoftenerError {
    /// Create a connection error
    pub fn connection<S: Into<String>>(msg: S) -> Self {
        Self::Connection(msg.into())
    }

    /// Create an authentication error
    pub fn authentication<S: Into<String>>(msg: S) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a parsing error
    pub fn parsing<S: Into<String>>(msg: S) -> Self {
        Self::Parsing(msg.into())
    }

    /// Create a timeout error
    pub fn timeout<S: Into<String>>(msg: S) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Wrap a fetch cause into the update-failure signal
    pub fn update_failed<S: Into<String>>(name: S, cause: Arc<SoftenerError>) -> Self {
        Self::UpdateFailed {
            name: name.into(),
            source: cause,
        }
    }

    /// Classify this error
    pub fn failure_class(&self) -> FailureClass {
        match self {
            SoftenerError::Connection(_)
            | SoftenerError::Authentication(_)
            | SoftenerError::Http(_)
            | SoftenerError::Json(_)
            | SoftenerError::Parsing(_)
            | SoftenerError::Timeout(_)
            | SoftenerError::Internal(_)
            | SoftenerError::UpdateFailed { .. }
            | SoftenerError::NotReady(_) => FailureClass::Fetch,
            SoftenerError::NoSnapshot => FailureClass::CallerMisuse,
            SoftenerError::Config(_) | SoftenerError::Io(_) | SoftenerError::ShutDown => {
                FailureClass::Fatal
            }
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        self.failure_class() == FailureClass::Fetch
    }

    /// Check if error indicates authentication issue
    pub fn is_auth_error(&self) -> bool {
        match self {
            SoftenerError::Authentication(_) => true,
            SoftenerError::UpdateFailed { source, .. } => source.is_auth_error(),
            SoftenerError::NotReady(inner) => inner.is_auth_error(),
            _ => false,
        }
    }

    /// Get a production-safe error message that doesn't expose sensitive information
    pub fn sanitized_message(&self) -> String {
        #[cfg(debug_assertions)]
        {
            self.to_string()
        }
        #[cfg(not(debug_assertions))]
        {
            match self {
                SoftenerError::Connection(_) => "Network connection issue".to_string(),
                SoftenerError::Authentication(_) => "Authentication failed".to_string(),
                SoftenerError::Http(_) => "HTTP request failed".to_string(),
                SoftenerError::Json(_) | SoftenerError::Parsing(_) => {
                    "Malformed device response".to_string()
                }
                SoftenerError::Timeout(_) => "Operation timed out".to_string(),
                SoftenerError::Config(_) => "Configuration error".to_string(),
                SoftenerError::Io(_) => "I/O operation failed".to_string(),
                SoftenerError::UpdateFailed { source, .. } => source.sanitized_message(),
                SoftenerError::NotReady(inner) => inner.sanitized_message(),
                SoftenerError::NoSnapshot => "No data available yet".to_string(),
                SoftenerError::ShutDown => "Poller stopped".to_string(),
                SoftenerError::Internal(_) => "Internal error occurred".to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_update_failed_keeps_cause() {
        let cause = Arc::new(SoftenerError::connection("device unreachable"));
        let error = SoftenerError::update_failed("iQua softener", cause);

        assert_eq!(
            error.to_string(),
            "Failed to fetch iQua softener data: Connection error: device unreachable"
        );
        let source = error.source().expect("cause attached");
        assert_eq!(source.to_string(), "Connection error: device unreachable");
        assert!(error.is_retryable());
    }

    #[test]
    fn test_failure_classes() {
        assert_eq!(
            SoftenerError::parsing("bad body").failure_class(),
            FailureClass::Fetch
        );
        assert_eq!(
            SoftenerError::NoSnapshot.failure_class(),
            FailureClass::CallerMisuse
        );
        assert_eq!(
            SoftenerError::config("missing serial").failure_class(),
            FailureClass::Fatal
        );
        assert!(!SoftenerError::NoSnapshot.is_retryable());
        assert!(!SoftenerError::ShutDown.is_retryable());
    }

    #[test]
    fn test_auth_error_seen_through_wrappers() {
        let cause = Arc::new(SoftenerError::authentication("bad password"));
        let error = SoftenerError::NotReady(Box::new(SoftenerError::update_failed("x", cause)));
        assert!(error.is_auth_error());
        assert!(!SoftenerError::timeout("slow").is_auth_error());
    }
}
