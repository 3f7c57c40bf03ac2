use std::time::Duration;

use thiserror::Error;

use super::classify::ErrorKind;

/// Errors raised by the execution engine itself.
#[derive(Error, Debug, Clone)]
pub enum ExecutorError {
    #[error("interface not found: {0}")]
    InterfaceNotFound(String),

    #[error("interface '{interface}' timed out after {timeout:?}")]
    Timeout { interface: String, timeout: Duration },

    #[error("invocation panicked: {0}")]
    Panicked(String),

    #[error("cache error: {0}")]
    Cache(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("worker lost: {0}")]
    WorkerLost(String),
}

impl ExecutorError {
    /// Map an engine error onto the retry taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Cache(_) => ErrorKind::Cache,
            Self::Config(_) => ErrorKind::Validation,
            Self::InterfaceNotFound(_) | Self::Panicked(_) | Self::WorkerLost(_) => {
                ErrorKind::Unknown
            }
        }
    }
}

/// A failure reported by a data-source interface.
///
/// `kind` carries the source-side error type name (e.g. `ConnectionError`,
/// `ValueError`); the classifier matches on it together with the message.
#[derive(Error, Debug, Clone)]
#[error("{kind}: {message}")]
pub struct SourceError {
    pub kind: String,
    pub message: String,
}

impl SourceError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_errors_map_to_kinds() {
        let timeout = ExecutorError::Timeout {
            interface: "stock_zh_a_hist".into(),
            timeout: Duration::from_secs(3),
        };
        assert_eq!(timeout.kind(), ErrorKind::Timeout);
        assert_eq!(
            ExecutorError::InterfaceNotFound("nope".into()).kind(),
            ErrorKind::Unknown
        );
        assert_eq!(
            ExecutorError::Cache("disk full".into()).kind(),
            ErrorKind::Cache
        );
    }

    #[test]
    fn source_error_display() {
        let err = SourceError::new("ConnectionError", "reset by peer");
        assert_eq!(err.to_string(), "ConnectionError: reset by peer");
    }
}
