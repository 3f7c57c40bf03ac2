use serde::{Deserialize, Serialize};

use super::executor::{ExecutorError, SourceError};

/// Failure taxonomy used for retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    Network,
    Timeout,
    RateLimit,
    Validation,
    Cache,
    Unknown,
}

impl ErrorKind {
    /// Transient kinds that are eligible for automatic retry.
    pub fn is_transient(self) -> bool {
        matches!(self, Self::Network | Self::Timeout | Self::RateLimit)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Network => "NETWORK",
            Self::Timeout => "TIMEOUT",
            Self::RateLimit => "RATE_LIMIT",
            Self::Validation => "VALIDATION",
            Self::Cache => "CACHE",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps failures onto [`ErrorKind`] and decides retry eligibility.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorClassifier;

impl ErrorClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Classify an invocation failure.
    ///
    /// Engine errors carry their own kind. Everything else is matched by text:
    /// the source error type name (if any) followed by the full error chain.
    pub fn classify(&self, error: &anyhow::Error) -> ErrorKind {
        if let Some(engine) = error.downcast_ref::<ExecutorError>() {
            return engine.kind();
        }

        let type_name = error
            .downcast_ref::<SourceError>()
            .map(|e| e.kind.as_str())
            .unwrap_or("");
        self.classify_text(type_name, &format!("{error:#}"))
    }

    /// Case-insensitive keyword match over an error type name and message.
    pub fn classify_text(&self, type_name: &str, message: &str) -> ErrorKind {
        let text = format!("{} {}", type_name, message).to_lowercase();
        let has = |needles: &[&str]| needles.iter().any(|n| text.contains(n));

        if has(&["timeout"]) {
            ErrorKind::Timeout
        } else if has(&["rate", "limit", "429"]) {
            ErrorKind::RateLimit
        } else if has(&["network", "connection", "socket"]) {
            ErrorKind::Network
        } else if has(&["validation", "invalid", "value"]) {
            ErrorKind::Validation
        } else if has(&["cache"]) {
            ErrorKind::Cache
        } else {
            ErrorKind::Unknown
        }
    }

    /// Whether attempt `attempt` (0-based) may be followed by another one.
    pub fn should_retry(&self, kind: ErrorKind, attempt: u32, max_retries: u32) -> bool {
        if attempt.saturating_add(1) >= max_retries {
            return false;
        }
        kind.is_transient()
    }
}
