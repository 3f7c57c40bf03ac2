use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;

/// Diagnostics attached to every [`CallResult`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ResultMetadata {
    pub total_attempts: u32,
    pub from_cache: bool,
    pub error_type: Option<ErrorKind>,
    #[serde(default)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// Outcome of one task. Failed results always carry an error message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallResult {
    pub task_id: String,
    pub interface_name: String,
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub execution_time: Duration,
    pub metadata: ResultMetadata,
    pub timestamp: DateTime<Utc>,
}

impl CallResult {
    pub fn success(
        task_id: impl Into<String>,
        interface_name: impl Into<String>,
        data: serde_json::Value,
        execution_time: Duration,
        metadata: ResultMetadata,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            interface_name: interface_name.into(),
            success: true,
            data: Some(data),
            error: None,
            execution_time,
            metadata,
            timestamp: Utc::now(),
        }
    }

    pub fn failure(
        task_id: impl Into<String>,
        interface_name: impl Into<String>,
        error: impl Into<String>,
        kind: ErrorKind,
        execution_time: Duration,
        mut metadata: ResultMetadata,
    ) -> Self {
        let mut error = error.into();
        if error.is_empty() {
            error = kind.to_string();
        }
        metadata.error_type = Some(kind);
        Self {
            task_id: task_id.into(),
            interface_name: interface_name.into(),
            success: false,
            data: None,
            error: Some(error),
            execution_time,
            metadata,
            timestamp: Utc::now(),
        }
    }

    pub fn from_cache(&self) -> bool {
        self.metadata.from_cache
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.metadata.error_type
    }
}

/// Aggregated diagnostics for a batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionSummary {
    /// "sequential" or "async".
    pub mode: String,
    pub cache_hits: usize,
    pub total_attempts: u64,
    pub errors_by_kind: HashMap<ErrorKind, usize>,
    pub avg_execution_time: Duration,
    /// Worker count for async runs.
    pub concurrency: Option<usize>,
}

/// Outcome of many tasks executed together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResult {
    pub session_id: String,
    pub total_tasks: usize,
    pub successful_tasks: usize,
    pub failed_tasks: usize,
    pub results: Vec<CallResult>,
    pub execution_summary: ExecutionSummary,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl BatchResult {
    pub fn new(
        session_id: impl Into<String>,
        mode: &str,
        results: Vec<CallResult>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Self {
        let successful_tasks = results.iter().filter(|r| r.success).count();
        let mut summary = ExecutionSummary {
            mode: mode.to_string(),
            ..Default::default()
        };
        for r in &results {
            summary.total_attempts += u64::from(r.metadata.total_attempts);
            if r.metadata.from_cache {
                summary.cache_hits += 1;
            }
            if let Some(kind) = r.metadata.error_type.filter(|_| !r.success) {
                *summary.errors_by_kind.entry(kind).or_default() += 1;
            }
        }
        if !results.is_empty() {
            let total: Duration = results.iter().map(|r| r.execution_time).sum();
            summary.avg_execution_time = total / results.len() as u32;
        }

        Self {
            session_id: session_id.into(),
            total_tasks: results.len(),
            successful_tasks,
            failed_tasks: results.len() - successful_tasks,
            results,
            execution_summary: summary,
            start_time,
            end_time,
        }
    }

    /// Fraction of successful tasks; 0.0 for an empty batch.
    pub fn success_rate(&self) -> f64 {
        if self.total_tasks == 0 {
            return 0.0;
        }
        self.successful_tasks as f64 / self.total_tasks as f64
    }

    pub fn total_execution_time(&self) -> Duration {
        (self.end_time - self.start_time)
            .to_std()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ok(id: &str) -> CallResult {
        CallResult::success(id, "x", json!(1), Duration::from_millis(10), ResultMetadata {
            total_attempts: 1,
            ..Default::default()
        })
    }

    #[test]
    fn failure_always_has_error() {
        let r = CallResult::failure(
            "t1",
            "x",
            "",
            ErrorKind::Network,
            Duration::ZERO,
            ResultMetadata::default(),
        );
        assert!(!r.success);
        assert_eq!(r.error.as_deref(), Some("NETWORK"));
        assert_eq!(r.error_kind(), Some(ErrorKind::Network));
    }

    #[test]
    fn batch_counts_and_rate() {
        let fail = CallResult::failure(
            "t3",
            "x",
            "boom",
            ErrorKind::Unknown,
            Duration::from_millis(30),
            ResultMetadata {
                total_attempts: 1,
                ..Default::default()
            },
        );
        let start = Utc::now();
        let end = start + chrono::Duration::milliseconds(250);
        let batch = BatchResult::new("s", "sequential", vec![ok("t1"), ok("t2"), fail], start, end);

        assert_eq!(batch.total_tasks, 3);
        assert_eq!(batch.successful_tasks, 2);
        assert_eq!(batch.failed_tasks, 1);
        assert!((batch.success_rate() - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(batch.total_execution_time(), Duration::from_millis(250));
        assert_eq!(batch.execution_summary.total_attempts, 3);
        assert_eq!(batch.execution_summary.errors_by_kind[&ErrorKind::Unknown], 1);
        assert_eq!(
            batch.execution_summary.avg_execution_time,
            Duration::from_nanos(16_666_666)
        );
    }

    #[test]
    fn empty_batch_rate_is_zero() {
        let now = Utc::now();
        let batch = BatchResult::new("s", "async", Vec::new(), now, now);
        assert_eq!(batch.success_rate(), 0.0);
    }
}
