use std::future::Future;
use std::time::{Duration, Instant};

use crate::error::ExecutorError;

use super::history::DurationHistory;
use super::TimeoutStrategy;

/// Cooperative timeouts for asynchronous calls, via `tokio::time::timeout`.
///
/// An expired future is dropped at its next suspension point. Work already
/// moved onto a blocking thread is not interrupted.
#[derive(Debug, Default)]
pub struct CooperativeTimeout {
    history: DurationHistory,
}

impl CooperativeTimeout {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn run_with_timeout<Fut, T>(
        &self,
        interface: &str,
        timeout: Duration,
        fut: Fut,
    ) -> Result<T, ExecutorError>
    where
        Fut: Future<Output = T>,
    {
        let start = Instant::now();
        match tokio::time::timeout(timeout, fut).await {
            Ok(value) => {
                self.history.record(interface, start.elapsed());
                Ok(value)
            }
            Err(_) => Err(ExecutorError::Timeout {
                interface: interface.to_string(),
                timeout,
            }),
        }
    }
}

impl TimeoutStrategy for CooperativeTimeout {
    fn name(&self) -> &'static str {
        "cooperative"
    }

    fn history(&self) -> &DurationHistory {
        &self.history
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn completes_within_timeout() {
        let ct = CooperativeTimeout::new();
        let v = ct
            .run_with_timeout("x", Duration::from_secs(1), async { 7 })
            .await
            .unwrap();
        assert_eq!(v, 7);
        assert_eq!(ct.history().len("x"), 1);
    }

    #[tokio::test]
    async fn expires_without_recording() {
        let ct = CooperativeTimeout::new();
        let err = ct
            .run_with_timeout("slow", Duration::from_millis(20), async {
                tokio::time::sleep(Duration::from_secs(5)).await;
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutorError::Timeout { ref interface, .. } if interface == "slow"));
        assert_eq!(ct.history().len("slow"), 0);
    }

    #[tokio::test]
    async fn suggestion_grows_with_slow_history() {
        let ct = CooperativeTimeout::new();
        ct.history().record("slow", Duration::from_secs(10));
        assert_eq!(
            ct.suggested_timeout("slow", Duration::from_secs(5)),
            Duration::from_secs(25)
        );
    }
}
