use std::sync::mpsc::{sync_channel, RecvTimeoutError};
use std::time::{Duration, Instant};

use crate::error::ExecutorError;
use crate::util::catch_panic;

use super::history::DurationHistory;
use super::TimeoutStrategy;

/// Hard timeouts for synchronous calls.
///
/// Each call runs on a bounded worker pool while the caller waits up to the
/// timeout. On expiry the caller gets [`ExecutorError::Timeout`] and the call
/// is abandoned, not killed: it keeps its worker until it returns, and its
/// result is discarded.
pub struct ThreadPoolTimeout {
    pool: rayon::ThreadPool,
    history: DurationHistory,
}

impl ThreadPoolTimeout {
    pub fn new(workers: usize) -> Result<Self, ExecutorError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .thread_name(|i| format!("fetchgate-timeout-{i}"))
            .build()
            .map_err(|e| ExecutorError::Config(format!("timeout pool: {e}")))?;
        Ok(Self {
            pool,
            history: DurationHistory::new(),
        })
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Run `f` on the pool, waiting at most `timeout` for it.
    pub fn run_with_timeout<F, T>(
        &self,
        interface: &str,
        timeout: Duration,
        f: F,
    ) -> Result<T, ExecutorError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = sync_channel(1);
        let start = Instant::now();
        self.pool.spawn(move || {
            // The receiver is gone if the caller already timed out.
            let _ = tx.send(catch_panic(f));
        });

        match rx.recv_timeout(timeout) {
            Ok(Ok(value)) => {
                self.history.record(interface, start.elapsed());
                Ok(value)
            }
            Ok(Err(msg)) => Err(ExecutorError::Panicked(msg)),
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(interface, ?timeout, "call abandoned after timeout");
                Err(ExecutorError::Timeout {
                    interface: interface.to_string(),
                    timeout,
                })
            }
            Err(RecvTimeoutError::Disconnected) => Err(ExecutorError::WorkerLost(
                "timeout worker dropped its result".into(),
            )),
        }
    }
}

impl TimeoutStrategy for ThreadPoolTimeout {
    fn name(&self) -> &'static str {
        "thread-pool"
    }

    fn history(&self) -> &DurationHistory {
        &self.history
    }
}
