use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use chrono::Utc;
use futures::FutureExt;
use tokio::sync::mpsc;

use crate::error::ExecutorError;
use crate::util::panic_message;

use super::engine::{guard_hook, InterfaceExecutor, Next, TaskRun};
use super::traits::Invocable;
use super::types::{BatchResult, CallResult, CallTask, ExecutionContext};

/// Invoked with every result as soon as it is produced.
pub type ResultCallback = Arc<dyn Fn(&CallResult) + Send + Sync>;

impl InterfaceExecutor {
    /// Run tasks on a bounded pool of worker futures.
    ///
    /// `async.max_concurrency` workers pull from an internal queue of capacity
    /// `async.batch_size`; each blocking call is moved onto a blocking thread.
    /// Results come back in completion order, not submission order.
    pub async fn execute_async(
        &self,
        tasks: Vec<CallTask>,
        callback: Option<ResultCallback>,
        ctx: Option<&ExecutionContext>,
    ) -> BatchResult {
        let ctx = ctx.cloned().unwrap_or_default();
        let workers = self.config.async_exec.max_concurrency.max(1);
        let start = Utc::now();
        let total = tasks.len();
        tracing::info!(session = %ctx.session_id, tasks = total, workers, "async batch started");

        // `None` is the per-worker stop sentinel.
        let (tx, rx) = mpsc::channel::<Option<CallTask>>(self.config.async_exec.batch_size.max(1));
        let rx = tokio::sync::Mutex::new(rx);
        let results = Mutex::new(Vec::with_capacity(total));

        let producer = async move {
            for task in tasks {
                if tx.send(Some(task)).await.is_err() {
                    return;
                }
            }
            for _ in 0..workers {
                if tx.send(None).await.is_err() {
                    return;
                }
            }
        };

        let worker = |worker_id: usize| {
            let (rx, results, ctx, callback) = (&rx, &results, &ctx, callback.clone());
            async move {
                loop {
                    let next = rx.lock().await.recv().await;
                    let Some(Some(task)) = next else {
                        break;
                    };
                    tracing::trace!(worker_id, task_id = %task.task_id, "task dequeued");

                    let result = AssertUnwindSafe(self.execute_task_async(&task, ctx))
                        .catch_unwind()
                        .await
                        .unwrap_or_else(|p| {
                            let msg = panic_message(p.as_ref());
                            self.finish(self.setup_failure(&task, msg), ctx)
                        });

                    if let Some(cb) = &callback {
                        guard_hook("callback", "on_result", || {
                            cb(&result);
                            Ok(())
                        });
                    }
                    results
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .push(result);
                }
            }
        };

        futures::join!(producer, futures::future::join_all((0..workers).map(worker)));

        let results = results.into_inner().unwrap_or_else(PoisonError::into_inner);
        let mut batch =
            BatchResult::new(ctx.session_id.clone(), "async", results, start, Utc::now());
        batch.execution_summary.concurrency = Some(workers);
        tracing::info!(
            session = %batch.session_id,
            successful = batch.successful_tasks,
            failed = batch.failed_tasks,
            elapsed_ms = batch.total_execution_time().as_millis() as u64,
            "async batch finished"
        );
        batch
    }

    /// Async counterpart of [`InterfaceExecutor::execute_task`]: same state
    /// machine, but every wait yields to the runtime.
    pub async fn execute_task_async(&self, task: &CallTask, ctx: &ExecutionContext) -> CallResult {
        let run = self.begin(task, ctx);
        let invocable = match self.resolver.resolve(&task.interface_name) {
            Ok(inv) => inv,
            Err(err) => return self.finish(self.resolution_failure(&run, err), ctx),
        };
        let limiter = self.rate_limiters.get(&task.interface_name);

        let mut attempt = 0;
        loop {
            if let Some(limiter) = &limiter {
                let waited = limiter.acquire_async().await;
                if !waited.is_zero() {
                    tracing::debug!(interface = %task.interface_name, ?waited, "rate limit wait");
                }
            }
            if let Some(hit) = self.cache_lookup_async(&run, attempt).await {
                return self.finish(hit, ctx);
            }

            match self.invoke_async(&invocable, task, ctx).await {
                Ok(value) => {
                    let result = self.on_success_async(&run, value, attempt).await;
                    return self.finish(result, ctx);
                }
                Err(err) => match self.on_failure(&run, err, attempt) {
                    Next::Retry(delay) => tokio::time::sleep(delay).await,
                    Next::Stop(result) => return self.finish(result, ctx),
                },
            }
            attempt += 1;
        }
    }

    async fn cache_lookup_async(&self, run: &TaskRun<'_>, attempt: u32) -> Option<CallResult> {
        let (cache, key) = self.cache_slot(run)?;
        let (cache, key) = (cache.clone(), key.to_string());
        let lookup_start = Instant::now();
        let value = match tokio::task::spawn_blocking(move || cache.get(&key)).await {
            Ok(value) => value?,
            Err(err) => {
                tracing::warn!(
                    interface = %run.task.interface_name,
                    error = %err,
                    "cache lookup worker failed"
                );
                return None;
            }
        };
        Some(self.cache_hit(run, value, attempt, lookup_start.elapsed()))
    }

    async fn on_success_async(
        &self,
        run: &TaskRun<'_>,
        value: serde_json::Value,
        attempt: u32,
    ) -> CallResult {
        if let Some((cache, key)) = self.cache_slot(run) {
            let (cache, key, stored) = (cache.clone(), key.to_string(), value.clone());
            let outcome = tokio::task::spawn_blocking(move || cache.set(&key, stored))
                .await
                .unwrap_or_else(|e| Err(ExecutorError::WorkerLost(e.to_string())));
            self.check_store(run, outcome);
        }
        self.success(run, value, attempt)
    }

    async fn invoke_async(
        &self,
        invocable: &Arc<dyn Invocable>,
        task: &CallTask,
        ctx: &ExecutionContext,
    ) -> anyhow::Result<serde_json::Value> {
        let timeout = self.timeout_for(task, ctx, true);
        let invocable = invocable.clone();
        let params = task.params.clone();
        let started = Instant::now();
        let handle = tokio::task::spawn_blocking(move || invocable.invoke(&params));

        // Dropping the handle on expiry detaches the blocking call; it runs on
        // to completion and its result is discarded.
        let joined = match &self.async_timeout {
            Some(coop) => coop.run_with_timeout(&task.interface_name, timeout, handle).await?,
            None => handle.await,
        };
        let out = joined.map_err(|e| match e.try_into_panic() {
            Ok(p) => ExecutorError::Panicked(panic_message(p.as_ref())),
            Err(e) => ExecutorError::WorkerLost(e.to_string()),
        })?;

        if self.async_timeout.is_none() {
            return self.check_soft_timeout(task, timeout, started.elapsed(), out);
        }
        out
    }
}
