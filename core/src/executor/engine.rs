use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;

use crate::cache::{cache_key, CacheBackend, MemoryCache};
use crate::config::ExecutorConfig;
use crate::error::{ErrorClassifier, ErrorKind, ExecutorError};
use crate::rate_limit::RateLimiterRegistry;
use crate::timeout::{CooperativeTimeout, ThreadPoolTimeout, TimeoutStrategy};
use crate::util::catch_panic;

use super::backoff::backoff_delay;
use super::traits::{
    ExecutorPlugin, InterfaceMetadata, InterfaceResolver, Invocable, JitterSource, RandomJitter,
};
use super::types::{BatchResult, CallResult, CallTask, ExecutionContext, Params, ResultMetadata};

/// What to do after a failed attempt.
pub(super) enum Next {
    Retry(Duration),
    Stop(CallResult),
}

/// Per-task bookkeeping shared by the sync and async loops.
pub(super) struct TaskRun<'a> {
    pub task: &'a CallTask,
    pub ctx: &'a ExecutionContext,
    pub cache_key: Option<String>,
    pub started: Instant,
}

/// Executes interface calls with rate limiting, caching, timeouts, retries
/// and plugin hooks.
pub struct InterfaceExecutor {
    pub(super) config: ExecutorConfig,
    pub(super) resolver: Arc<dyn InterfaceResolver>,
    plugins: Vec<Arc<dyn ExecutorPlugin>>,
    pub(super) rate_limiters: RateLimiterRegistry,
    cache: Option<Arc<dyn CacheBackend>>,
    thread_timeout: Option<ThreadPoolTimeout>,
    pub(super) async_timeout: Option<CooperativeTimeout>,
    jitter: Arc<dyn JitterSource>,
    classifier: ErrorClassifier,
}

pub struct InterfaceExecutorBuilder {
    config: ExecutorConfig,
    resolver: Arc<dyn InterfaceResolver>,
    metadata: Option<Arc<dyn InterfaceMetadata>>,
    plugins: Vec<Arc<dyn ExecutorPlugin>>,
    cache: Option<Arc<dyn CacheBackend>>,
    jitter: Arc<dyn JitterSource>,
}

impl InterfaceExecutorBuilder {
    pub fn new(resolver: Arc<dyn InterfaceResolver>) -> Self {
        Self {
            config: ExecutorConfig::default(),
            resolver,
            metadata: None,
            plugins: Vec::new(),
            cache: None,
            jitter: Arc::new(RandomJitter),
        }
    }

    pub fn config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn metadata(mut self, metadata: Arc<dyn InterfaceMetadata>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn plugin(mut self, plugin: Arc<dyn ExecutorPlugin>) -> Self {
        self.plugins.push(plugin);
        self
    }

    pub fn plugins(mut self, plugins: impl IntoIterator<Item = Arc<dyn ExecutorPlugin>>) -> Self {
        self.plugins.extend(plugins);
        self
    }

    /// Cache backend; defaults to a [`MemoryCache`] sized from config.
    pub fn cache(mut self, cache: Arc<dyn CacheBackend>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn jitter(mut self, jitter: Arc<dyn JitterSource>) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn build(self) -> Result<InterfaceExecutor, ExecutorError> {
        let config = self.config;
        config.validate()?;

        let cache = if config.cache.enabled {
            Some(self.cache.unwrap_or_else(|| {
                Arc::new(MemoryCache::new(config.cache.capacity, config.cache.ttl()))
                    as Arc<dyn CacheBackend>
            }))
        } else {
            None
        };
        let thread_timeout = if config.timeout.use_thread_pool {
            Some(ThreadPoolTimeout::new(config.thread_pool_size)?)
        } else {
            None
        };
        let async_timeout = config.timeout.use_async.then(CooperativeTimeout::new);

        Ok(InterfaceExecutor {
            rate_limiters: RateLimiterRegistry::new(config.rate_limits.clone(), self.metadata),
            config,
            resolver: self.resolver,
            plugins: self.plugins,
            cache,
            thread_timeout,
            async_timeout,
            jitter: self.jitter,
            classifier: ErrorClassifier::new(),
        })
    }
}

impl InterfaceExecutor {
    pub fn builder(resolver: Arc<dyn InterfaceResolver>) -> InterfaceExecutorBuilder {
        InterfaceExecutorBuilder::new(resolver)
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Build a task with the configured retry policy.
    pub fn task(&self, interface_name: impl Into<String>, params: Params) -> CallTask {
        CallTask::new(interface_name, params).with_retry_count(self.config.retry.max_retries)
    }

    /// Timeout the synchronous path would currently use for `interface`.
    pub fn suggested_timeout(&self, interface: &str) -> Duration {
        let configured = self.config.configured_timeout(interface);
        match self.strategy(false) {
            Some(s) if self.config.timeout.adaptive => s.suggested_timeout(interface, configured),
            _ => configured,
        }
    }

    /// Run one interface call.
    pub fn execute_single(
        &self,
        interface_name: &str,
        params: Params,
        ctx: Option<&ExecutionContext>,
    ) -> CallResult {
        let task = self.task(interface_name, params);
        let ctx = ctx.cloned().unwrap_or_default();
        catch_panic(|| self.execute_task(&task, &ctx))
            .unwrap_or_else(|msg| self.finish(self.setup_failure(&task, msg), &ctx))
    }

    /// Run tasks one after another on the calling thread. Results keep the
    /// input order.
    pub fn execute_batch(&self, tasks: &[CallTask], ctx: Option<&ExecutionContext>) -> BatchResult {
        let ctx = ctx.cloned().unwrap_or_default();
        let start = Utc::now();
        tracing::info!(session = %ctx.session_id, tasks = tasks.len(), "batch started");

        let results: Vec<CallResult> = tasks
            .iter()
            .map(|task| {
                catch_panic(|| self.execute_task(task, &ctx))
                    .unwrap_or_else(|msg| self.finish(self.setup_failure(task, msg), &ctx))
            })
            .collect();

        let batch =
            BatchResult::new(ctx.session_id.clone(), "sequential", results, start, Utc::now());
        tracing::info!(
            session = %batch.session_id,
            successful = batch.successful_tasks,
            failed = batch.failed_tasks,
            elapsed_ms = batch.total_execution_time().as_millis() as u64,
            "batch finished"
        );
        batch
    }

    /// Run one task through the full attempt loop on the calling thread.
    ///
    /// Blocks on rate-limit waits, timeouts and backoff sleeps.
    pub fn execute_task(&self, task: &CallTask, ctx: &ExecutionContext) -> CallResult {
        let run = self.begin(task, ctx);
        let invocable = match self.resolver.resolve(&task.interface_name) {
            Ok(inv) => inv,
            Err(err) => return self.finish(self.resolution_failure(&run, err), ctx),
        };
        let limiter = self.rate_limiters.get(&task.interface_name);

        let mut attempt = 0;
        loop {
            if let Some(limiter) = &limiter {
                let waited = limiter.acquire_blocking();
                if !waited.is_zero() {
                    tracing::debug!(interface = %task.interface_name, ?waited, "rate limit wait");
                }
            }
            if let Some(hit) = self.cache_lookup(&run, attempt) {
                return self.finish(hit, ctx);
            }

            match self.invoke_blocking(&invocable, task, ctx) {
                Ok(value) => return self.finish(self.on_success(&run, value, attempt), ctx),
                Err(err) => match self.on_failure(&run, err, attempt) {
                    Next::Retry(delay) => std::thread::sleep(delay),
                    Next::Stop(result) => return self.finish(result, ctx),
                },
            }
            attempt += 1;
        }
    }

    fn invoke_blocking(
        &self,
        invocable: &Arc<dyn Invocable>,
        task: &CallTask,
        ctx: &ExecutionContext,
    ) -> anyhow::Result<serde_json::Value> {
        let timeout = self.timeout_for(task, ctx, false);
        let Some(pool) = &self.thread_timeout else {
            let started = Instant::now();
            let out =
                catch_panic(|| invocable.invoke(&task.params)).map_err(ExecutorError::Panicked)?;
            return self.check_soft_timeout(task, timeout, started.elapsed(), out);
        };

        let invocable = invocable.clone();
        let params = task.params.clone();
        pool.run_with_timeout(&task.interface_name, timeout, move || invocable.invoke(&params))?
    }

    /// Fails a call that completed but overran its timeout.
    pub(super) fn check_soft_timeout(
        &self,
        task: &CallTask,
        timeout: Duration,
        elapsed: Duration,
        out: anyhow::Result<serde_json::Value>,
    ) -> anyhow::Result<serde_json::Value> {
        if elapsed > timeout {
            return Err(ExecutorError::Timeout {
                interface: task.interface_name.clone(),
                timeout,
            }
            .into());
        }
        out
    }

    pub(super) fn strategy(&self, is_async: bool) -> Option<&dyn TimeoutStrategy> {
        if is_async {
            self.async_timeout.as_ref().map(|t| t as &dyn TimeoutStrategy)
        } else {
            self.thread_timeout.as_ref().map(|t| t as &dyn TimeoutStrategy)
        }
    }

    /// Session override, then task timeout, then config; stretched by the
    /// adaptive history when enabled.
    pub(super) fn timeout_for(
        &self,
        task: &CallTask,
        ctx: &ExecutionContext,
        is_async: bool,
    ) -> Duration {
        let base = ctx
            .timeout_override
            .or(task.timeout)
            .unwrap_or_else(|| self.config.configured_timeout(&task.interface_name));
        match self.strategy(is_async) {
            Some(s) if self.config.timeout.adaptive => {
                s.suggested_timeout(&task.interface_name, base)
            }
            _ => base,
        }
    }

    pub(super) fn begin<'a>(&self, task: &'a CallTask, ctx: &'a ExecutionContext) -> TaskRun<'a> {
        for plugin in &self.plugins {
            guard_hook(plugin.name(), "before_execute", || plugin.before_execute(task, ctx));
        }
        if let Some(hook) = &ctx.pre_hook {
            guard_hook("context", "pre_hook", || {
                hook(task);
                Ok(())
            });
        }

        let cache_key = (self.cache.is_some() && ctx.cache_enabled).then(|| {
            match &self.config.cache_key_fn {
                Some(f) => f.key(&task.interface_name, &task.params),
                None => cache_key(&task.interface_name, &task.params),
            }
        });

        TaskRun {
            task,
            ctx,
            cache_key,
            started: Instant::now(),
        }
    }

    /// Backend and key for this run, when caching applies to it.
    pub(super) fn cache_slot<'r>(
        &'r self,
        run: &'r TaskRun<'_>,
    ) -> Option<(&'r Arc<dyn CacheBackend>, &'r str)> {
        Some((self.cache.as_ref()?, run.cache_key.as_deref()?))
    }

    pub(super) fn cache_lookup(&self, run: &TaskRun<'_>, attempt: u32) -> Option<CallResult> {
        let (cache, key) = self.cache_slot(run)?;
        let lookup_start = Instant::now();
        let value = cache.get(key)?;
        Some(self.cache_hit(run, value, attempt, lookup_start.elapsed()))
    }

    pub(super) fn cache_hit(
        &self,
        run: &TaskRun<'_>,
        value: serde_json::Value,
        attempt: u32,
        elapsed: Duration,
    ) -> CallResult {
        tracing::debug!(
            interface = %run.task.interface_name,
            task_id = %run.task.task_id,
            "cache hit"
        );
        CallResult::success(
            run.task.task_id.clone(),
            run.task.interface_name.clone(),
            value,
            elapsed,
            ResultMetadata {
                total_attempts: attempt + 1,
                from_cache: true,
                ..Default::default()
            },
        )
    }

    pub(super) fn on_success(
        &self,
        run: &TaskRun<'_>,
        value: serde_json::Value,
        attempt: u32,
    ) -> CallResult {
        if let Some((cache, key)) = self.cache_slot(run) {
            self.check_store(run, cache.set(key, value.clone()));
        }
        self.success(run, value, attempt)
    }

    /// Cache write failures are logged; the call itself still succeeded.
    pub(super) fn check_store(&self, run: &TaskRun<'_>, stored: Result<(), ExecutorError>) {
        if let Err(err) = stored {
            tracing::warn!(
                interface = %run.task.interface_name,
                task_id = %run.task.task_id,
                error = %err,
                "cache write failed"
            );
        }
    }

    pub(super) fn success(
        &self,
        run: &TaskRun<'_>,
        value: serde_json::Value,
        attempt: u32,
    ) -> CallResult {
        CallResult::success(
            run.task.task_id.clone(),
            run.task.interface_name.clone(),
            value,
            run.started.elapsed(),
            ResultMetadata {
                total_attempts: attempt + 1,
                ..Default::default()
            },
        )
    }

    pub(super) fn on_failure(&self, run: &TaskRun<'_>, err: anyhow::Error, attempt: u32) -> Next {
        let task = run.task;
        let kind = self.classifier.classify(&err);
        tracing::warn!(
            interface = %task.interface_name,
            task_id = %task.task_id,
            attempt = attempt + 1,
            max_attempts = task.max_attempts(),
            kind = %kind,
            error = %format!("{err:#}"),
            "attempt failed"
        );

        let vetoed = self.notify_error(run, &err);
        if !vetoed && self.classifier.should_retry(kind, attempt, task.max_attempts()) {
            let delay = backoff_delay(&self.config.retry, attempt, self.jitter.as_ref());
            tracing::debug!(interface = %task.interface_name, ?delay, "retrying after backoff");
            return Next::Retry(delay);
        }
        if vetoed {
            tracing::debug!(interface = %task.interface_name, "retry vetoed by plugin");
        }

        Next::Stop(CallResult::failure(
            task.task_id.clone(),
            task.interface_name.clone(),
            format!("{err:#}"),
            kind,
            run.started.elapsed(),
            ResultMetadata {
                total_attempts: attempt + 1,
                ..Default::default()
            },
        ))
    }

    /// Runs every `on_error` hook; `true` if any plugin vetoed retries.
    fn notify_error(&self, run: &TaskRun<'_>, err: &anyhow::Error) -> bool {
        let mut vetoed = false;
        for plugin in &self.plugins {
            let keep_going = guard_hook(plugin.name(), "on_error", || {
                plugin.on_error(run.task, err, run.ctx)
            });
            if keep_going == Some(false) {
                vetoed = true;
            }
        }
        if let Some(hook) = &run.ctx.error_hook {
            guard_hook("context", "error_hook", || {
                hook(run.task, err);
                Ok(())
            });
        }
        vetoed
    }

    pub(super) fn resolution_failure(&self, run: &TaskRun<'_>, err: ExecutorError) -> CallResult {
        let err = anyhow::Error::new(err);
        self.notify_error(run, &err);
        CallResult::failure(
            run.task.task_id.clone(),
            run.task.interface_name.clone(),
            err.to_string(),
            ErrorKind::Unknown,
            run.started.elapsed(),
            ResultMetadata {
                total_attempts: 1,
                ..Default::default()
            },
        )
    }

    /// Result for a task whose execution panicked outside the attempt loop.
    /// Callers still pass it through [`Self::finish`].
    pub(super) fn setup_failure(&self, task: &CallTask, msg: String) -> CallResult {
        tracing::warn!(
            interface = %task.interface_name,
            task_id = %task.task_id,
            %msg,
            "task setup failed"
        );
        CallResult::failure(
            task.task_id.clone(),
            task.interface_name.clone(),
            ExecutorError::Panicked(msg).to_string(),
            ErrorKind::Unknown,
            Duration::ZERO,
            ResultMetadata::default(),
        )
    }

    pub(super) fn finish(&self, result: CallResult, ctx: &ExecutionContext) -> CallResult {
        for plugin in &self.plugins {
            guard_hook(plugin.name(), "after_execute", || plugin.after_execute(&result, ctx));
        }
        if let Some(hook) = &ctx.post_hook {
            guard_hook("context", "post_hook", || {
                hook(&result);
                Ok(())
            });
        }
        result
    }
}

/// Run a hook, logging and swallowing errors and panics.
pub(super) fn guard_hook<T>(
    plugin: &str,
    hook: &str,
    f: impl FnOnce() -> anyhow::Result<T>,
) -> Option<T> {
    match catch_panic(f) {
        Ok(Ok(value)) => Some(value),
        Ok(Err(err)) => {
            tracing::warn!(plugin, hook, error = %format!("{err:#}"), "plugin hook failed");
            None
        }
        Err(msg) => {
            tracing::warn!(plugin, hook, panic = %msg, "plugin hook panicked");
            None
        }
    }
}
