#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::ThreadId;
use std::time::Duration;

use fetchgate_core::cache::cache_key;
use fetchgate_core::config::{CacheKeyFn, ExecutorConfig};
use fetchgate_core::{
    CacheBackend, CallResult, CallTask, ExecutionContext, ExecutorError, ExecutorPlugin,
    FixedJitter, InterfaceExecutor, InterfaceRegistry, MemoryCache, Params, SourceError,
};
use serde_json::{json, Value};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("fetchgate_core=debug")
        .try_init();
}

/// Small delays and a pinned jitter so timing assertions stay cheap.
pub fn fast_config() -> ExecutorConfig {
    let mut cfg = ExecutorConfig::default();
    cfg.retry.base_delay_ms = 100;
    cfg.retry.max_delay_ms = 2_000;
    cfg.retry.exponential_base = 2.0;
    cfg.thread_pool_size = 4;
    cfg.timeout.default_timeout_ms = 2_000;
    cfg
}

pub fn build(registry: Arc<InterfaceRegistry>, cfg: ExecutorConfig) -> InterfaceExecutor {
    build_with(registry, cfg, Vec::new())
}

pub fn build_with(
    registry: Arc<InterfaceRegistry>,
    cfg: ExecutorConfig,
    plugins: Vec<Arc<dyn ExecutorPlugin>>,
) -> InterfaceExecutor {
    InterfaceExecutor::builder(registry.clone())
        .metadata(registry)
        .config(cfg)
        .plugins(plugins)
        .jitter(Arc::new(FixedJitter(0.1)))
        .build()
        .expect("executor config is valid")
}

pub fn build_with_cache(
    registry: Arc<InterfaceRegistry>,
    cfg: ExecutorConfig,
    cache: Arc<dyn CacheBackend>,
) -> InterfaceExecutor {
    InterfaceExecutor::builder(registry.clone())
        .metadata(registry)
        .config(cfg)
        .cache(cache)
        .jitter(Arc::new(FixedJitter(0.1)))
        .build()
        .expect("executor config is valid")
}

pub fn params(pairs: &[(&str, Value)]) -> Params {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

/// Registers `name` so that the first `failures` calls raise `error` and later
/// calls echo the params. Returns the call counter.
pub fn register_flaky(
    registry: &InterfaceRegistry,
    name: &str,
    failures: usize,
    error: SourceError,
) -> Arc<AtomicUsize> {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    registry.register(name, move |p: &Params| {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        if n < failures {
            return Err(error.clone().into());
        }
        Ok(json!({ "call": n + 1, "params": p }))
    });
    calls
}

/// Registers `name` as an interface that, while failing with a network
/// error, stores `{"filled_by": "peer"}` under its own cache key, the way a
/// concurrent caller sharing the cache would. Returns the call counter.
pub fn register_filled_by_peer(
    registry: &InterfaceRegistry,
    name: &str,
    cache: Arc<MemoryCache>,
) -> Arc<AtomicUsize> {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let interface = name.to_string();
    registry.register(name, move |p: &Params| {
        counter.fetch_add(1, Ordering::SeqCst);
        cache.set(&cache_key(&interface, p), json!({ "filled_by": "peer" }))?;
        Err(SourceError::new("ConnectionError", "connection reset").into())
    });
    calls
}

/// Cache key function that panics for params carrying a `boom` entry.
pub fn exploding_key_fn() -> CacheKeyFn {
    CacheKeyFn::new(|name, p| {
        if p.contains_key("boom") {
            panic!("cannot derive a cache key");
        }
        cache_key(name, p)
    })
}

/// Memory cache that records which thread served each call.
#[derive(Default)]
pub struct ThreadRecordingCache {
    inner: MemoryCache,
    pub threads: Mutex<Vec<ThreadId>>,
}

impl ThreadRecordingCache {
    fn record(&self) {
        self.threads.lock().unwrap().push(std::thread::current().id());
    }
}

impl CacheBackend for ThreadRecordingCache {
    fn get(&self, key: &str) -> Option<Value> {
        self.record();
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: Value) -> Result<(), ExecutorError> {
        self.record();
        self.inner.set(key, value)
    }
}

/// Registers `name` as an interface that sleeps for `delay` and tracks the
/// peak number of concurrent invocations.
pub fn register_sleeper(registry: &InterfaceRegistry, name: &str, delay: Duration) -> Occupancy {
    let occupancy = Occupancy::default();
    let p = occupancy.clone();
    registry.register(name, move |_: &Params| {
        let now = p.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        p.peak.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(delay);
        p.in_flight.fetch_sub(1, Ordering::SeqCst);
        p.calls.fetch_add(1, Ordering::SeqCst);
        Ok(json!("ok"))
    });
    occupancy
}

#[derive(Clone, Default)]
pub struct Occupancy {
    pub in_flight: Arc<AtomicUsize>,
    pub peak: Arc<AtomicUsize>,
    pub calls: Arc<AtomicUsize>,
}

/// Counts hook invocations; optionally vetoes every retry.
#[derive(Default)]
pub struct RecordingPlugin {
    pub veto: bool,
    pub before: AtomicUsize,
    pub after: AtomicUsize,
    pub errors: AtomicUsize,
    pub finals: Mutex<Vec<CallResult>>,
}

impl RecordingPlugin {
    pub fn vetoing() -> Self {
        Self {
            veto: true,
            ..Default::default()
        }
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

impl ExecutorPlugin for RecordingPlugin {
    fn name(&self) -> &str {
        "recording"
    }

    fn before_execute(&self, _task: &CallTask, _context: &ExecutionContext) -> anyhow::Result<()> {
        self.before.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn after_execute(
        &self,
        result: &CallResult,
        _context: &ExecutionContext,
    ) -> anyhow::Result<()> {
        self.after.fetch_add(1, Ordering::SeqCst);
        self.finals.lock().unwrap().push(result.clone());
        Ok(())
    }

    fn on_error(
        &self,
        _task: &CallTask,
        _error: &anyhow::Error,
        _context: &ExecutionContext,
    ) -> anyhow::Result<bool> {
        self.errors.fetch_add(1, Ordering::SeqCst);
        Ok(!self.veto)
    }
}

/// A plugin whose every hook fails or panics.
pub struct BrokenPlugin;

impl ExecutorPlugin for BrokenPlugin {
    fn name(&self) -> &str {
        "broken"
    }

    fn before_execute(&self, _task: &CallTask, _context: &ExecutionContext) -> anyhow::Result<()> {
        panic!("before_execute exploded")
    }

    fn after_execute(
        &self,
        _result: &CallResult,
        _context: &ExecutionContext,
    ) -> anyhow::Result<()> {
        anyhow::bail!("after_execute failed")
    }

    fn on_error(
        &self,
        _task: &CallTask,
        _error: &anyhow::Error,
        _context: &ExecutionContext,
    ) -> anyhow::Result<bool> {
        anyhow::bail!("on_error failed")
    }
}
