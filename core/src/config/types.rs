use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ExecutorError;
use crate::executor::types::Params;

/// Top-level executor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Hook plugins to build by name (see the plugins factory).
    #[serde(default)]
    pub plugins: Vec<String>,

    /// Explicit per-interface rate limits.
    #[serde(default)]
    pub rate_limits: HashMap<String, RateLimit>,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub timeout: TimeoutConfig,

    /// Worker count for the hard-cancel timeout pool.
    #[serde(default = "default_thread_pool_size")]
    pub thread_pool_size: usize,

    #[serde(default, rename = "async")]
    pub async_exec: AsyncConfig,

    /// Replaces the default cache key derivation.
    #[serde(skip)]
    pub cache_key_fn: Option<CacheKeyFn>,
}

fn default_thread_pool_size() -> usize {
    num_cpus::get().max(1)
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            plugins: Vec::new(),
            rate_limits: HashMap::new(),
            cache: CacheConfig::default(),
            retry: RetryConfig::default(),
            timeout: TimeoutConfig::default(),
            thread_pool_size: default_thread_pool_size(),
            async_exec: AsyncConfig::default(),
            cache_key_fn: None,
        }
    }
}

impl ExecutorConfig {
    pub fn validate(&self) -> Result<(), ExecutorError> {
        if self.thread_pool_size == 0 {
            return Err(ExecutorError::Config("thread_pool_size must be > 0".into()));
        }
        if self.async_exec.max_concurrency == 0 {
            return Err(ExecutorError::Config("async.max_concurrency must be > 0".into()));
        }
        if self.async_exec.batch_size == 0 {
            return Err(ExecutorError::Config("async.batch_size must be > 0".into()));
        }
        for (name, limit) in &self.rate_limits {
            if limit.max_calls == 0 || limit.time_window_ms == 0 {
                return Err(ExecutorError::Config(format!(
                    "rate limit for '{name}' needs max_calls > 0 and time_window_ms > 0"
                )));
            }
        }
        self.retry.validate()
    }

    /// Timeout configured for `interface`, before any adaptive adjustment.
    pub fn configured_timeout(&self, interface: &str) -> Duration {
        let ms = self
            .timeout
            .interface_timeouts_ms
            .get(interface)
            .copied()
            .unwrap_or(self.timeout.default_timeout_ms);
        Duration::from_millis(ms)
    }
}

/// Custom cache key derivation: `(interface_name, params) -> key`.
#[derive(Clone)]
pub struct CacheKeyFn(pub Arc<dyn Fn(&str, &Params) -> String + Send + Sync>);

impl CacheKeyFn {
    pub fn new(f: impl Fn(&str, &Params) -> String + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn key(&self, interface: &str, params: &Params) -> String {
        (self.0)(interface, params)
    }
}

impl fmt::Debug for CacheKeyFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CacheKeyFn(..)")
    }
}

/// At most `max_calls` admissions within any rolling `time_window_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimit {
    pub max_calls: u32,
    pub time_window_ms: u64,
}

impl RateLimit {
    pub fn new(max_calls: u32, time_window: Duration) -> Self {
        Self {
            max_calls,
            time_window_ms: time_window.as_millis() as u64,
        }
    }

    /// Limit derived from a calls-per-minute hint.
    pub fn per_minute(calls: u32) -> Self {
        Self::new(calls, Duration::from_secs(60))
    }

    pub fn time_window(&self) -> Duration {
        Duration::from_millis(self.time_window_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_exponential_base")]
    pub exponential_base: f64,
    /// Lower bound of the jitter fraction added to each delay.
    #[serde(default = "default_jitter_min")]
    pub jitter_min: f64,
    /// Upper bound of the jitter fraction added to each delay.
    #[serde(default = "default_jitter_max")]
    pub jitter_max: f64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    60_000
}

fn default_exponential_base() -> f64 {
    2.0
}

fn default_jitter_min() -> f64 {
    0.1
}

fn default_jitter_max() -> f64 {
    0.3
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            exponential_base: default_exponential_base(),
            jitter_min: default_jitter_min(),
            jitter_max: default_jitter_max(),
        }
    }
}

impl RetryConfig {
    pub fn validate(&self) -> Result<(), ExecutorError> {
        if self.exponential_base <= 0.0 {
            return Err(ExecutorError::Config("retry.exponential_base must be > 0".into()));
        }
        if self.base_delay_ms > self.max_delay_ms {
            return Err(ExecutorError::Config(
                "retry.base_delay_ms must not exceed retry.max_delay_ms".into(),
            ));
        }
        if !(0.0..=self.jitter_max).contains(&self.jitter_min) {
            return Err(ExecutorError::Config(
                "retry jitter bounds must satisfy 0 <= jitter_min <= jitter_max".into(),
            ));
        }
        Ok(())
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendKind {
    #[default]
    Memory,
    File,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub backend: CacheBackendKind,
    /// Entry bound for the memory backend.
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
    #[serde(default)]
    pub ttl_secs: Option<u64>,
    /// Directory for the file backend.
    #[serde(default)]
    pub directory: Option<String>,
}

fn default_cache_enabled() -> bool {
    true
}

fn default_cache_capacity() -> usize {
    1024
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            backend: CacheBackendKind::default(),
            capacity: default_cache_capacity(),
            ttl_secs: None,
            directory: None,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,
    #[serde(default)]
    pub interface_timeouts_ms: HashMap<String, u64>,
    /// Guard synchronous calls with the hard-cancel worker pool.
    #[serde(default = "default_true")]
    pub use_thread_pool: bool,
    /// Guard asynchronous calls with the cooperative await timeout.
    #[serde(default = "default_true")]
    pub use_async: bool,
    /// Stretch timeouts for interfaces that are observed to run slow.
    #[serde(default = "default_true")]
    pub adaptive: bool,
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_true() -> bool {
    true
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: default_timeout_ms(),
            interface_timeouts_ms: HashMap::new(),
            use_thread_pool: true,
            use_async: true,
            adaptive: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsyncConfig {
    /// Number of worker coroutines in `execute_async`.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Capacity of the internal work queue feeding the workers.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_max_concurrency() -> usize {
    10
}

fn default_batch_size() -> usize {
    100
}

impl Default for AsyncConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            batch_size: default_batch_size(),
        }
    }
}
