//! Uniform execution of third-party data-fetch interfaces.
//!
//! Callers describe work as [`CallTask`]s; the [`InterfaceExecutor`] resolves
//! each interface through an injected [`InterfaceResolver`] and runs it with
//! per-interface rate limiting, result caching, adaptive timeouts and
//! retry with jittered exponential backoff. [`TaskManager`] adds a priority
//! queue in front of the executor.

pub mod cache;
pub mod config;
pub mod error;
pub mod executor;
pub mod queue;
pub mod rate_limit;
pub mod timeout;
pub mod util;

pub use cache::{CacheBackend, MemoryCache};
pub use config::ExecutorConfig;
pub use error::{ErrorClassifier, ErrorKind, ExecutorError, SourceError};
pub use executor::traits::{
    ExecutorPlugin, FixedJitter, InterfaceMetadata, InterfaceResolver, Invocable, JitterSource,
    RandomJitter,
};
pub use executor::{
    BatchResult, CallResult, CallTask, ExecutionContext, InterfaceExecutor, InterfaceRegistry,
    Params, ResultCallback,
};
pub use queue::{TaskManager, TaskQueue};
pub use rate_limit::RateLimiter;
