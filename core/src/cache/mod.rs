//! Result caching.
//!
//! The executor consults the cache before every attempt and writes to it only
//! after a successful invocation. Backends are pluggable through
//! [`CacheBackend`]; [`MemoryCache`] is the bounded in-process default.

mod key;
mod memory;

pub use key::cache_key;
pub use memory::MemoryCache;

use crate::error::ExecutorError;

/// Key/value store for interface results.
///
/// Implementations may block (e.g. on disk I/O). The async executor path
/// calls them from a blocking worker thread, never on the runtime itself.
pub trait CacheBackend: Send + Sync {
    fn get(&self, key: &str) -> Option<serde_json::Value>;

    /// Store `value`; a failure ([`ExecutorError::Cache`]) is logged by the
    /// executor and never fails the call that produced the value.
    fn set(&self, key: &str, value: serde_json::Value) -> Result<(), ExecutorError>;
}
