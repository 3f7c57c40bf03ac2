use std::sync::Arc;

use crate::error::ExecutorError;
use crate::executor::types::Params;

/// A single data-fetch operation.
///
/// Invocations are blocking; the async path moves them onto a blocking
/// worker thread.
pub trait Invocable: Send + Sync {
    fn invoke(&self, params: &Params) -> anyhow::Result<serde_json::Value>;
}

impl<F> Invocable for F
where
    F: Fn(&Params) -> anyhow::Result<serde_json::Value> + Send + Sync,
{
    fn invoke(&self, params: &Params) -> anyhow::Result<serde_json::Value> {
        self(params)
    }
}

/// Maps an interface name to its invocable.
pub trait InterfaceResolver: Send + Sync {
    fn resolve(&self, interface_name: &str) -> Result<Arc<dyn Invocable>, ExecutorError>;
}

/// Optional per-interface metadata.
pub trait InterfaceMetadata: Send + Sync {
    /// Call frequency hint used to seed a rate limiter when none is configured.
    fn calls_per_minute(&self, interface_name: &str) -> Option<u32>;
}
