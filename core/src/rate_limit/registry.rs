use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::config::RateLimit;
use crate::executor::traits::InterfaceMetadata;

use super::limiter::RateLimiter;

/// Lazily built rate limiters, one per interface.
pub struct RateLimiterRegistry {
    configured: HashMap<String, RateLimit>,
    metadata: Option<Arc<dyn InterfaceMetadata>>,
    limiters: Mutex<HashMap<String, Option<Arc<RateLimiter>>>>,
}

impl RateLimiterRegistry {
    pub fn new(
        configured: HashMap<String, RateLimit>,
        metadata: Option<Arc<dyn InterfaceMetadata>>,
    ) -> Self {
        Self {
            configured,
            metadata,
            limiters: Mutex::new(HashMap::new()),
        }
    }

    /// Limiter for `interface`, or `None` when the interface is unlimited.
    ///
    /// Explicit config wins over the metadata frequency hint. The decision is
    /// made once per interface and remembered.
    pub fn get(&self, interface: &str) -> Option<Arc<RateLimiter>> {
        let mut limiters = self.limiters.lock().unwrap_or_else(PoisonError::into_inner);
        limiters
            .entry(interface.to_string())
            .or_insert_with(|| {
                self.limit_for(interface).map(|limit| {
                    tracing::debug!(
                        interface,
                        max_calls = limit.max_calls,
                        window_ms = limit.time_window_ms,
                        "rate limiter created"
                    );
                    Arc::new(RateLimiter::new(limit))
                })
            })
            .clone()
    }

    fn limit_for(&self, interface: &str) -> Option<RateLimit> {
        if let Some(limit) = self.configured.get(interface) {
            return Some(*limit);
        }
        self.metadata
            .as_ref()
            .and_then(|m| m.calls_per_minute(interface))
            .filter(|cpm| *cpm > 0)
            .map(RateLimit::per_minute)
    }
}
