//! Timeout strategies.
//!
//! Synchronous calls get a hard timeout by running on a disposable worker
//! ([`ThreadPoolTimeout`]); asynchronous calls use the runtime's own timeout
//! ([`CooperativeTimeout`]). Both adapt per interface through a shared
//! [`DurationHistory`]. With neither enabled the executor falls back to a soft
//! timeout: the call runs to completion and is failed afterwards if it overran.

mod cooperative;
mod history;
mod thread_pool;

use std::time::Duration;

pub use cooperative::CooperativeTimeout;
pub use history::{DurationHistory, HISTORY_KEEP, HISTORY_LIMIT, RECENT_SAMPLES, TIMEOUT_MULTIPLIER};
pub use thread_pool::ThreadPoolTimeout;

pub trait TimeoutStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn history(&self) -> &DurationHistory;

    /// Adaptive timeout for `interface`, never below `configured`.
    fn suggested_timeout(&self, interface: &str, configured: Duration) -> Duration {
        self.history().suggest(interface, configured)
    }
}
