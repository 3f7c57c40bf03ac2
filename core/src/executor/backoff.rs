use std::time::Duration;

use crate::config::RetryConfig;

use super::traits::JitterSource;

/// Delay after failed attempt `attempt` (0-based).
///
/// `base * exponential_base^attempt`, plus a jitter fraction of that value,
/// capped at `max_delay`.
pub fn backoff_delay(cfg: &RetryConfig, attempt: u32, jitter: &dyn JitterSource) -> Duration {
    let exp = i32::try_from(attempt).unwrap_or(i32::MAX);
    let raw = cfg.base_delay().as_secs_f64() * cfg.exponential_base.powi(exp);
    let jittered = raw * (1.0 + jitter.fraction(cfg.jitter_min, cfg.jitter_max));
    let capped = jittered.min(cfg.max_delay().as_secs_f64()).max(0.0);
    Duration::try_from_secs_f64(capped).unwrap_or(cfg.max_delay())
}
