use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::config::RateLimit;

/// Granularity of the admission wait loops.
const MIN_WAIT: Duration = Duration::from_millis(1);

/// Sliding-window admission control for one interface.
///
/// Never admits more than `max_calls` within any rolling `time_window`.
#[derive(Debug)]
pub struct RateLimiter {
    limit: RateLimit,
    calls: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(limit: RateLimit) -> Self {
        Self {
            limit,
            calls: Mutex::new(VecDeque::with_capacity(limit.max_calls as usize)),
        }
    }

    pub fn limit(&self) -> RateLimit {
        self.limit
    }

    fn prune(calls: &mut VecDeque<Instant>, now: Instant, window: Duration) {
        while let Some(&oldest) = calls.front() {
            if now.duration_since(oldest) >= window {
                calls.pop_front();
            } else {
                break;
            }
        }
    }

    /// Record a call and return `true` if the window has room.
    pub fn acquire(&self) -> bool {
        let now = Instant::now();
        let mut calls = self.calls.lock().unwrap_or_else(PoisonError::into_inner);
        Self::prune(&mut calls, now, self.limit.time_window());
        if calls.len() < self.limit.max_calls as usize {
            calls.push_back(now);
            true
        } else {
            false
        }
    }

    /// Time until the oldest recorded call leaves the window.
    pub fn wait_time(&self) -> Duration {
        let now = Instant::now();
        let window = self.limit.time_window();
        let mut calls = self.calls.lock().unwrap_or_else(PoisonError::into_inner);
        Self::prune(&mut calls, now, window);
        match calls.front() {
            Some(&oldest) => window.saturating_sub(now.duration_since(oldest)),
            None => Duration::ZERO,
        }
    }

    /// Remaining admissions in the current window.
    pub fn available(&self) -> u32 {
        let now = Instant::now();
        let mut calls = self.calls.lock().unwrap_or_else(PoisonError::into_inner);
        Self::prune(&mut calls, now, self.limit.time_window());
        self.limit.max_calls.saturating_sub(calls.len() as u32)
    }

    /// Block the current thread until admitted. Returns the time spent waiting.
    pub fn acquire_blocking(&self) -> Duration {
        let start = Instant::now();
        while !self.acquire() {
            std::thread::sleep(self.wait_time().max(MIN_WAIT));
        }
        start.elapsed()
    }

    /// Wait without blocking the runtime until admitted.
    pub async fn acquire_async(&self) -> Duration {
        let start = Instant::now();
        while !self.acquire() {
            tokio::time::sleep(self.wait_time().max(MIN_WAIT)).await;
        }
        start.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn limiter(max_calls: u32, window_ms: u64) -> RateLimiter {
        RateLimiter::new(RateLimit::new(max_calls, Duration::from_millis(window_ms)))
    }

    #[test]
    fn admits_up_to_max_then_recovers() {
        let rl = limiter(2, 500);
        assert!(rl.acquire());
        assert!(rl.acquire());
        assert!(!rl.acquire());
        assert_eq!(rl.available(), 0);

        let wait = rl.wait_time();
        assert!(wait > Duration::ZERO && wait <= Duration::from_millis(500));
        std::thread::sleep(wait + Duration::from_millis(5));
        assert!(rl.acquire());
    }

    #[test]
    fn wait_time_is_zero_when_idle() {
        let rl = limiter(1, 100);
        assert_eq!(rl.wait_time(), Duration::ZERO);
        assert_eq!(rl.available(), 1);
    }

    #[test]
    fn concurrent_acquires_never_exceed_limit() {
        let rl = Arc::new(limiter(5, 10_000));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let rl = rl.clone();
                std::thread::spawn(move || (0..4).filter(|_| rl.acquire()).count())
            })
            .collect();
        let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(admitted, 5);
    }

    #[test]
    fn blocking_acquire_waits_for_window() {
        let rl = limiter(1, 100);
        assert!(rl.acquire());
        let waited = rl.acquire_blocking();
        assert!(waited >= Duration::from_millis(90), "waited {waited:?}");
    }

    #[tokio::test]
    async fn async_acquire_waits_for_window() {
        let rl = limiter(1, 100);
        assert!(rl.acquire());
        let waited = rl.acquire_async().await;
        assert!(waited >= Duration::from_millis(90), "waited {waited:?}");
    }
}
