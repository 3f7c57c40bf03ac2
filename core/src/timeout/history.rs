use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Samples kept per interface before trimming.
pub const HISTORY_LIMIT: usize = 50;
/// Samples left after a trim.
pub const HISTORY_KEEP: usize = 30;
/// Samples averaged for a suggestion.
pub const RECENT_SAMPLES: usize = 10;
pub const TIMEOUT_MULTIPLIER: f64 = 2.5;

/// Rolling per-interface record of observed call durations.
///
/// The lock is held only for short, synchronous sections and never across an
/// `.await`, so the same helper serves both timeout strategies.
#[derive(Debug, Default)]
pub struct DurationHistory {
    samples: Mutex<HashMap<String, VecDeque<Duration>>>,
}

impl DurationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, interface: &str, elapsed: Duration) {
        let mut samples = self.samples.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = samples.entry(interface.to_string()).or_default();
        entry.push_back(elapsed);
        if entry.len() > HISTORY_LIMIT {
            let excess = entry.len() - HISTORY_KEEP;
            entry.drain(..excess);
        }
    }

    /// `max(avg(last 10) * 2.5, configured)`, or `configured` with no samples.
    pub fn suggest(&self, interface: &str, configured: Duration) -> Duration {
        let samples = self.samples.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(entry) = samples.get(interface).filter(|e| !e.is_empty()) else {
            return configured;
        };
        let recent: Vec<Duration> = entry.iter().rev().take(RECENT_SAMPLES).copied().collect();
        let avg = recent.iter().sum::<Duration>() / recent.len() as u32;
        avg.mul_f64(TIMEOUT_MULTIPLIER).max(configured)
    }

    pub fn len(&self, interface: &str) -> usize {
        self.samples
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(interface)
            .map_or(0, VecDeque::len)
    }

    pub fn clear(&self) {
        self.samples
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
