use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;

use fetchgate_core::{CallResult, CallTask, ExecutionContext, ExecutorPlugin};

/// Counters for one interface.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InterfaceStats {
    pub tasks: u64,
    pub successes: u64,
    pub failures: u64,
    /// Attempts that ended in an error, including ones later retried.
    pub failed_attempts: u64,
    pub cache_hits: u64,
    pub total_time: Duration,
}

impl InterfaceStats {
    pub fn success_rate(&self) -> f64 {
        let done = self.successes + self.failures;
        if done == 0 {
            return 0.0;
        }
        self.successes as f64 / done as f64
    }
}

/// Aggregates per-interface execution counters.
#[derive(Debug, Default)]
pub struct StatsPlugin {
    stats: Mutex<BTreeMap<String, InterfaceStats>>,
}

impl StatsPlugin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the current counters, keyed by interface name.
    pub fn snapshot(&self) -> BTreeMap<String, InterfaceStats> {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn get(&self, interface: &str) -> Option<InterfaceStats> {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(interface)
            .cloned()
    }

    pub fn reset(&self) {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn update(&self, interface: &str, f: impl FnOnce(&mut InterfaceStats)) {
        let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        f(stats.entry(interface.to_string()).or_default());
    }
}

impl ExecutorPlugin for StatsPlugin {
    fn name(&self) -> &str {
        "stats"
    }

    fn before_execute(&self, task: &CallTask, _context: &ExecutionContext) -> anyhow::Result<()> {
        self.update(&task.interface_name, |s| s.tasks += 1);
        Ok(())
    }

    fn after_execute(
        &self,
        result: &CallResult,
        _context: &ExecutionContext,
    ) -> anyhow::Result<()> {
        self.update(&result.interface_name, |s| {
            if result.success {
                s.successes += 1;
            } else {
                s.failures += 1;
            }
            if result.metadata.from_cache {
                s.cache_hits += 1;
            }
            s.total_time += result.execution_time;
        });
        Ok(())
    }

    fn on_error(
        &self,
        task: &CallTask,
        _error: &anyhow::Error,
        _context: &ExecutionContext,
    ) -> anyhow::Result<bool> {
        self.update(&task.interface_name, |s| s.failed_attempts += 1);
        Ok(true)
    }
}
