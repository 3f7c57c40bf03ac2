use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use fetchgate_core::{CallResult, CallTask, ExecutionContext, ExecutorPlugin};

pub const DEFAULT_MAX_CONSECUTIVE_FAILURES: u32 = 5;

/// Stops retrying an interface that keeps failing.
///
/// Failed attempts are counted per interface across tasks. Once the count
/// reaches the threshold every further failure is vetoed, so each task gives
/// up after its first attempt. Any success for the interface resets it.
#[derive(Debug)]
pub struct RetryBudgetPlugin {
    max_consecutive_failures: u32,
    failures: Mutex<HashMap<String, u32>>,
}

impl Default for RetryBudgetPlugin {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONSECUTIVE_FAILURES)
    }
}

impl RetryBudgetPlugin {
    pub fn new(max_consecutive_failures: u32) -> Self {
        Self {
            max_consecutive_failures: max_consecutive_failures.max(1),
            failures: Mutex::new(HashMap::new()),
        }
    }

    pub fn consecutive_failures(&self, interface: &str) -> u32 {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(interface)
            .copied()
            .unwrap_or(0)
    }

    pub fn is_exhausted(&self, interface: &str) -> bool {
        self.consecutive_failures(interface) >= self.max_consecutive_failures
    }
}

impl ExecutorPlugin for RetryBudgetPlugin {
    fn name(&self) -> &str {
        "retry-budget"
    }

    fn after_execute(
        &self,
        result: &CallResult,
        _context: &ExecutionContext,
    ) -> anyhow::Result<()> {
        if result.success {
            let mut failures = self.failures.lock().unwrap_or_else(PoisonError::into_inner);
            if failures.remove(&result.interface_name).is_some() {
                tracing::debug!(interface = %result.interface_name, "retry budget restored");
            }
        }
        Ok(())
    }

    fn on_error(
        &self,
        task: &CallTask,
        _error: &anyhow::Error,
        _context: &ExecutionContext,
    ) -> anyhow::Result<bool> {
        let mut failures = self.failures.lock().unwrap_or_else(PoisonError::into_inner);
        let count = failures.entry(task.interface_name.clone()).or_insert(0);
        *count = count.saturating_add(1);
        if *count >= self.max_consecutive_failures {
            tracing::warn!(
                interface = %task.interface_name,
                consecutive_failures = *count,
                "retry budget exhausted"
            );
            return Ok(false);
        }
        Ok(true)
    }
}
