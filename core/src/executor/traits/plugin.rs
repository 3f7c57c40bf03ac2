use crate::executor::types::{CallResult, CallTask, ExecutionContext};

/// Cross-cutting hooks invoked around every task.
///
/// Hook failures (errors or panics) are logged by the executor and never
/// abort the task they were called for.
pub trait ExecutorPlugin: Send + Sync {
    fn name(&self) -> &str;

    /// Called once per task, before the first attempt.
    fn before_execute(&self, _task: &CallTask, _context: &ExecutionContext) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called exactly once per task with the final result.
    fn after_execute(
        &self,
        _result: &CallResult,
        _context: &ExecutionContext,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called after every failed attempt. Returning `false` vetoes any
    /// further retry of this task.
    fn on_error(
        &self,
        _task: &CallTask,
        _error: &anyhow::Error,
        _context: &ExecutionContext,
    ) -> anyhow::Result<bool> {
        Ok(true)
    }
}
