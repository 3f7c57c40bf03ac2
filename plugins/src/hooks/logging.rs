use fetchgate_core::{CallResult, CallTask, ExecutionContext, ExecutorPlugin};

/// Emits a structured `tracing` event for every task start, failed attempt
/// and final result.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingPlugin;

impl LoggingPlugin {
    pub fn new() -> Self {
        Self
    }
}

impl ExecutorPlugin for LoggingPlugin {
    fn name(&self) -> &str {
        "logging"
    }

    fn before_execute(&self, task: &CallTask, context: &ExecutionContext) -> anyhow::Result<()> {
        tracing::info!(
            target: "fetchgate.task",
            session = %context.session_id,
            task_id = %task.task_id,
            interface = %task.interface_name,
            priority = task.priority,
            max_attempts = task.max_attempts(),
            symbol = task.symbol.as_deref().unwrap_or(""),
            "task.start"
        );
        Ok(())
    }

    fn after_execute(&self, result: &CallResult, context: &ExecutionContext) -> anyhow::Result<()> {
        let elapsed_ms = result.execution_time.as_millis() as u64;
        if result.success {
            tracing::info!(
                target: "fetchgate.task",
                session = %context.session_id,
                task_id = %result.task_id,
                interface = %result.interface_name,
                attempts = result.metadata.total_attempts,
                from_cache = result.metadata.from_cache,
                elapsed_ms,
                "task.success"
            );
        } else {
            tracing::warn!(
                target: "fetchgate.task",
                session = %context.session_id,
                task_id = %result.task_id,
                interface = %result.interface_name,
                attempts = result.metadata.total_attempts,
                kind = %result.error_kind().map(|k| k.as_str()).unwrap_or("UNKNOWN"),
                error = result.error.as_deref().unwrap_or(""),
                elapsed_ms,
                "task.failure"
            );
        }
        Ok(())
    }

    fn on_error(
        &self,
        task: &CallTask,
        error: &anyhow::Error,
        context: &ExecutionContext,
    ) -> anyhow::Result<bool> {
        tracing::debug!(
            target: "fetchgate.task",
            session = %context.session_id,
            task_id = %task.task_id,
            interface = %task.interface_name,
            error = %format!("{error:#}"),
            "task.attempt_failed"
        );
        Ok(true)
    }
}
