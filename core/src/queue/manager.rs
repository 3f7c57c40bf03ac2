use std::sync::Arc;

use crate::executor::types::{BatchResult, CallTask, ExecutionContext, Params};
use crate::executor::{InterfaceExecutor, ResultCallback};

use super::queue::TaskQueue;

/// Organizes tasks and hands them to an [`InterfaceExecutor`].
///
/// Holds no execution policy of its own: retries, timeouts and concurrency
/// all come from the executor.
pub struct TaskManager {
    executor: Arc<InterfaceExecutor>,
    queue: TaskQueue,
}

impl TaskManager {
    pub fn new(executor: Arc<InterfaceExecutor>) -> Self {
        Self {
            executor,
            queue: TaskQueue::new(),
        }
    }

    pub fn executor(&self) -> &Arc<InterfaceExecutor> {
        &self.executor
    }

    /// Build a task using the executor's retry defaults.
    pub fn create_task(&self, interface_name: impl Into<String>, params: Params) -> CallTask {
        self.executor.task(interface_name, params)
    }

    pub fn add_task(&mut self, task: CallTask) -> String {
        self.queue.add_task(task)
    }

    pub fn add_tasks(&mut self, tasks: impl IntoIterator<Item = CallTask>) -> Vec<String> {
        tasks.into_iter().map(|t| self.queue.add_task(t)).collect()
    }

    pub fn get_task(&self, task_id: &str) -> Option<&CallTask> {
        self.queue.get(task_id)
    }

    pub fn get_queue_size(&self) -> usize {
        self.queue.len()
    }

    pub fn clear_queue(&mut self) {
        self.queue.clear();
    }

    /// Drain the queue in priority order and run it sequentially.
    pub fn execute_all(&mut self, ctx: Option<&ExecutionContext>) -> BatchResult {
        let tasks = self.queue.drain();
        self.executor.execute_batch(&tasks, ctx)
    }

    /// Drain the queue and run it on the executor's async worker pool.
    pub async fn execute_all_async(
        &mut self,
        callback: Option<ResultCallback>,
        ctx: Option<&ExecutionContext>,
    ) -> BatchResult {
        let tasks = self.queue.drain();
        self.executor.execute_async(tasks, callback, ctx).await
    }

    /// Run only the queued tasks matching `predicate`; the rest are requeued.
    pub fn execute_by_filter<P>(
        &mut self,
        predicate: P,
        ctx: Option<&ExecutionContext>,
    ) -> BatchResult
    where
        P: Fn(&CallTask) -> bool,
    {
        let (matched, rest): (Vec<CallTask>, Vec<CallTask>) =
            self.queue.drain().into_iter().partition(|t| predicate(t));
        for task in rest {
            self.queue.add_task(task);
        }
        tracing::debug!(matched = matched.len(), requeued = self.queue.len(), "filtered execution");
        self.executor.execute_batch(&matched, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::InterfaceRegistry;
    use serde_json::json;

    fn manager() -> TaskManager {
        let registry = Arc::new(InterfaceRegistry::new());
        registry.register("echo", |p: &Params| Ok(json!(p)));
        let executor = InterfaceExecutor::builder(registry).build().unwrap();
        TaskManager::new(Arc::new(executor))
    }

    #[test]
    fn queue_size_tracks_adds_and_clear() {
        let mut m = manager();
        let t = m.create_task("echo", Params::new());
        let id = m.add_task(t);
        m.add_tasks(vec![
            CallTask::new("echo", Params::new()),
            CallTask::new("echo", Params::new()),
        ]);
        assert_eq!(m.get_queue_size(), 3);
        assert!(m.get_task(&id).is_some());

        m.clear_queue();
        assert_eq!(m.get_queue_size(), 0);
        assert!(m.get_task(&id).is_none());
    }

    #[test]
    fn async_drain_empties_queue() {
        let mut m = manager();
        m.add_task(CallTask::new("echo", Params::new()).with_priority(2));
        m.add_task(CallTask::new("missing", Params::new()).with_priority(1));

        let batch = tokio_test::block_on(m.execute_all_async(None, None));

        assert_eq!(batch.total_tasks, 2);
        assert_eq!(batch.successful_tasks, 1);
        assert_eq!(m.get_queue_size(), 0);
    }
}
