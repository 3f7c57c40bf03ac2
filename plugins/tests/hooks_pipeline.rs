use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use fetchgate_core::config::ExecutorConfig;
use fetchgate_core::{
    CallTask, ExecutorPlugin, FixedJitter, InterfaceExecutor, InterfaceRegistry, Params,
    SourceError,
};
use fetchgate_plugins::{LoggingPlugin, RetryBudgetPlugin, StatsPlugin};
use pretty_assertions::assert_eq;
use serde_json::json;

fn config() -> ExecutorConfig {
    let mut cfg = ExecutorConfig::default();
    cfg.retry.base_delay_ms = 5;
    cfg.retry.max_delay_ms = 50;
    cfg.thread_pool_size = 2;
    cfg
}

fn executor(
    registry: Arc<InterfaceRegistry>,
    plugins: Vec<Arc<dyn ExecutorPlugin>>,
) -> InterfaceExecutor {
    InterfaceExecutor::builder(registry.clone())
        .metadata(registry)
        .config(config())
        .plugins(plugins)
        .jitter(Arc::new(FixedJitter(0.0)))
        .build()
        .unwrap()
}

fn always_failing(registry: &InterfaceRegistry, name: &str) -> Arc<AtomicUsize> {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    registry.register(name, move |_: &Params| {
        counter.fetch_add(1, Ordering::SeqCst);
        Err(SourceError::new("ConnectionError", "remote end closed").into())
    });
    calls
}

#[test]
fn retry_budget_cuts_off_a_failing_interface() {
    let registry = Arc::new(InterfaceRegistry::new());
    let calls = always_failing(&registry, "down");
    let budget = Arc::new(RetryBudgetPlugin::new(4));
    let exec = executor(registry, vec![budget.clone() as Arc<dyn ExecutorPlugin>]);

    // First task burns three attempts, second hits the budget on its first.
    let first = exec.execute_task(
        &CallTask::new("down", Params::new()).with_retry_count(3),
        &Default::default(),
    );
    assert_eq!(first.metadata.total_attempts, 3);

    let second = exec.execute_task(
        &CallTask::new("down", Params::new()).with_retry_count(3),
        &Default::default(),
    );
    assert!(!second.success);
    assert_eq!(second.metadata.total_attempts, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert!(budget.is_exhausted("down"));
}

#[test]
fn stats_track_a_mixed_batch() {
    let registry = Arc::new(InterfaceRegistry::new());
    always_failing(&registry, "down");
    registry.register("up", |p: &Params| Ok(json!(p)));
    let stats = Arc::new(StatsPlugin::new());
    let exec = executor(
        registry,
        vec![Arc::new(LoggingPlugin::new()), stats.clone() as Arc<dyn ExecutorPlugin>],
    );

    let up = || CallTask::new("up", Params::new());
    let tasks = vec![up(), up(), CallTask::new("down", Params::new()).with_retry_count(2)];
    let batch = exec.execute_batch(&tasks, None);
    assert_eq!(batch.successful_tasks, 2);

    let snap = stats.snapshot();
    assert_eq!(snap["up"].tasks, 2);
    assert_eq!(snap["up"].successes, 2);
    assert_eq!(snap["up"].cache_hits, 1);
    assert_eq!(snap["down"].failures, 1);
    assert_eq!(snap["down"].failed_attempts, 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn stats_see_async_batches() {
    let registry = Arc::new(InterfaceRegistry::new());
    registry.register("up", |p: &Params| Ok(json!(p)));
    let stats = Arc::new(StatsPlugin::new());
    let exec = executor(registry, vec![stats.clone() as Arc<dyn ExecutorPlugin>]);

    let tasks: Vec<CallTask> = (0..8)
        .map(|i| CallTask::new("up", [("i".to_string(), json!(i))].into_iter().collect()))
        .collect();
    let batch = exec.execute_async(tasks, None, None).await;

    assert_eq!(batch.successful_tasks, 8);
    let up = stats.get("up").unwrap();
    assert_eq!(up.tasks, 8);
    assert_eq!(up.successes, 8);
    assert_eq!(up.success_rate(), 1.0);
}
