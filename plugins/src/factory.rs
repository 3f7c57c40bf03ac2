use std::sync::Arc;

use anyhow::{bail, Context, Result};

use fetchgate_core::config::{CacheBackendKind, ExecutorConfig};
use fetchgate_core::{
    CacheBackend, ExecutorPlugin, InterfaceExecutor, InterfaceRegistry, MemoryCache,
};

use crate::cache::FileCache;
use crate::hooks::{LoggingPlugin, RetryBudgetPlugin, StatsPlugin};

/// Build the hook plugins named in `cfg.plugins`, in order.
pub fn build_plugins(cfg: &ExecutorConfig) -> Result<Vec<Arc<dyn ExecutorPlugin>>> {
    cfg.plugins
        .iter()
        .map(|name| -> Result<Arc<dyn ExecutorPlugin>> {
            match name.as_str() {
                "logging" => Ok(Arc::new(LoggingPlugin::new())),
                "stats" => Ok(Arc::new(StatsPlugin::new())),
                "retry-budget" => Ok(Arc::new(RetryBudgetPlugin::default())),
                other => bail!("unknown plugin: {other}"),
            }
        })
        .collect()
}

/// Cache backend selected by `cfg.cache`, or `None` when caching is off.
pub fn build_cache(cfg: &ExecutorConfig) -> Result<Option<Arc<dyn CacheBackend>>> {
    if !cfg.cache.enabled {
        return Ok(None);
    }

    let cache: Arc<dyn CacheBackend> = match cfg.cache.backend {
        CacheBackendKind::Memory => {
            Arc::new(MemoryCache::new(cfg.cache.capacity, cfg.cache.ttl()))
        }
        CacheBackendKind::File => {
            let dir = cfg
                .cache
                .directory
                .as_deref()
                .context("cache.directory is required for the file backend")?;
            Arc::new(FileCache::new(dir, cfg.cache.ttl())?)
        }
    };
    Ok(Some(cache))
}

/// Wire an executor from configuration, using `registry` both to resolve
/// interfaces and as the rate-limit hint source.
pub fn build_executor(
    cfg: ExecutorConfig,
    registry: Arc<InterfaceRegistry>,
) -> Result<InterfaceExecutor> {
    let plugins = build_plugins(&cfg)?;
    let cache = build_cache(&cfg)?;

    let mut builder = InterfaceExecutor::builder(registry.clone())
        .metadata(registry)
        .plugins(plugins);
    if let Some(cache) = cache {
        builder = builder.cache(cache);
    }
    let executor = builder.config(cfg).build()?;
    tracing::debug!(
        plugins = ?executor.config().plugins,
        backend = ?executor.config().cache.backend,
        "executor built"
    );
    Ok(executor)
}
