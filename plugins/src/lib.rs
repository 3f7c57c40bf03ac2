pub mod cache;
pub mod factory;
pub mod hooks;

pub use cache::FileCache;
pub use factory::{build_cache, build_executor, build_plugins};
pub use hooks::{InterfaceStats, LoggingPlugin, RetryBudgetPlugin, StatsPlugin};
