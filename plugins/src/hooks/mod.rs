pub mod logging;
pub mod retry_budget;
pub mod stats;

pub use logging::LoggingPlugin;
pub use retry_budget::RetryBudgetPlugin;
pub use stats::{InterfaceStats, StatsPlugin};
