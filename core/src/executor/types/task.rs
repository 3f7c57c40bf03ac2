use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Call parameters. Sorted keys keep serialization (and cache keys) stable.
pub type Params = BTreeMap<String, serde_json::Value>;

pub const DEFAULT_RETRY_COUNT: u32 = 3;

/// One interface invocation plus its execution policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallTask {
    pub task_id: String,
    pub interface_name: String,
    pub params: Params,

    /// Higher runs first.
    pub priority: i32,

    /// Maximum number of attempts.
    pub retry_count: u32,

    /// `None` falls back to the configured timeout.
    pub timeout: Option<Duration>,

    /// Free-form side channel for plugins and callers.
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,

    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub market: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl CallTask {
    pub fn new(interface_name: impl Into<String>, params: Params) -> Self {
        Self {
            task_id: Uuid::new_v4().to_string(),
            interface_name: interface_name.into(),
            params,
            priority: 0,
            retry_count: DEFAULT_RETRY_COUNT,
            timeout: None,
            metadata: HashMap::new(),
            symbol: None,
            market: None,
            tags: Vec::new(),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    /// A zero duration leaves the timeout unset.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    pub fn with_market(mut self, market: impl Into<String>) -> Self {
        self.market = Some(market.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Attempts the executor will make at most; never less than one.
    pub fn max_attempts(&self) -> u32 {
        self.retry_count.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn task_ids_are_unique() {
        let a = CallTask::new("stock_zh_a_hist", Params::new());
        let b = CallTask::new("stock_zh_a_hist", Params::new());
        assert_ne!(a.task_id, b.task_id);
    }

    #[test]
    fn builder_sets_policy() {
        let task = CallTask::new("index_daily", Params::new())
            .with_priority(5)
            .with_retry_count(0)
            .with_timeout(Duration::ZERO)
            .with_symbol("000300")
            .with_tags(["index", "daily"])
            .with_metadata("source", json!("csindex"));

        assert_eq!(task.priority, 5);
        assert_eq!(task.max_attempts(), 1);
        assert_eq!(task.timeout, None);
        assert_eq!(task.symbol.as_deref(), Some("000300"));
        assert_eq!(task.tags, vec!["index", "daily"]);
        assert_eq!(task.metadata["source"], json!("csindex"));

        let task = task.with_timeout(Duration::from_secs(5));
        assert_eq!(task.timeout, Some(Duration::from_secs(5)));
    }
}
