use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use super::result::CallResult;
use super::task::CallTask;

pub type PreHook = Arc<dyn Fn(&CallTask) + Send + Sync>;
pub type PostHook = Arc<dyn Fn(&CallResult) + Send + Sync>;
pub type ErrorHook = Arc<dyn Fn(&CallTask, &anyhow::Error) + Send + Sync>;

/// Per-session execution state shared by every task of one run.
#[derive(Clone)]
pub struct ExecutionContext {
    pub session_id: String,
    /// Session-level cache switch; the config-level switch must also be on.
    pub cache_enabled: bool,
    /// Overrides every task and config timeout when set.
    pub timeout_override: Option<Duration>,
    pub pre_hook: Option<PreHook>,
    pub post_hook: Option<PostHook>,
    pub error_hook: Option<ErrorHook>,
    pub user_data: HashMap<String, serde_json::Value>,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            cache_enabled: true,
            timeout_override: None,
            pre_hook: None,
            post_hook: None,
            error_hook: None,
            user_data: HashMap::new(),
        }
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    /// Session-wide timeout. `Duration::ZERO` clears the override.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_override = (!timeout.is_zero()).then_some(timeout);
        self
    }

    pub fn with_pre_hook(mut self, hook: impl Fn(&CallTask) + Send + Sync + 'static) -> Self {
        self.pre_hook = Some(Arc::new(hook));
        self
    }

    pub fn with_post_hook(mut self, hook: impl Fn(&CallResult) + Send + Sync + 'static) -> Self {
        self.post_hook = Some(Arc::new(hook));
        self
    }

    pub fn with_error_hook(
        mut self,
        hook: impl Fn(&CallTask, &anyhow::Error) + Send + Sync + 'static,
    ) -> Self {
        self.error_hook = Some(Arc::new(hook));
        self
    }

    pub fn with_user_data(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.user_data.insert(key.into(), value);
        self
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("session_id", &self.session_id)
            .field("cache_enabled", &self.cache_enabled)
            .field("timeout_override", &self.timeout_override)
            .field("pre_hook", &self.pre_hook.is_some())
            .field("post_hook", &self.post_hook.is_some())
            .field("error_hook", &self.error_hook.is_some())
            .field("user_data", &self.user_data)
            .finish()
    }
}
