mod load;
mod types;

pub use load::{load_default, load_from_path, CONFIG_ENV, LOCAL_CONFIG_FILE};
pub use types::{
    AsyncConfig, CacheBackendKind, CacheConfig, CacheKeyFn, ExecutorConfig, RateLimit,
    RetryConfig, TimeoutConfig,
};
