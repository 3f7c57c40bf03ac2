mod limiter;
mod registry;

pub use limiter::RateLimiter;
pub use registry::RateLimiterRegistry;
