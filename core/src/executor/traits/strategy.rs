use rand::Rng;

/// Randomness source for retry backoff jitter.
pub trait JitterSource: Send + Sync {
    /// A fraction in `[min, max]` added on top of a backoff delay.
    fn fraction(&self, min: f64, max: f64) -> f64;
}

/// Uniform jitter from the thread-local RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomJitter;

impl JitterSource for RandomJitter {
    fn fraction(&self, min: f64, max: f64) -> f64 {
        if max <= min {
            return min;
        }
        rand::thread_rng().gen_range(min..=max)
    }
}

/// Always returns the same fraction, clamped into the requested range.
#[derive(Debug, Clone, Copy)]
pub struct FixedJitter(pub f64);

impl JitterSource for FixedJitter {
    fn fraction(&self, min: f64, max: f64) -> f64 {
        self.0.clamp(min, max.max(min))
    }
}
