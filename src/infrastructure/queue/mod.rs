//! Work queue infrastructure
//!
//! - Rate limiters (per-item exponential backoff, governor token bucket)
//! - De-duplicating rate-limited queue implementing the `WorkQueue` port

pub mod rate_limiter;
pub mod rate_limiting_queue;

pub use rate_limiter::{
    default_controller_rate_limiter, BucketRateLimiter, ItemExponentialFailureRateLimiter,
    MaxOfRateLimiter, RateLimiter,
};
pub use rate_limiting_queue::RateLimitingQueue;
