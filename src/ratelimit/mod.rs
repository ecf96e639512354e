//! Rate limiting algorithms and per-key state management.

mod limiter;
mod sliding_window;
mod store;
mod token_bucket;

pub use limiter::Limiter;
pub use sliding_window::SlidingWindowLimiter;
pub use store::KeyedStore;
pub use token_bucket::TokenBucketLimiter;
