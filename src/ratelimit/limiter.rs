//! Core rate limiter: the shared admission contract and its factory.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::config::{LimiterConfig, LimiterKind};
use crate::error::{FloodgateError, Result};

use super::sliding_window::SlidingWindowLimiter;
use super::token_bucket::TokenBucketLimiter;

/// A per-key rate limiter.
///
/// The two algorithms form a closed set behind the single decision
/// operation [`allow`](Limiter::allow); callers that need an
/// algorithm-specific observer can match on the variant. Construction goes
/// through [`Limiter::new`] (or [`Limiter::with_clock`]), which is the one
/// place parameters are validated — the variants assume validated
/// configuration and perform no checks on the hot path.
///
/// This struct is thread-safe and is typically shared behind an `Arc`.
#[derive(Debug)]
pub enum Limiter<K = String>
where
    K: Eq + Hash,
{
    /// Sliding-window counting per key.
    SlidingWindow(SlidingWindowLimiter<K>),
    /// Continuous token refill and consumption per key.
    TokenBucket(TokenBucketLimiter<K>),
}

impl<K> Limiter<K>
where
    K: Eq + Hash + fmt::Debug,
{
    /// Build a limiter from a configuration, reading time from the system
    /// clock.
    ///
    /// Returns a configuration error for non-positive or non-finite
    /// parameters; an invalid configuration is never silently replaced
    /// with a working default.
    pub fn new(config: LimiterConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Build a limiter from a configuration with an injected clock.
    ///
    /// Tests use this with [`ManualClock`](crate::clock::ManualClock) to
    /// drive windowing and refill deterministically.
    pub fn with_clock(config: LimiterConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;

        let limiter = match config {
            LimiterConfig::SlidingWindow {
                max_requests,
                window_secs,
            } => {
                let window = Duration::try_from_secs_f64(window_secs).map_err(|e| {
                    FloodgateError::Config(format!(
                        "sliding_window: window_secs {window_secs} is not representable: {e}"
                    ))
                })?;
                Limiter::SlidingWindow(SlidingWindowLimiter::new(max_requests, window, clock))
            }
            LimiterConfig::TokenBucket {
                capacity,
                refill_rate,
            } => Limiter::TokenBucket(TokenBucketLimiter::new(capacity, refill_rate, clock)),
        };

        debug!(kind = %limiter.kind(), "Created rate limiter");
        Ok(limiter)
    }

    /// Decide whether an action for `key` is admitted right now.
    ///
    /// Never fails: a denial is a normal `false`, and a key seen for the
    /// first time is initialized lazily. If admitted, the effect (recorded
    /// timestamp or debited token) is applied atomically before returning.
    pub fn allow(&self, key: impl Into<K>) -> bool {
        match self {
            Limiter::SlidingWindow(limiter) => limiter.allow(key),
            Limiter::TokenBucket(limiter) => limiter.allow(key),
        }
    }

    /// The algorithm this limiter runs.
    pub fn kind(&self) -> LimiterKind {
        match self {
            Limiter::SlidingWindow(_) => LimiterKind::SlidingWindow,
            Limiter::TokenBucket(_) => LimiterKind::TokenBucket,
        }
    }

    /// Number of keys with tracked state.
    pub fn tracked_keys(&self) -> usize {
        match self {
            Limiter::SlidingWindow(limiter) => limiter.tracked_keys(),
            Limiter::TokenBucket(limiter) => limiter.tracked_keys(),
        }
    }

    /// Drop all per-key state.
    ///
    /// This is primarily useful for testing.
    pub fn clear(&self) {
        match self {
            Limiter::SlidingWindow(limiter) => limiter.clear(),
            Limiter::TokenBucket(limiter) => limiter.clear(),
        }
    }
}
