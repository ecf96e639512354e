//! Token-bucket admission control.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, trace};

use super::store::KeyedStore;
use crate::clock::Clock;

/// Per-key bucket state. Tokens are a continuous quantity; `last_refill`
/// never moves backwards.
#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

/// Admits one action per token from a capacity-bounded pool that refills
/// continuously at a fixed rate.
///
/// A key seen for the first time starts with a full bucket. No amount of
/// idle time accumulates more than `capacity` tokens.
#[derive(Debug)]
pub struct TokenBucketLimiter<K = String>
where
    K: Eq + Hash,
{
    capacity: f64,
    refill_rate: f64,
    clock: Arc<dyn Clock>,
    buckets: KeyedStore<K, TokenBucket>,
}

impl<K> TokenBucketLimiter<K>
where
    K: Eq + Hash + fmt::Debug,
{
    /// Parameters are validated by the [`Limiter`](super::Limiter) factory
    /// before this constructor runs.
    pub(crate) fn new(capacity: f64, refill_rate: f64, clock: Arc<dyn Clock>) -> Self {
        Self {
            capacity,
            refill_rate,
            clock,
            buckets: KeyedStore::new(),
        }
    }

    /// Decide whether an action for `key` is admitted right now.
    ///
    /// The key's bucket is refilled for the elapsed time since its last
    /// refill (clamped to zero if the clock appears to have moved
    /// backwards), capped at capacity. The refill timestamp advances even
    /// when the request is denied, so idle time is never counted twice. One
    /// token is debited iff at least one is available.
    pub fn allow(&self, key: impl Into<K>) -> bool {
        let now = self.clock.now();

        self.buckets.with_entry(
            key.into(),
            || TokenBucket {
                tokens: self.capacity,
                last_refill: now,
            },
            |key, bucket| {
                self.refill(bucket, now);

                if bucket.tokens >= 1.0 {
                    bucket.tokens -= 1.0;
                    trace!(key = ?key, tokens = bucket.tokens, "Request admitted");
                    true
                } else {
                    debug!(key = ?key, tokens = bucket.tokens, "Bucket empty, request denied");
                    false
                }
            },
        )
    }

    /// Token balance `key` could draw on right now, refill included.
    ///
    /// A read-only observer: it neither debits nor creates state. An
    /// unseen key reports a full bucket, matching what its first admission
    /// check would start from.
    pub fn available_tokens<Q>(&self, key: &Q) -> f64
    where
        K: std::borrow::Borrow<Q>,
        Q: std::hash::Hash + Eq + ?Sized,
    {
        let now = self.clock.now();

        self.buckets
            .read_entry(key, |bucket| {
                let elapsed = now.saturating_duration_since(bucket.last_refill);
                (bucket.tokens + elapsed.as_secs_f64() * self.refill_rate).min(self.capacity)
            })
            .unwrap_or(self.capacity)
    }

    fn refill(&self, bucket: &mut TokenBucket, now: Instant) {
        let elapsed = now.saturating_duration_since(bucket.last_refill);
        bucket.tokens =
            (bucket.tokens + elapsed.as_secs_f64() * self.refill_rate).min(self.capacity);
        bucket.last_refill = bucket.last_refill.max(now);
    }

    /// Maximum token balance per key.
    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    /// Refill rate in tokens per second.
    pub fn refill_rate(&self) -> f64 {
        self.refill_rate
    }

    /// Number of keys with tracked state.
    pub fn tracked_keys(&self) -> usize {
        self.buckets.len()
    }

    /// Drop all per-key state.
    pub fn clear(&self) {
        self.buckets.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::time::Duration;

    fn limiter(capacity: f64, refill_rate: f64) -> (TokenBucketLimiter<String>, ManualClock) {
        let clock = ManualClock::new();
        let limiter = TokenBucketLimiter::new(capacity, refill_rate, Arc::new(clock.clone()));
        (limiter, clock)
    }

    #[test]
    fn test_first_sight_starts_with_full_bucket() {
        let (limiter, _clock) = limiter(5.0, 1.0);

        for _ in 0..5 {
            assert!(limiter.allow("u1"));
        }
        assert!(!limiter.allow("u1"));
    }

    #[test]
    fn test_refill_after_idle() {
        let (limiter, clock) = limiter(5.0, 1.0);

        for _ in 0..5 {
            assert!(limiter.allow("u1"));
        }
        assert!(!limiter.allow("u1"));

        // Two seconds refill two tokens; one is consumed, one remains.
        clock.advance(Duration::from_secs(2));
        assert!(limiter.allow("u1"));
        assert!((limiter.available_tokens("u1") - 1.0).abs() < 1e-9);
        assert!(limiter.allow("u1"));
        assert!(!limiter.allow("u1"));
    }

    #[test]
    fn test_idle_time_never_bursts_above_capacity() {
        let (limiter, clock) = limiter(5.0, 1.0);

        for _ in 0..5 {
            assert!(limiter.allow("u1"));
        }

        clock.advance(Duration::from_secs(1_000_000));
        let mut admitted = 0;
        for _ in 0..20 {
            if limiter.allow("u1") {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 5);
    }

    #[test]
    fn test_fractional_refill_accumulates() {
        let (limiter, clock) = limiter(5.0, 0.5);

        for _ in 0..5 {
            assert!(limiter.allow("u1"));
        }

        clock.advance(Duration::from_secs(1));
        assert!(!limiter.allow("u1"));

        clock.advance(Duration::from_secs(1));
        assert!(limiter.allow("u1"));
    }

    #[test]
    fn test_denial_advances_refill_timestamp_without_losing_balance() {
        let (limiter, clock) = limiter(1.0, 1.0);

        assert!(limiter.allow("u1"));

        clock.advance(Duration::from_millis(500));
        assert!(!limiter.allow("u1"));
        assert!((limiter.available_tokens("u1") - 0.5).abs() < 1e-9);

        clock.advance(Duration::from_millis(500));
        assert!(limiter.allow("u1"));
    }

    #[test]
    fn test_backwards_clock_is_clamped() {
        let start = Instant::now();
        let clock = ManualClock::starting_at(start);
        let limiter: TokenBucketLimiter<String> =
            TokenBucketLimiter::new(5.0, 1.0, Arc::new(clock.clone()));

        assert!(limiter.allow("u1"));
        clock.advance(Duration::from_secs(100));
        assert!(limiter.allow("u1"));

        // Clock moves backwards: elapsed clamps to zero and the refill
        // timestamp stays put, so catching back up earns no tokens.
        clock.set(start + Duration::from_secs(50));
        assert!(limiter.allow("u1"));
        assert!((limiter.available_tokens("u1") - 3.0).abs() < 1e-9);

        clock.set(start + Duration::from_secs(100));
        assert!((limiter.available_tokens("u1") - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_tokens_never_negative() {
        let (limiter, _clock) = limiter(2.0, 1.0);

        for _ in 0..10 {
            limiter.allow("u1");
        }
        assert!(limiter.available_tokens("u1") >= 0.0);
    }

    #[test]
    fn test_keys_are_isolated() {
        let (limiter, _clock) = limiter(1.0, 1.0);

        assert!(limiter.allow("a"));
        assert!(limiter.allow("b"));
        assert!(!limiter.allow("a"));
        assert_eq!(limiter.tracked_keys(), 2);
    }

    #[test]
    fn test_unseen_key_reports_full_bucket() {
        let (limiter, _clock) = limiter(7.5, 1.0);
        assert!((limiter.available_tokens("nobody") - 7.5).abs() < 1e-9);
    }

    #[test]
    fn test_concurrent_same_key_never_over_admits() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::thread;

        let clock = ManualClock::new();
        let limiter = Arc::new(TokenBucketLimiter::<String>::new(
            50.0,
            1.0,
            Arc::new(clock),
        ));
        let admitted = Arc::new(AtomicUsize::new(0));

        let mut handles = vec![];
        for _ in 0..8 {
            let limiter = Arc::clone(&limiter);
            let admitted = Arc::clone(&admitted);
            handles.push(thread::spawn(move || {
                for _ in 0..25 {
                    if limiter.allow("hot-key") {
                        admitted.fetch_add(1, Ordering::SeqCst);
                    }
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        // Frozen clock: no refill, so exactly the initial capacity is admitted.
        assert_eq!(admitted.load(Ordering::SeqCst), 50);
    }
}
