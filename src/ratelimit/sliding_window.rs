//! Sliding-window admission control.

use std::collections::VecDeque;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use super::store::KeyedStore;
use crate::clock::Clock;

/// Bounds the number of admissions per key within a trailing time window.
///
/// Each key owns a chronological queue of admission timestamps; expired
/// entries are trimmed from the head before every decision, so each
/// timestamp is visited at most once after it is recorded and the cost per
/// call is amortized O(1).
#[derive(Debug)]
pub struct SlidingWindowLimiter<K = String>
where
    K: Eq + Hash,
{
    max_requests: usize,
    window: Duration,
    clock: Arc<dyn Clock>,
    windows: KeyedStore<K, VecDeque<Instant>>,
}

impl<K> SlidingWindowLimiter<K>
where
    K: Eq + Hash + fmt::Debug,
{
    /// Parameters are validated by the [`Limiter`](super::Limiter) factory
    /// before this constructor runs.
    pub(crate) fn new(max_requests: usize, window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            max_requests,
            window,
            clock,
            windows: KeyedStore::new(),
        }
    }

    /// Decide whether an action for `key` is admitted right now.
    ///
    /// Expired timestamps are discarded from the head of the key's queue; a
    /// timestamp exactly equal to `now - window` counts as expired (strictly
    /// newer is required to survive). If fewer than `max_requests` survive,
    /// the current instant is recorded and the action is admitted; otherwise
    /// the state is left unchanged and the action is denied.
    pub fn allow(&self, key: impl Into<K>) -> bool {
        let now = self.clock.now();
        let cutoff = now.checked_sub(self.window);

        self.windows.with_entry(
            key.into(),
            || VecDeque::with_capacity(self.max_requests),
            |key, timestamps| {
                trim_expired(timestamps, cutoff);

                if timestamps.len() < self.max_requests {
                    timestamps.push_back(now);
                    trace!(key = ?key, in_window = timestamps.len(), "Request admitted");
                    true
                } else {
                    debug!(key = ?key, in_window = timestamps.len(), "Window full, request denied");
                    false
                }
            },
        )
    }

    /// Number of unexpired admissions currently recorded for `key`.
    ///
    /// A read-only observer: it neither trims the queue nor creates state
    /// for an unseen key.
    pub fn current_count<Q>(&self, key: &Q) -> usize
    where
        K: std::borrow::Borrow<Q>,
        Q: std::hash::Hash + Eq + ?Sized,
    {
        let cutoff = self.clock.now().checked_sub(self.window);

        self.windows
            .read_entry(key, |timestamps| {
                timestamps
                    .iter()
                    .filter(|&&t| cutoff.map_or(true, |c| t > c))
                    .count()
            })
            .unwrap_or(0)
    }

    /// Maximum admissions per window.
    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    /// Window width.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Number of keys with tracked state.
    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }

    /// Drop all per-key state.
    pub fn clear(&self) {
        self.windows.clear();
    }
}

/// Pop every timestamp at or before the cutoff. The queue is chronological,
/// so trimming stops at the first survivor.
fn trim_expired(timestamps: &mut VecDeque<Instant>, cutoff: Option<Instant>) {
    let Some(cutoff) = cutoff else {
        return;
    };
    while timestamps.front().is_some_and(|&t| t <= cutoff) {
        timestamps.pop_front();
    }
}
