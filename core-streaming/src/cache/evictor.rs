//! Pluggable eviction policies for the disk cache.

use super::span::SpanIndex;
use crate::TrackRef;
use tracing::debug;

/// Decides which spans to drop after a write pushes the cache over budget.
///
/// The evictor only plans; the cache performs the removals (and fires
/// listener callbacks) itself.
pub trait CacheEvictor: Send + Sync {
    /// Spans to remove, least valuable first, so that the cache returns
    /// under budget. An empty plan means nothing to do.
    fn plan_eviction(&self, index: &SpanIndex) -> Vec<(TrackRef, u64)>;
}

/// Bounded-by-total-size policy: evicts least-recently-touched spans until
/// total bytes fit under the cap.
pub struct LeastRecentlyUsedEvictor {
    max_bytes: u64,
}

impl LeastRecentlyUsedEvictor {
    pub fn new(max_bytes: u64) -> Self {
        Self { max_bytes }
    }
}

impl CacheEvictor for LeastRecentlyUsedEvictor {
    fn plan_eviction(&self, index: &SpanIndex) -> Vec<(TrackRef, u64)> {
        if index.total_bytes() <= self.max_bytes {
            return Vec::new();
        }

        let mut spans: Vec<(TrackRef, u64, u64, u64)> = index
            .spans()
            .map(|(track, offset, meta)| (track.clone(), offset, meta.length, meta.touch))
            .collect();
        spans.sort_by_key(|&(_, _, _, touch)| touch);

        let mut remaining = index.total_bytes();
        let mut plan = Vec::new();
        for (track, offset, length, _) in spans {
            if remaining <= self.max_bytes {
                break;
            }
            remaining -= length;
            plan.push((track, offset));
        }

        debug!(
            victims = plan.len(),
            bytes_over = index.total_bytes() - self.max_bytes,
            "Planned LRU eviction"
        );
        plan
    }
}

/// Unbounded policy: never evicts, the user clears the cache manually.
pub struct NoOpEvictor;

impl CacheEvictor for NoOpEvictor {
    fn plan_eviction(&self, _index: &SpanIndex) -> Vec<(TrackRef, u64)> {
        Vec::new()
    }
}
