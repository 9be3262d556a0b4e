//! # Stream Resolution
//!
//! Turning a track reference into a concrete fetchable stream location, plus
//! a small fixed-capacity cache of recent resolutions so the current track
//! and its lookahead neighbors skip redundant remote lookups.

use crate::TrackRef;
use bridge_traits::Result as BridgeResult;
use core_library::StreamFormat;
use std::collections::VecDeque;

/// Default resolution cache capacity: current track plus 1-2 lookahead.
pub const DEFAULT_RESOLUTION_CAPACITY: usize = 3;

/// Outcome status of a remote resolution call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveStatus {
    Ok,
    /// Content removed or restricted upstream.
    Unplayable,
    /// Upstream requires authentication.
    LoginRequired,
    /// Any other upstream-reported status.
    Other(String),
}

/// Raw result of a remote resolution call, before classification.
#[derive(Debug, Clone)]
pub struct ResolveOutcome {
    pub status: ResolveStatus,
    /// Track reference the upstream says this stream belongs to. Compared
    /// against the requested reference to detect identity mismatches.
    pub track_ref: TrackRef,
    pub stream_url: Option<String>,
    pub format: Option<StreamFormat>,
    /// Human-readable duration, when the upstream reports one.
    pub duration_text: Option<String>,
}

/// A successfully resolved, immutable stream descriptor.
///
/// A new resolution for the same track replaces the old descriptor; the
/// descriptor itself is never mutated.
#[derive(Debug, Clone)]
pub struct ResolvedStream {
    pub track_ref: TrackRef,
    pub stream_url: String,
    pub format: Option<StreamFormat>,
    pub resolved_at_ms: i64,
}

/// Remote catalog lookup, treated as an opaque async collaborator.
///
/// Transport faults are reported as [`bridge_traits::BridgeError`] and
/// classified by the pipeline; upstream-typed failures travel inside
/// [`ResolveOutcome::status`].
#[async_trait::async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self, track: &TrackRef) -> BridgeResult<ResolveOutcome>;
}

/// Fixed-capacity ring of `(track, stream URL)` pairs.
///
/// Insertion order eviction (FIFO, not LRU): once full, the oldest entry
/// goes, regardless of how recently it was looked up. Entries are
/// session-scoped signed URLs and carry no expiry.
pub struct ResolutionCache {
    entries: VecDeque<(TrackRef, String)>,
    capacity: usize,
}

impl ResolutionCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Look up the cached stream URL for a track. O(capacity).
    pub fn lookup(&self, track: &TrackRef) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|(t, _)| t == track)
            .map(|(_, url)| url.as_str())
    }

    /// Insert a resolution. A fresh resolution for an already-cached track
    /// replaces its URL in place; otherwise the oldest entry is evicted
    /// once the ring is full.
    pub fn insert(&mut self, track: TrackRef, stream_url: String) {
        if let Some(entry) = self.entries.iter_mut().find(|(t, _)| *t == track) {
            entry.1 = stream_url;
            return;
        }

        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back((track, stream_url));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ResolutionCache {
    fn default() -> Self {
        Self::new(DEFAULT_RESOLUTION_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(id: &str) -> TrackRef {
        TrackRef::new(id)
    }

    #[test]
    fn test_lookup_hit_and_miss() {
        let mut cache = ResolutionCache::default();
        cache.insert(track("a"), "https://s/a".to_string());

        assert_eq!(cache.lookup(&track("a")), Some("https://s/a"));
        assert_eq!(cache.lookup(&track("b")), None);
    }

    #[test]
    fn test_fifo_evicts_first_inserted() {
        let mut cache = ResolutionCache::new(3);
        cache.insert(track("a"), "https://s/a".to_string());
        cache.insert(track("b"), "https://s/b".to_string());
        cache.insert(track("c"), "https://s/c".to_string());

        // Touching "a" must not save it: eviction is insertion-ordered.
        assert!(cache.lookup(&track("a")).is_some());

        cache.insert(track("d"), "https://s/d".to_string());

        assert_eq!(cache.len(), 3);
        assert_eq!(cache.lookup(&track("a")), None);
        assert!(cache.lookup(&track("b")).is_some());
        assert!(cache.lookup(&track("c")).is_some());
        assert!(cache.lookup(&track("d")).is_some());
    }

    #[test]
    fn test_reinsert_replaces_in_place() {
        let mut cache = ResolutionCache::new(3);
        cache.insert(track("a"), "https://s/a1".to_string());
        cache.insert(track("b"), "https://s/b".to_string());
        cache.insert(track("a"), "https://s/a2".to_string());

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.lookup(&track("a")), Some("https://s/a2"));

        // "a" kept its original slot, so it is still the eviction candidate.
        cache.insert(track("c"), "https://s/c".to_string());
        cache.insert(track("d"), "https://s/d".to_string());
        assert_eq!(cache.lookup(&track("a")), None);
    }

    #[test]
    fn test_zero_capacity_clamped_to_one() {
        let mut cache = ResolutionCache::new(0);
        cache.insert(track("a"), "https://s/a".to_string());
        assert_eq!(cache.lookup(&track("a")), Some("https://s/a"));
    }
}
