//! Cache observer interface.
//!
//! Listeners fire synchronously under the cache lock, in a documented order:
//! for any single write, `span_added` callbacks run before any
//! eviction-driven `span_removed` from the same write. Listeners must not
//! call back into the cache.

use crate::TrackRef;
use core_runtime::events::{CacheEvent, CoreEvent, EventBus};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Hooks fired on cache mutations.
pub trait CacheListener: Send + Sync {
    fn span_added(&self, track: &TrackRef, offset: u64, length: u64);
    fn span_removed(&self, track: &TrackRef, offset: u64, length: u64);
    fn span_touched(&self, track: &TrackRef, offset: u64, length: u64);
}

/// Maintains per-track cached byte totals from listener callbacks.
#[derive(Default)]
pub struct CachedBytesTracker {
    totals: Mutex<HashMap<TrackRef, u64>>,
}

impl CachedBytesTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes currently tracked for one track.
    pub fn cached_bytes(&self, track: &TrackRef) -> u64 {
        self.totals.lock().get(track).copied().unwrap_or(0)
    }

    /// Snapshot of all per-track totals.
    pub fn snapshot(&self) -> HashMap<TrackRef, u64> {
        self.totals.lock().clone()
    }
}

impl CacheListener for CachedBytesTracker {
    fn span_added(&self, track: &TrackRef, _offset: u64, length: u64) {
        *self.totals.lock().entry(track.clone()).or_insert(0) += length;
    }

    fn span_removed(&self, track: &TrackRef, _offset: u64, length: u64) {
        let mut totals = self.totals.lock();
        if let Some(total) = totals.get_mut(track) {
            *total = total.saturating_sub(length);
            if *total == 0 {
                totals.remove(track);
            }
        }
    }

    fn span_touched(&self, _track: &TrackRef, _offset: u64, _length: u64) {}
}

/// Forwards cache mutations onto the event bus as [`CacheEvent`]s.
pub struct EventBusListener {
    bus: Arc<EventBus>,
}

impl EventBusListener {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self { bus }
    }
}

impl CacheListener for EventBusListener {
    fn span_added(&self, track: &TrackRef, offset: u64, length: u64) {
        // No-subscriber send errors are expected and ignored.
        let _ = self.bus.emit(CoreEvent::Cache(CacheEvent::SpanAdded {
            track_id: track.to_string(),
            offset,
            length,
        }));
    }

    fn span_removed(&self, track: &TrackRef, offset: u64, length: u64) {
        let _ = self.bus.emit(CoreEvent::Cache(CacheEvent::SpanRemoved {
            track_id: track.to_string(),
            offset,
            length,
        }));
    }

    fn span_touched(&self, track: &TrackRef, offset: u64, length: u64) {
        let _ = self.bus.emit(CoreEvent::Cache(CacheEvent::SpanTouched {
            track_id: track.to_string(),
            offset,
            length,
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(id: &str) -> TrackRef {
        TrackRef::new(id)
    }

    #[test]
    fn test_tracker_accumulates_and_releases() {
        let tracker = CachedBytesTracker::new();

        tracker.span_added(&track("a"), 0, 100);
        tracker.span_added(&track("a"), 100, 50);
        tracker.span_added(&track("b"), 0, 10);

        assert_eq!(tracker.cached_bytes(&track("a")), 150);
        assert_eq!(tracker.cached_bytes(&track("b")), 10);

        tracker.span_removed(&track("a"), 0, 100);
        assert_eq!(tracker.cached_bytes(&track("a")), 50);

        tracker.span_removed(&track("a"), 100, 50);
        assert_eq!(tracker.cached_bytes(&track("a")), 0);
        assert!(!tracker.snapshot().contains_key(&track("a")));
    }

    #[test]
    fn test_tracker_ignores_unknown_removal() {
        let tracker = CachedBytesTracker::new();
        tracker.span_removed(&track("a"), 0, 100);
        assert_eq!(tracker.cached_bytes(&track("a")), 0);
    }

    #[tokio::test]
    async fn test_event_bus_listener_forwards() {
        let bus = Arc::new(EventBus::new(8));
        let mut sub = bus.subscribe();
        let listener = EventBusListener::new(bus.clone());

        listener.span_added(&track("a"), 0, 4096);

        let event = sub.recv().await.unwrap();
        assert_eq!(
            event,
            CoreEvent::Cache(CacheEvent::SpanAdded {
                track_id: "a".to_string(),
                offset: 0,
                length: 4096,
            })
        );
    }
}
