//! # Error Retry Controller
//!
//! Per-track retry bookkeeping with exponential backoff, a bounded session
//! Failed Set, and the policy gate consulted before re-resolving a track
//! that already failed.
//!
//! State machine per track: Clean → Retrying → Failed (terminal for the
//! session). Non-recoverable kinds and an exhausted retry budget both land
//! in Failed; recoverable kinds wait out a backoff of
//! `base_delay × (retry_count + 1)` between attempts. Network-related
//! retries while connectivity is down are suppressed without burning budget.

use crate::config::FailedTrackPolicy;
use crate::error::ErrorKind;
use crate::TrackRef;
use bridge_traits::Clock;
use lru::LruCache;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Decision for one error occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Budget and backoff allow it: re-issue the fetch now.
    Retry,
    /// Still inside the backoff window; take no action this tick.
    /// The caller re-invokes on the next playback-error callback.
    Defer {
        /// Remaining wait in milliseconds.
        wait_ms: u64,
    },
    /// Connectivity is down; the attempt was not counted.
    Suppressed,
    /// Terminal for the session: the track entered the Failed Set.
    Fail,
}

/// Action to take before resolving a track already in the Failed Set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailedTrackAction {
    /// Track is not failed; resolve normally.
    Proceed,
    /// Failure record cleared; resolve again.
    RetryAndClear,
    /// Treat as unplayable so playback skips past it.
    Skip,
    /// Surface a terminal error without attempting resolution.
    HardFail,
}

#[derive(Debug, Clone, Copy, Default)]
struct RetryRecord {
    retry_count: u32,
    last_error_at_ms: i64,
}

struct RetryInner {
    records: HashMap<TrackRef, RetryRecord>,
    failed: LruCache<TrackRef, ()>,
}

/// Per-track retry state machine, owned by the streaming engine.
pub struct RetryController {
    clock: Arc<dyn Clock>,
    max_retries: u32,
    base_delay_ms: u64,
    policy: FailedTrackPolicy,
    inner: Mutex<RetryInner>,
}

impl RetryController {
    pub fn new(
        clock: Arc<dyn Clock>,
        max_retries: u32,
        base_delay: Duration,
        failed_set_capacity: usize,
        policy: FailedTrackPolicy,
    ) -> Self {
        let capacity =
            NonZeroUsize::new(failed_set_capacity).unwrap_or(NonZeroUsize::new(64).unwrap());
        Self {
            clock,
            max_retries,
            base_delay_ms: base_delay.as_millis() as u64,
            policy,
            inner: Mutex::new(RetryInner {
                records: HashMap::new(),
                failed: LruCache::new(capacity),
            }),
        }
    }

    /// Classify one error occurrence into a decision.
    pub fn on_error(
        &self,
        track: &TrackRef,
        kind: ErrorKind,
        network_available: bool,
    ) -> RetryDecision {
        let now = self.clock.unix_timestamp_millis();
        let mut inner = self.inner.lock();

        if !kind.is_recoverable() {
            info!(track = %track, ?kind, "Non-recoverable error, failing track for session");
            inner.failed.put(track.clone(), ());
            return RetryDecision::Fail;
        }

        if inner.failed.contains(track) {
            debug!(track = %track, "Track already failed this session");
            return RetryDecision::Fail;
        }

        let record = *inner.records.entry(track.clone()).or_default();

        if record.retry_count >= self.max_retries {
            warn!(track = %track, retries = record.retry_count, "Retry budget exhausted, failing track");
            inner.failed.put(track.clone(), ());
            return RetryDecision::Fail;
        }

        if kind.is_network_related() && !network_available {
            debug!(track = %track, "Network unavailable, suppressing retry");
            return RetryDecision::Suppressed;
        }

        let backoff_ms = self.base_delay_ms * (record.retry_count as u64 + 1);
        let elapsed = now.saturating_sub(record.last_error_at_ms).max(0) as u64;
        if elapsed < backoff_ms {
            let wait_ms = backoff_ms - elapsed;
            debug!(track = %track, wait_ms, "Inside backoff window, deferring retry");
            return RetryDecision::Defer { wait_ms };
        }

        let record = inner.records.entry(track.clone()).or_default();
        record.retry_count += 1;
        record.last_error_at_ms = now;
        info!(track = %track, attempt = record.retry_count, "Retrying after recoverable error");
        RetryDecision::Retry
    }

    /// Gate consulted before remote resolution of a possibly-failed track.
    pub fn before_resolve(&self, track: &TrackRef) -> FailedTrackAction {
        let mut inner = self.inner.lock();
        if !inner.failed.contains(track) {
            return FailedTrackAction::Proceed;
        }

        match self.policy {
            FailedTrackPolicy::RetryAndClear => {
                info!(track = %track, "Clearing failure record for retry");
                inner.failed.pop(track);
                inner.records.remove(track);
                FailedTrackAction::RetryAndClear
            }
            FailedTrackPolicy::Skip => FailedTrackAction::Skip,
            FailedTrackPolicy::HardFail => FailedTrackAction::HardFail,
        }
    }

    /// Returns `true` if the track is in the session Failed Set.
    pub fn is_failed(&self, track: &TrackRef) -> bool {
        self.inner.lock().failed.contains(track)
    }

    /// Current retry count for a track (0 if clean).
    pub fn retry_count(&self, track: &TrackRef) -> u32 {
        self.inner
            .lock()
            .records
            .get(track)
            .map(|r| r.retry_count)
            .unwrap_or(0)
    }

    /// Clear retry bookkeeping for a track that transitioned away.
    /// The Failed Set entry stays sticky for the session.
    pub fn clear(&self, track: &TrackRef) {
        self.inner.lock().records.remove(track);
    }

    /// Drop retry records whose last error is older than `max_age`.
    pub fn sweep(&self, max_age: Duration) {
        let cutoff = self.clock.unix_timestamp_millis() - max_age.as_millis() as i64;
        let mut inner = self.inner.lock();
        let before = inner.records.len();
        inner.records.retain(|_, record| record.last_error_at_ms >= cutoff);
        let swept = before - inner.records.len();
        if swept > 0 {
            debug!(swept, "Swept stale retry records");
        }
    }
}
