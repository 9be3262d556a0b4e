//! # Queue Continuation ("Radio")
//!
//! Asynchronously extends the playback queue from a remote continuation
//! endpoint when remaining depth falls below a threshold. Failures are
//! logged and the controller returns to idle; there is no backoff because
//! retries are driven by natural queue depletion. Starting a new session or
//! stopping cancels any in-flight fetch.

use crate::error::Result;
use crate::TrackRef;
use core_runtime::events::{CoreEvent, EventBus, QueueEvent};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Opaque state describing how to fetch the next batch of queue items.
/// Consumed once per continuation and replaced by the next batch's token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContinuationToken {
    pub seed_track: Option<TrackRef>,
    pub playlist_id: Option<String>,
    pub position_token: Option<String>,
    pub params: Option<String>,
}

impl ContinuationToken {
    /// Token seeded from the currently playing track.
    pub fn from_seed(seed: TrackRef) -> Self {
        Self {
            seed_track: Some(seed),
            ..Default::default()
        }
    }
}

/// One fetched batch of queue items plus the token for the batch after it.
#[derive(Debug, Clone)]
pub struct ContinuationBatch {
    pub items: Vec<TrackRef>,
    pub next: Option<ContinuationToken>,
}

/// Remote continuation/mix endpoint, treated as a black-box collaborator.
#[async_trait::async_trait]
pub trait ContinuationSource: Send + Sync {
    async fn next_batch(&self, token: &ContinuationToken) -> Result<ContinuationBatch>;
}

/// Continuation session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioState {
    Idle,
    Loading,
    Ready,
}

/// How a new radio session feeds the live queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioMode {
    /// Replace the queue with the fetched batch.
    Replace,
    /// Append to the existing queue; the first fetched item duplicates the
    /// seed already playing and is dropped.
    Append,
}

struct RadioInner {
    state: RadioState,
    token: Option<ContinuationToken>,
    cancel: CancellationToken,
}

/// Watches queue depth and fetches continuation batches.
pub struct RadioController {
    source: Arc<dyn ContinuationSource>,
    events: Arc<EventBus>,
    threshold: usize,
    inner: Mutex<RadioInner>,
}

impl RadioController {
    pub fn new(
        source: Arc<dyn ContinuationSource>,
        events: Arc<EventBus>,
        threshold: usize,
    ) -> Self {
        Self {
            source,
            events,
            threshold,
            inner: Mutex::new(RadioInner {
                state: RadioState::Idle,
                token: None,
                cancel: CancellationToken::new(),
            }),
        }
    }

    /// Start a new continuation session, cancelling any in-flight fetch.
    ///
    /// Returns the items to feed into the queue per `mode`.
    pub async fn start(&self, token: ContinuationToken, mode: RadioMode) -> Result<Vec<TrackRef>> {
        let cancel = {
            let mut inner = self.inner.lock();
            inner.cancel.cancel();
            inner.cancel = CancellationToken::new();
            inner.state = RadioState::Loading;
            inner.token = None;
            inner.cancel.clone()
        };

        info!(?mode, "Starting radio session");
        let batch = tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Radio start cancelled");
                return Ok(Vec::new());
            }
            result = self.source.next_batch(&token) => match result {
                Ok(batch) => batch,
                Err(e) => {
                    warn!(error = %e, "Radio session start failed");
                    self.inner.lock().state = RadioState::Idle;
                    let _ = self.events.emit(CoreEvent::Queue(QueueEvent::ContinuationFailed {
                        message: e.to_string(),
                    }));
                    return Err(e);
                }
            },
        };

        let mut items = batch.items;
        if mode == RadioMode::Append && !items.is_empty() {
            items.remove(0);
        }

        {
            let mut inner = self.inner.lock();
            inner.state = if batch.next.is_some() {
                RadioState::Ready
            } else {
                RadioState::Idle
            };
            inner.token = batch.next;
        }

        let _ = self.events.emit(CoreEvent::Queue(QueueEvent::ContinuationAppended {
            count: items.len() as u64,
        }));
        Ok(items)
    }

    /// Fetch more items if remaining queue depth is at or below the
    /// threshold and a continuation token is available.
    ///
    /// Returns the items to append, or `None` when nothing was fetched
    /// (deep queue, already loading, exhausted token, failure, or
    /// cancellation).
    pub async fn maybe_extend(&self, remaining: usize) -> Option<Vec<TrackRef>> {
        let (token, cancel) = {
            let mut inner = self.inner.lock();
            if remaining > self.threshold || inner.state == RadioState::Loading {
                return None;
            }
            let token = inner.token.clone()?;
            inner.state = RadioState::Loading;
            (token, inner.cancel.clone())
        };

        let _ = self.events.emit(CoreEvent::Queue(QueueEvent::ContinuationStarted {
            remaining: remaining as u64,
        }));
        debug!(remaining, "Queue depth low, fetching continuation");

        let batch = tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Continuation fetch cancelled");
                self.inner.lock().state = RadioState::Idle;
                return None;
            }
            result = self.source.next_batch(&token) => match result {
                Ok(batch) => batch,
                Err(e) => {
                    // Retried naturally on the next depth check.
                    warn!(error = %e, "Continuation fetch failed");
                    self.inner.lock().state = RadioState::Idle;
                    let _ = self.events.emit(CoreEvent::Queue(QueueEvent::ContinuationFailed {
                        message: e.to_string(),
                    }));
                    return None;
                }
            },
        };

        {
            let mut inner = self.inner.lock();
            inner.state = if batch.next.is_some() {
                RadioState::Ready
            } else {
                RadioState::Idle
            };
            inner.token = batch.next;
        }

        let _ = self.events.emit(CoreEvent::Queue(QueueEvent::ContinuationAppended {
            count: batch.items.len() as u64,
        }));
        Some(batch.items)
    }

    /// Cancel any in-flight fetch without discarding the session token.
    pub fn cancel_inflight(&self) {
        let mut inner = self.inner.lock();
        inner.cancel.cancel();
        inner.cancel = CancellationToken::new();
    }

    /// End the continuation session entirely.
    pub fn stop(&self) {
        let mut inner = self.inner.lock();
        inner.cancel.cancel();
        inner.cancel = CancellationToken::new();
        inner.state = RadioState::Idle;
        inner.token = None;
        info!("Radio session stopped");
    }

    pub fn state(&self) -> RadioState {
        self.inner.lock().state
    }

    /// Surfaced for UI: `true` while a continuation fetch is in flight.
    pub fn is_loading(&self) -> bool {
        self.state() == RadioState::Loading
    }
}
