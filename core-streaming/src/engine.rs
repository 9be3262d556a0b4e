//! # Streaming Engine Facade
//!
//! Single owner of all mutable streaming state: disk cache, resolution
//! cache, chunk policy, retry controller, and the continuation controller.
//! Constructed once at service start and passed by handle to collaborators;
//! there is no ambient global state.

use crate::cache::{CachedBytesTracker, DiskCache, EventBusListener};
use crate::chunking::{ChunkPolicy, DeviceProfile, LoadingStats};
use crate::config::StreamingConfig;
use crate::error::{ErrorKind, Result, StreamingError};
use crate::pipeline::FetchPipeline;
use crate::quality::NetworkQualityAssessor;
use crate::radio::{ContinuationSource, ContinuationToken, RadioController, RadioMode};
use crate::resolution::Resolver;
use crate::retry::{RetryController, RetryDecision};
use crate::TrackRef;
use bridge_traits::{Clock, FileSystemAccess, HttpClient, NetworkMonitor};
use bytes::Bytes;
use core_library::{PlayEvent, TrackStore};
use core_runtime::events::{CacheEvent, CoreEvent, EventBus, PlaybackEvent};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Platform bridges the engine is constructed over.
pub struct EngineBridges {
    pub http: Arc<dyn HttpClient>,
    pub network: Arc<dyn NetworkMonitor>,
    pub filesystem: Arc<dyn FileSystemAccess>,
    pub clock: Arc<dyn Clock>,
}

/// Snapshot of disk cache usage for the diagnostics surface.
#[derive(Debug, Clone)]
pub struct CacheSummary {
    pub total_bytes: u64,
    pub span_count: usize,
    pub per_track_bytes: HashMap<TrackRef, u64>,
}

struct SkipGuard {
    track: TrackRef,
    cancel: CancellationToken,
}

/// The adaptive streaming and caching engine.
pub struct StreamingEngine {
    config: StreamingConfig,
    events: Arc<EventBus>,
    pipeline: FetchPipeline,
    cache: Arc<DiskCache>,
    chunk_policy: Arc<ChunkPolicy>,
    retry: Arc<RetryController>,
    radio: RadioController,
    quality: Arc<NetworkQualityAssessor>,
    bytes_tracker: Arc<CachedBytesTracker>,
    store: Option<Arc<dyn TrackStore>>,
    clock: Arc<dyn Clock>,
    skip_guard: Mutex<Option<SkipGuard>>,
    current_track: Mutex<Option<TrackRef>>,
}

impl StreamingEngine {
    /// Construct the engine: validates configuration, opens the disk cache
    /// (running the legacy migration), and wires every component together.
    pub async fn new(
        config: StreamingConfig,
        bridges: EngineBridges,
        resolver: Arc<dyn Resolver>,
        continuation: Arc<dyn ContinuationSource>,
        store: Option<Arc<dyn TrackStore>>,
        events: Arc<EventBus>,
    ) -> Result<Self> {
        config.validate().map_err(StreamingError::Config)?;

        let cache = Arc::new(
            DiskCache::open(
                bridges.filesystem.clone(),
                &config.cache_directory,
                config.build_evictor(),
            )
            .await?,
        );

        let bytes_tracker = Arc::new(CachedBytesTracker::new());
        cache.add_listener(bytes_tracker.clone()).await;
        cache
            .add_listener(Arc::new(EventBusListener::new(events.clone())))
            .await;

        let quality = Arc::new(NetworkQualityAssessor::new(bridges.network.clone()));
        let chunk_policy = Arc::new(ChunkPolicy::new(DeviceProfile::new(config.heap_budget_mb)));
        let retry = Arc::new(RetryController::new(
            bridges.clock.clone(),
            config.max_retries,
            config.base_retry_delay,
            config.failed_set_capacity,
            config.failed_track_policy,
        ));

        let pipeline = FetchPipeline::new(
            cache.clone(),
            config.resolution_cache_capacity,
            chunk_policy.clone(),
            quality.clone(),
            retry.clone(),
            resolver,
            bridges.http.clone(),
            store.clone(),
            bridges.clock.clone(),
        );

        let radio = RadioController::new(continuation, events.clone(), config.continuation_threshold);

        info!("Streaming engine initialized");
        Ok(Self {
            config,
            events,
            pipeline,
            cache,
            chunk_policy,
            retry,
            radio,
            quality,
            bytes_tracker,
            store,
            clock: bridges.clock,
            skip_guard: Mutex::new(None),
            current_track: Mutex::new(None),
        })
    }

    /// Fetch playable bytes, retrying recoverable failures within the
    /// configured budget.
    ///
    /// Deferred and suppressed retries return the classified error so the
    /// caller re-invokes on the next playback-error callback; terminal
    /// failures schedule the auto-skip before surfacing.
    #[instrument(skip(self), fields(track = %track, offset))]
    pub async fn fetch(&self, track: &TrackRef, offset: u64, position_ms: u64) -> Result<Bytes> {
        loop {
            match self.pipeline.fetch(track, offset, position_ms).await {
                Ok(bytes) => return Ok(bytes),
                Err(e) => {
                    if let Some(terminal) = self.handle_error(track, e).await {
                        return Err(terminal);
                    }
                    // Retry allowed: re-issue immediately.
                }
            }
        }
    }

    /// Route a classified error through the retry state machine.
    ///
    /// Returns `None` when the fetch should be re-issued now, or the error
    /// to surface otherwise.
    async fn handle_error(&self, track: &TrackRef, e: StreamingError) -> Option<StreamingError> {
        if e.kind() == ErrorKind::Cancelled {
            debug!(track = %track, "Fetch abandoned by track change");
            return Some(e);
        }

        error!(track = %track, error = %e, kind = ?e.kind(), "Streaming error");

        let network_available = self.quality.is_connected().await;
        match self.retry.on_error(track, e.kind(), network_available) {
            RetryDecision::Retry => {
                let _ = self.events.emit(CoreEvent::Playback(PlaybackEvent::Retrying {
                    track_id: track.to_string(),
                    attempt: self.retry.retry_count(track),
                }));
                None
            }
            RetryDecision::Defer { wait_ms } => {
                debug!(track = %track, wait_ms, "Retry deferred by backoff");
                self.emit_playback_error(track, &e, true);
                Some(e)
            }
            RetryDecision::Suppressed => {
                info!(track = %track, "Retry suppressed while offline");
                self.emit_playback_error(track, &e, true);
                Some(e)
            }
            RetryDecision::Fail => {
                let _ = self.events.emit(CoreEvent::Playback(PlaybackEvent::TrackFailed {
                    track_id: track.to_string(),
                    message: e.user_message().to_string(),
                }));
                self.schedule_skip(track);
                Some(e)
            }
        }
    }

    fn emit_playback_error(&self, track: &TrackRef, e: &StreamingError, recoverable: bool) {
        let _ = self.events.emit(CoreEvent::Playback(PlaybackEvent::Error {
            track_id: Some(track.to_string()),
            message: e.user_message().to_string(),
            recoverable,
        }));
    }

    /// Schedule the automatic skip of a failed track after the grace delay.
    /// At most one skip is pending per failed track; manual navigation
    /// before it fires cancels it.
    fn schedule_skip(&self, track: &TrackRef) {
        let mut guard = self.skip_guard.lock();
        if let Some(existing) = guard.as_ref() {
            if existing.track == *track && !existing.cancel.is_cancelled() {
                return;
            }
            existing.cancel.cancel();
        }

        let grace = self.config.skip_grace;
        let _ = self.events.emit(CoreEvent::Playback(PlaybackEvent::SkipScheduled {
            track_id: track.to_string(),
            grace_ms: grace.as_millis() as u64,
        }));

        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let events = self.events.clone();
        let track_id = track.to_string();
        tokio::spawn(async move {
            tokio::select! {
                _ = task_cancel.cancelled() => {
                    debug!(track = %track_id, "Pending skip cancelled");
                }
                _ = tokio::time::sleep(grace) => {
                    let _ = events.emit(CoreEvent::Playback(PlaybackEvent::Skipped {
                        track_id,
                    }));
                }
            }
        });

        *guard = Some(SkipGuard {
            track: track.clone(),
            cancel,
        });
    }

    /// Playback moved to a new track (or stopped): clears the old track's
    /// retry bookkeeping, cancels the pending skip, and cancels any
    /// in-flight fetch or continuation request.
    pub fn notify_track_changed(&self, new_track: Option<&TrackRef>) {
        if let Some(guard) = self.skip_guard.lock().take() {
            guard.cancel.cancel();
        }

        let mut current = self.current_track.lock();
        if let Some(previous) = current.as_ref() {
            self.retry.clear(previous);
        }
        *current = new_track.cloned();

        self.pipeline.cancel_inflight();
        self.radio.cancel_inflight();
        debug!(track = ?new_track.map(|t| t.to_string()), "Track changed");
    }

    /// Record a completed playback session, gated so that brief previews
    /// are not counted.
    pub fn record_play(&self, track: &TrackRef, play_time: Duration) {
        if play_time < self.config.min_play_time {
            debug!(track = %track, play_time_ms = play_time.as_millis() as u64, "Play too short to record");
            return;
        }

        let play_time_ms = play_time.as_millis() as i64;
        let _ = self.events.emit(CoreEvent::Playback(PlaybackEvent::PlayRecorded {
            track_id: track.to_string(),
            play_time_ms: play_time_ms as u64,
        }));

        let Some(store) = self.store.clone() else {
            return;
        };
        let event = PlayEvent {
            track_ref: track.clone(),
            timestamp_ms: self.clock.unix_timestamp_millis(),
            play_time_ms,
        };
        tokio::spawn(async move {
            if let Err(e) = store.record_play_event(&event).await {
                warn!(track = %event.track_ref, error = %e, "Failed to record play event");
            }
        });
    }

    /// Drop every cached span of one track. Returns bytes freed.
    pub async fn clear_track_cache(&self, track: &TrackRef) -> Result<u64> {
        let freed = self.cache.remove_track(track).await?;
        if freed > 0 {
            let _ = self.events.emit(CoreEvent::Cache(CacheEvent::TrackRemoved {
                track_id: track.to_string(),
                bytes_freed: freed,
            }));
        }
        Ok(freed)
    }

    /// Disk cache usage snapshot.
    pub async fn cache_summary(&self) -> CacheSummary {
        CacheSummary {
            total_bytes: self.cache.total_bytes().await,
            span_count: self.cache.span_count().await,
            per_track_bytes: self.bytes_tracker.snapshot(),
        }
    }

    /// Bytes cached for one track, maintained by the span listener.
    pub fn cached_bytes(&self, track: &TrackRef) -> u64 {
        self.bytes_tracker.cached_bytes(track)
    }

    /// Sizing diagnostics for one track under current network conditions.
    pub async fn loading_stats(&self, track: &TrackRef) -> LoadingStats {
        let tier = self.quality.assess().await;
        self.chunk_policy.stats(track, tier)
    }

    /// Human-readable network quality label for the diagnostics surface.
    pub async fn network_quality_label(&self) -> String {
        self.quality.quality_label().await
    }

    /// Returns `true` if a track is failed for this session.
    pub fn is_track_failed(&self, track: &TrackRef) -> bool {
        self.retry.is_failed(track)
    }

    /// Start a new radio session. Replace mode feeds a whole new queue;
    /// append mode extends the current one (the seed duplicate is dropped).
    pub async fn start_radio(
        &self,
        token: ContinuationToken,
        mode: RadioMode,
    ) -> Result<Vec<TrackRef>> {
        self.radio.start(token, mode).await
    }

    /// Extend the queue if remaining depth is at or below the threshold.
    pub async fn extend_radio(&self, remaining: usize) -> Option<Vec<TrackRef>> {
        self.radio.maybe_extend(remaining).await
    }

    /// End the continuation session and cancel any in-flight fetch.
    pub fn stop_radio(&self) {
        self.radio.stop();
    }

    /// `true` while a continuation fetch is in flight.
    pub fn radio_is_loading(&self) -> bool {
        self.radio.is_loading()
    }

    /// Drop retry bookkeeping idle for longer than the configured age.
    pub fn sweep_stale_state(&self) {
        self.retry.sweep(self.config.retry_state_max_age);
    }

    /// Spawn the periodic maintenance task. Cancelling the returned token
    /// stops it.
    pub fn spawn_maintenance(self: &Arc<Self>) -> CancellationToken {
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let engine = Arc::clone(self);
        let interval = self.config.sweep_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            ticker.tick().await; // first tick is immediate
            loop {
                tokio::select! {
                    _ = task_cancel.cancelled() => break,
                    _ = ticker.tick() => engine.sweep_stale_state(),
                }
            }
        });
        cancel
    }

    /// The event bus carrying playback, cache, and queue events.
    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Direct access to the fetch pipeline (diagnostics and tests).
    pub fn pipeline(&self) -> &FetchPipeline {
        &self.pipeline
    }
}
