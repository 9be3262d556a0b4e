//! # Fetch Pipeline
//!
//! The resolving byte source: turns `(track, offset)` into playable bytes by
//! consulting the disk cache, then the resolution cache, then performing
//! remote resolution guarded by the retry controller, fetching an adaptively
//! sized byte range, and writing it through to disk.
//!
//! Every raw failure is classified into a [`StreamingError`] before it
//! leaves this module; nothing propagates raw transport errors.

use crate::cache::DiskCache;
use crate::chunking::ChunkPolicy;
use crate::error::{Result, StreamingError};
use crate::quality::NetworkQualityAssessor;
use crate::resolution::{ResolutionCache, ResolveOutcome, ResolveStatus, ResolvedStream, Resolver};
use crate::retry::{FailedTrackAction, RetryController};
use crate::TrackRef;
use bridge_traits::{Clock, HttpClient};
use bytes::Bytes;
use core_library::TrackStore;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Orchestrates cache consultation, resolution, and ranged fetching.
pub struct FetchPipeline {
    cache: Arc<DiskCache>,
    resolution: Mutex<ResolutionCache>,
    chunk_policy: Arc<ChunkPolicy>,
    quality: Arc<NetworkQualityAssessor>,
    retry: Arc<RetryController>,
    resolver: Arc<dyn Resolver>,
    http: Arc<dyn HttpClient>,
    store: Option<Arc<dyn TrackStore>>,
    clock: Arc<dyn Clock>,
    cancel: Mutex<CancellationToken>,
}

impl FetchPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        cache: Arc<DiskCache>,
        resolution_capacity: usize,
        chunk_policy: Arc<ChunkPolicy>,
        quality: Arc<NetworkQualityAssessor>,
        retry: Arc<RetryController>,
        resolver: Arc<dyn Resolver>,
        http: Arc<dyn HttpClient>,
        store: Option<Arc<dyn TrackStore>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            cache,
            resolution: Mutex::new(ResolutionCache::new(resolution_capacity)),
            chunk_policy,
            quality,
            retry,
            resolver,
            http,
            store,
            clock,
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    /// Cancel any in-flight resolution or byte-range fetch.
    ///
    /// Subsequent fetches proceed normally; only fetches already awaiting
    /// the resolver or the network observe the cancellation.
    pub fn cancel_inflight(&self) {
        let mut cancel = self.cancel.lock();
        cancel.cancel();
        *cancel = CancellationToken::new();
    }

    /// Fetch playable bytes at `offset` for the track playing at
    /// `position_ms`.
    ///
    /// Serves from disk when the adaptively sized window is already covered;
    /// otherwise resolves the stream (resolution cache first), fetches the
    /// byte range, writes it through to the disk cache, and records a load
    /// sample. The returned bytes start at the requested offset.
    #[instrument(skip(self), fields(track = %track, offset, position_ms))]
    pub async fn fetch(&self, track: &TrackRef, offset: u64, position_ms: u64) -> Result<Bytes> {
        let cancel = self.cancel.lock().clone();

        let tier = self.quality.assess().await;
        let chunk_size = self.chunk_policy.next_chunk_size(track, position_ms, tier);

        if let Some(bytes) = self.cache.read(track, offset, chunk_size).await? {
            debug!(len = bytes.len(), "Served fetch from disk cache");
            return Ok(bytes);
        }

        let stream_url = match self.cached_stream_url(track) {
            Some(url) => url,
            None => {
                let resolved = tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("Resolution cancelled by track change");
                        return Err(StreamingError::Cancelled(track.to_string()));
                    }
                    result = self.resolve(track) => result?,
                };
                resolved.stream_url
            }
        };

        let started_ms = self.clock.unix_timestamp_millis();
        let bytes = tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Range fetch cancelled by track change");
                return Err(StreamingError::Cancelled(track.to_string()));
            }
            result = self.http.download_range(&stream_url, offset, chunk_size) => {
                result.map_err(StreamingError::from_transport)?
            }
        };
        let load_time_ms = (self.clock.unix_timestamp_millis() - started_ms).max(0) as u64;

        self.cache.write_span(track, offset, bytes.clone()).await?;
        self.chunk_policy
            .record_sample(track, load_time_ms, bytes.len() as u64);

        debug!(
            len = bytes.len(),
            load_time_ms, chunk_size, "Fetched and cached byte range"
        );
        Ok(bytes)
    }

    /// Resolve a track to a stream descriptor, consulting the Failed-Set
    /// policy first and validating content identity.
    pub async fn resolve(&self, track: &TrackRef) -> Result<ResolvedStream> {
        match self.retry.before_resolve(track) {
            FailedTrackAction::Proceed => {}
            FailedTrackAction::RetryAndClear => {
                info!(track = %track, "Re-resolving previously failed track");
            }
            FailedTrackAction::Skip => {
                return Err(StreamingError::Unplayable(format!(
                    "{track} failed earlier this session"
                )));
            }
            FailedTrackAction::HardFail => {
                return Err(StreamingError::Unknown(format!(
                    "{track} is failed for this session"
                )));
            }
        }

        let outcome = self
            .resolver
            .resolve(track)
            .await
            .map_err(StreamingError::from_transport)?;

        let resolved = self.validate_outcome(track, outcome)?;

        self.resolution
            .lock()
            .insert(track.clone(), resolved.stream_url.clone());

        Ok(resolved)
    }

    fn validate_outcome(&self, track: &TrackRef, outcome: ResolveOutcome) -> Result<ResolvedStream> {
        match outcome.status {
            ResolveStatus::Ok => {}
            ResolveStatus::Unplayable => {
                return Err(StreamingError::Unplayable(track.to_string()));
            }
            ResolveStatus::LoginRequired => {
                return Err(StreamingError::LoginRequired(track.to_string()));
            }
            ResolveStatus::Other(status) => {
                return Err(StreamingError::Unknown(format!(
                    "resolution of {track} returned status {status}"
                )));
            }
        }

        if outcome.track_ref != *track {
            return Err(StreamingError::IdentityMismatch {
                requested: track.to_string(),
                resolved: outcome.track_ref.to_string(),
            });
        }

        let stream_url = outcome
            .stream_url
            .ok_or_else(|| StreamingError::FormatNotFound(track.to_string()))?;

        self.persist_resolution(track, outcome.format.clone(), outcome.duration_text.clone());

        Ok(ResolvedStream {
            track_ref: track.clone(),
            stream_url,
            format: outcome.format,
            resolved_at_ms: self.clock.unix_timestamp_millis(),
        })
    }

    /// Fire-and-forget persistence of the resolved format and duration text.
    /// Only tracks already known to the library are updated; failures are
    /// logged and never surface to playback.
    fn persist_resolution(
        &self,
        track: &TrackRef,
        format: Option<core_library::StreamFormat>,
        duration_text: Option<String>,
    ) {
        let Some(store) = self.store.clone() else {
            return;
        };
        if format.is_none() && duration_text.is_none() {
            return;
        }
        let track = track.clone();

        tokio::spawn(async move {
            match store.find_track(&track).await {
                Ok(Some(_)) => {}
                Ok(None) => {
                    debug!(track = %track, "Track not in library, skipping format persist");
                    return;
                }
                Err(e) => {
                    warn!(track = %track, error = %e, "Library lookup failed during format persist");
                    return;
                }
            }

            if let Some(format) = format {
                if let Err(e) = store.upsert_format(&track, &format).await {
                    warn!(track = %track, error = %e, "Failed to persist stream format");
                }
            }
            if let Some(text) = duration_text {
                if let Err(e) = store.update_duration_text(&track, &text).await {
                    warn!(track = %track, error = %e, "Failed to persist duration text");
                }
            }
        });
    }

    fn cached_stream_url(&self, track: &TrackRef) -> Option<String> {
        self.resolution
            .lock()
            .lookup(track)
            .map(|url| url.to_string())
    }

    /// Access to the disk cache shared with the engine facade.
    pub fn cache(&self) -> &Arc<DiskCache> {
        &self.cache
    }
}
