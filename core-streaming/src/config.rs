//! # Streaming Engine Configuration

use crate::cache::{CacheEvictor, LeastRecentlyUsedEvictor, NoOpEvictor};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Disk cache size policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheLimit {
    /// No automatic eviction; the user clears the cache manually.
    Unlimited,
    /// Bounded by total bytes with least-recently-used span eviction.
    MaxBytes(u64),
}

/// What to do when resolution is requested for a track already in the
/// session Failed Set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailedTrackPolicy {
    /// Clear the failure record and try again.
    RetryAndClear,
    /// Treat the track as unplayable so playback skips past it.
    Skip,
    /// Surface a terminal error without attempting resolution.
    HardFail,
}

/// Configuration for the streaming engine.
#[derive(Debug, Clone)]
pub struct StreamingConfig {
    /// Disk cache size policy (default: 2 GiB bounded).
    pub cache_limit: CacheLimit,

    /// Cache directory name under the platform cache dir.
    pub cache_directory: String,

    /// Capacity of the in-memory resolution ring (default: 3).
    pub resolution_cache_capacity: usize,

    /// Maximum retry attempts for recoverable errors (default: 3).
    pub max_retries: u32,

    /// Base backoff delay; attempt N waits `base × N` (default: 5 s).
    pub base_retry_delay: Duration,

    /// Bound on the session Failed Set (default: 64 tracks).
    pub failed_set_capacity: usize,

    /// Resolution policy for tracks already failed this session.
    pub failed_track_policy: FailedTrackPolicy,

    /// Grace delay before the automatic skip of a failed track fires
    /// (default: 2 s), so the failure notice can be surfaced first.
    pub skip_grace: Duration,

    /// Queue depth at or below which continuation fetching starts
    /// (default: 3).
    pub continuation_threshold: usize,

    /// Heap budget used by the device multiplier of the chunk sizing
    /// policy, in MiB (default: 512).
    pub heap_budget_mb: u64,

    /// Interval for sweeping stale retry bookkeeping (default: 5 min).
    pub sweep_interval: Duration,

    /// Age after which idle retry records are swept (default: 5 min).
    pub retry_state_max_age: Duration,

    /// Minimum play time before a play event is recorded (default: 5 s).
    pub min_play_time: Duration,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            cache_limit: CacheLimit::MaxBytes(2 * 1024 * 1024 * 1024),
            cache_directory: "streaming".to_string(),
            resolution_cache_capacity: 3,
            max_retries: 3,
            base_retry_delay: Duration::from_millis(5_000),
            failed_set_capacity: 64,
            failed_track_policy: FailedTrackPolicy::Skip,
            skip_grace: Duration::from_secs(2),
            continuation_threshold: 3,
            heap_budget_mb: 512,
            sweep_interval: Duration::from_secs(300),
            retry_state_max_age: Duration::from_secs(300),
            min_play_time: Duration::from_secs(5),
        }
    }
}

impl StreamingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the disk cache size policy.
    pub fn with_cache_limit(mut self, limit: CacheLimit) -> Self {
        self.cache_limit = limit;
        self
    }

    /// Set the cache directory name.
    pub fn with_cache_directory(mut self, directory: impl Into<String>) -> Self {
        self.cache_directory = directory.into();
        self
    }

    /// Set the retry budget.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the base backoff delay.
    pub fn with_base_retry_delay(mut self, delay: Duration) -> Self {
        self.base_retry_delay = delay;
        self
    }

    /// Set the failed-track resolution policy.
    pub fn with_failed_track_policy(mut self, policy: FailedTrackPolicy) -> Self {
        self.failed_track_policy = policy;
        self
    }

    /// Set the heap budget used for device-aware chunk sizing.
    pub fn with_heap_budget_mb(mut self, heap_budget_mb: u64) -> Self {
        self.heap_budget_mb = heap_budget_mb;
        self
    }

    /// Set the queue continuation threshold.
    pub fn with_continuation_threshold(mut self, threshold: usize) -> Self {
        self.continuation_threshold = threshold;
        self
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.cache_directory.is_empty() {
            return Err("cache_directory cannot be empty".to_string());
        }

        if let CacheLimit::MaxBytes(bytes) = self.cache_limit {
            if bytes == 0 {
                return Err("cache_limit must be greater than 0 bytes".to_string());
            }
        }

        if self.resolution_cache_capacity == 0 {
            return Err("resolution_cache_capacity must be at least 1".to_string());
        }

        if self.failed_set_capacity == 0 {
            return Err("failed_set_capacity must be at least 1".to_string());
        }

        if self.base_retry_delay.is_zero() {
            return Err("base_retry_delay must be greater than zero".to_string());
        }

        Ok(())
    }

    /// Build the eviction policy implied by the cache limit.
    pub fn build_evictor(&self) -> Box<dyn CacheEvictor> {
        match self.cache_limit {
            CacheLimit::Unlimited => Box::new(NoOpEvictor),
            CacheLimit::MaxBytes(bytes) => Box::new(LeastRecentlyUsedEvictor::new(bytes)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = StreamingConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.base_retry_delay, Duration::from_millis(5_000));
        assert_eq!(config.resolution_cache_capacity, 3);
        assert_eq!(config.continuation_threshold, 3);
        assert_eq!(config.failed_track_policy, FailedTrackPolicy::Skip);
        assert_eq!(config.cache_limit, CacheLimit::MaxBytes(2 * 1024 * 1024 * 1024));
    }

    #[test]
    fn test_builder() {
        let config = StreamingConfig::new()
            .with_cache_limit(CacheLimit::Unlimited)
            .with_max_retries(5)
            .with_heap_budget_mb(256)
            .with_failed_track_policy(FailedTrackPolicy::HardFail);

        assert_eq!(config.cache_limit, CacheLimit::Unlimited);
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.heap_budget_mb, 256);
        assert_eq!(config.failed_track_policy, FailedTrackPolicy::HardFail);
    }

    #[test]
    fn test_validation_failures() {
        assert!(StreamingConfig::new()
            .with_cache_directory("")
            .validate()
            .is_err());

        assert!(StreamingConfig::new()
            .with_cache_limit(CacheLimit::MaxBytes(0))
            .validate()
            .is_err());

        assert!(StreamingConfig::new()
            .with_base_retry_delay(Duration::ZERO)
            .validate()
            .is_err());

        let mut config = StreamingConfig::new();
        config.resolution_cache_capacity = 0;
        assert!(config.validate().is_err());

        config = StreamingConfig::new();
        config.failed_set_capacity = 0;
        assert!(config.validate().is_err());
    }
}
