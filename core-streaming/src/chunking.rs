//! # Adaptive Chunk Sizing Policy
//!
//! Computes the next byte-range fetch window from network tier, playback
//! position, device capability, and per-track historical fetch latency.
//!
//! The policy front-loads bytes at stream start to minimize perceived start
//! latency and throttles under poor conditions or historically slow fetches.
//! Sizing is pure: tier and position are explicit parameters, so the same
//! inputs always produce the same size.

use crate::quality::NetworkTier;
use crate::TrackRef;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use tracing::debug;

/// Hard lower bound on a fetch window (128 KiB).
pub const MIN_CHUNK_SIZE: u64 = 128 * 1024;

/// Hard upper bound on a fetch window (4 MiB).
pub const MAX_CHUNK_SIZE: u64 = 4 * 1024 * 1024;

/// Number of load samples retained per track.
pub const SAMPLE_HISTORY: usize = 10;

/// Minimum samples before historical latency biases sizing.
pub const MIN_SAMPLES_FOR_BIAS: usize = 3;

/// One observed fetch: how long a chunk of a given size took to load.
#[derive(Debug, Clone, Copy)]
pub struct LoadSample {
    pub load_time_ms: u64,
    pub chunk_size: u64,
}

/// Static device capability used to scale fetch windows.
#[derive(Debug, Clone, Copy)]
pub struct DeviceProfile {
    /// Heap budget available to the playback service, in MiB.
    pub heap_budget_mb: u64,
}

impl DeviceProfile {
    pub fn new(heap_budget_mb: u64) -> Self {
        Self { heap_budget_mb }
    }

    fn multiplier(&self) -> f64 {
        if self.heap_budget_mb > 512 {
            1.2
        } else if self.heap_budget_mb > 256 {
            1.0
        } else {
            0.8
        }
    }
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self {
            heap_budget_mb: 512,
        }
    }
}

/// Read-only sizing diagnostics for one track.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadingStats {
    pub avg_load_time_ms: f64,
    pub avg_chunk_size: f64,
    pub sample_count: usize,
    pub network_tier: NetworkTier,
}

/// Adaptive chunk sizing policy with bounded per-track load history.
pub struct ChunkPolicy {
    device: DeviceProfile,
    history: Mutex<HashMap<TrackRef, VecDeque<LoadSample>>>,
}

impl ChunkPolicy {
    pub fn new(device: DeviceProfile) -> Self {
        Self {
            device,
            history: Mutex::new(HashMap::new()),
        }
    }

    /// Compute the next fetch window size in bytes.
    ///
    /// Result is always within `[MIN_CHUNK_SIZE, MAX_CHUNK_SIZE]`.
    pub fn next_chunk_size(
        &self,
        track: &TrackRef,
        position_ms: u64,
        tier: NetworkTier,
    ) -> u64 {
        let base = Self::base_size(tier) as f64;
        let position = Self::position_multiplier(position_ms);
        let performance = self.performance_multiplier(track);
        let device = self.device.multiplier();

        let raw = base * position * performance * device;
        let size = (raw as u64).clamp(MIN_CHUNK_SIZE, MAX_CHUNK_SIZE);

        debug!(
            track = %track,
            position_ms,
            ?tier,
            position,
            performance,
            device,
            size,
            "Computed adaptive chunk size"
        );

        size
    }

    /// Record an observed fetch, evicting the oldest sample beyond the cap.
    pub fn record_sample(&self, track: &TrackRef, load_time_ms: u64, chunk_size: u64) {
        let mut history = self.history.lock();
        let samples = history.entry(track.clone()).or_default();
        if samples.len() >= SAMPLE_HISTORY {
            samples.pop_front();
        }
        samples.push_back(LoadSample {
            load_time_ms,
            chunk_size,
        });
    }

    /// Diagnostics snapshot for one track at the given tier.
    pub fn stats(&self, track: &TrackRef, tier: NetworkTier) -> LoadingStats {
        let history = self.history.lock();
        let samples = history.get(track);
        let count = samples.map(|s| s.len()).unwrap_or(0);

        let (avg_load, avg_size) = match samples {
            Some(samples) if !samples.is_empty() => {
                let n = samples.len() as f64;
                let load: u64 = samples.iter().map(|s| s.load_time_ms).sum();
                let size: u64 = samples.iter().map(|s| s.chunk_size).sum();
                (load as f64 / n, size as f64 / n)
            }
            _ => (0.0, 0.0),
        };

        LoadingStats {
            avg_load_time_ms: avg_load,
            avg_chunk_size: avg_size,
            sample_count: count,
            network_tier: tier,
        }
    }

    /// Drop the load history of a track.
    pub fn clear(&self, track: &TrackRef) {
        self.history.lock().remove(track);
    }

    fn base_size(tier: NetworkTier) -> u64 {
        match tier {
            NetworkTier::Excellent => 2 * 1024 * 1024,
            NetworkTier::Good => 1024 * 1024,
            NetworkTier::Fair => 512 * 1024,
            NetworkTier::Poor => 256 * 1024,
        }
    }

    fn position_multiplier(position_ms: u64) -> f64 {
        if position_ms < 30_000 {
            1.5
        } else if position_ms < 120_000 {
            1.2
        } else {
            1.0
        }
    }

    fn performance_multiplier(&self, track: &TrackRef) -> f64 {
        let history = self.history.lock();
        let samples = match history.get(track) {
            Some(samples) if samples.len() >= MIN_SAMPLES_FOR_BIAS => samples,
            _ => return 1.0,
        };

        let mean_ms =
            samples.iter().map(|s| s.load_time_ms).sum::<u64>() as f64 / samples.len() as f64;

        if mean_ms < 1_000.0 {
            1.2
        } else if mean_ms < 3_000.0 {
            1.0
        } else {
            0.8
        }
    }
}

impl Default for ChunkPolicy {
    fn default() -> Self {
        Self::new(DeviceProfile::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(id: &str) -> TrackRef {
        TrackRef::new(id)
    }

    #[test]
    fn test_chunk_size_always_within_bounds() {
        let tiers = [
            NetworkTier::Poor,
            NetworkTier::Fair,
            NetworkTier::Good,
            NetworkTier::Excellent,
        ];
        let positions = [0u64, 10_000, 29_999, 30_000, 119_999, 120_000, 3_600_000];
        let heaps = [128u64, 256, 257, 512, 513, 4096];
        let latencies = [0u64, 500, 999, 1_000, 2_999, 3_000, 60_000];

        for heap in heaps {
            for latency in latencies {
                let policy = ChunkPolicy::new(DeviceProfile::new(heap));
                let t = track("bounds");
                for _ in 0..MIN_SAMPLES_FOR_BIAS {
                    policy.record_sample(&t, latency, 512 * 1024);
                }
                for tier in tiers {
                    for position in positions {
                        let size = policy.next_chunk_size(&t, position, tier);
                        assert!(
                            (MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&size),
                            "size {size} out of bounds (heap={heap}, latency={latency}, tier={tier:?}, position={position})"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_poor_tier_late_position_low_memory() {
        // 256 KiB base, no position boost past 120s, no history, 0.8 device
        // multiplier: 262144 * 0.8 = 209715.2, truncated.
        let policy = ChunkPolicy::new(DeviceProfile::new(200));
        let size = policy.next_chunk_size(&track("abc"), 200_000, NetworkTier::Poor);
        assert_eq!(size, 209_715);
    }

    #[test]
    fn test_preroll_boost() {
        let policy = ChunkPolicy::default();
        let t = track("abc");
        let early = policy.next_chunk_size(&t, 0, NetworkTier::Good);
        let mid = policy.next_chunk_size(&t, 60_000, NetworkTier::Good);
        let late = policy.next_chunk_size(&t, 300_000, NetworkTier::Good);

        assert_eq!(early, (1024.0 * 1024.0 * 1.5) as u64);
        assert_eq!(mid, (1024.0 * 1024.0 * 1.2) as u64);
        assert_eq!(late, 1024 * 1024);
    }

    #[test]
    fn test_history_needs_three_samples() {
        let policy = ChunkPolicy::default();
        let t = track("abc");

        // Two slow samples: no bias yet.
        policy.record_sample(&t, 10_000, 512 * 1024);
        policy.record_sample(&t, 10_000, 512 * 1024);
        assert_eq!(policy.next_chunk_size(&t, 300_000, NetworkTier::Good), 1024 * 1024);

        // Third sample activates the 0.8 penalty.
        policy.record_sample(&t, 10_000, 512 * 1024);
        assert_eq!(
            policy.next_chunk_size(&t, 300_000, NetworkTier::Good),
            (1024.0 * 1024.0 * 0.8) as u64
        );
    }

    #[test]
    fn test_fast_history_boosts() {
        let policy = ChunkPolicy::default();
        let t = track("abc");
        for _ in 0..3 {
            policy.record_sample(&t, 400, 512 * 1024);
        }
        assert_eq!(
            policy.next_chunk_size(&t, 300_000, NetworkTier::Good),
            (1024.0 * 1024.0 * 1.2) as u64
        );
    }

    #[test]
    fn test_sample_history_is_bounded() {
        let policy = ChunkPolicy::default();
        let t = track("abc");
        for i in 0..25 {
            policy.record_sample(&t, i, 1024);
        }
        let stats = policy.stats(&t, NetworkTier::Fair);
        assert_eq!(stats.sample_count, SAMPLE_HISTORY);
        // Oldest samples (0..15) were dropped; mean covers 15..25.
        assert!((stats.avg_load_time_ms - 19.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_stats_for_unknown_track() {
        let policy = ChunkPolicy::default();
        let stats = policy.stats(&track("nothing"), NetworkTier::Excellent);
        assert_eq!(stats.sample_count, 0);
        assert_eq!(stats.avg_load_time_ms, 0.0);
        assert_eq!(stats.network_tier, NetworkTier::Excellent);
    }

    #[test]
    fn test_clamp_at_upper_bound() {
        // Excellent base 2 MiB with every boost: 2 MiB * 1.5 * 1.2 * 1.2 =
        // 4.32 MiB, clamped to 4 MiB.
        let policy = ChunkPolicy::new(DeviceProfile::new(1024));
        let t = track("abc");
        for _ in 0..3 {
            policy.record_sample(&t, 100, 1024 * 1024);
        }
        assert_eq!(
            policy.next_chunk_size(&t, 0, NetworkTier::Excellent),
            MAX_CHUNK_SIZE
        );
    }
}
