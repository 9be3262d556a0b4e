//! Span index: which byte ranges of which tracks are on disk.
//!
//! Spans for one track never overlap; the union of a track's spans is the
//! set of bytes fetched so far. The index is persisted as `index.json` and
//! rebuilt by directory scan when missing or unparsable.

use crate::TrackRef;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Metadata for one cached span. The span's offset is its key in the index.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SpanMeta {
    /// Length of the span in bytes.
    pub length: u64,
    /// Monotonic touch sequence; higher means more recently used.
    pub touch: u64,
}

/// In-memory index of all cached spans, keyed by track then span offset.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SpanIndex {
    tracks: HashMap<TrackRef, BTreeMap<u64, SpanMeta>>,
    next_touch: u64,
    total_bytes: u64,
}

impl SpanIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total bytes across all tracks.
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// Total bytes cached for one track.
    pub fn cached_bytes(&self, track: &TrackRef) -> u64 {
        self.tracks
            .get(track)
            .map(|spans| spans.values().map(|m| m.length).sum())
            .unwrap_or(0)
    }

    /// Number of spans across all tracks.
    pub fn span_count(&self) -> usize {
        self.tracks.values().map(|spans| spans.len()).sum()
    }

    /// Iterate every span as `(track, offset, meta)`.
    pub fn spans(&self) -> impl Iterator<Item = (&TrackRef, u64, &SpanMeta)> {
        self.tracks
            .iter()
            .flat_map(|(track, spans)| spans.iter().map(move |(&o, m)| (track, o, m)))
    }

    /// Record a new span and stamp it as most recently used.
    ///
    /// Caller guarantees the range does not overlap an existing span
    /// (writes are clipped against coverage first).
    pub fn insert_span(&mut self, track: TrackRef, offset: u64, length: u64) {
        self.next_touch += 1;
        let touch = self.next_touch;
        self.tracks
            .entry(track)
            .or_default()
            .insert(offset, SpanMeta { length, touch });
        self.total_bytes += length;
    }

    /// Remove one span, returning its metadata.
    pub fn remove_span(&mut self, track: &TrackRef, offset: u64) -> Option<SpanMeta> {
        let spans = self.tracks.get_mut(track)?;
        let meta = spans.remove(&offset)?;
        if spans.is_empty() {
            self.tracks.remove(track);
        }
        self.total_bytes -= meta.length;
        Some(meta)
    }

    /// Remove every span of one track, returning `(offset, meta)` pairs.
    pub fn remove_track(&mut self, track: &TrackRef) -> Vec<(u64, SpanMeta)> {
        let Some(spans) = self.tracks.remove(track) else {
            return Vec::new();
        };
        let removed: Vec<(u64, SpanMeta)> = spans.into_iter().collect();
        self.total_bytes -= removed.iter().map(|(_, m)| m.length).sum::<u64>();
        removed
    }

    /// Stamp a span as most recently used. Returns `false` if unknown.
    pub fn touch(&mut self, track: &TrackRef, offset: u64) -> bool {
        let Some(meta) = self.tracks.get_mut(track).and_then(|s| s.get_mut(&offset)) else {
            return false;
        };
        self.next_touch += 1;
        meta.touch = self.next_touch;
        true
    }

    /// Returns `true` if `[offset, offset + length)` is fully covered.
    pub fn is_covered(&self, track: &TrackRef, offset: u64, length: u64) -> bool {
        length == 0 || self.uncovered(track, offset, length).is_empty()
    }

    /// Subranges of `[offset, offset + length)` not yet on disk, in order.
    pub fn uncovered(&self, track: &TrackRef, offset: u64, length: u64) -> Vec<(u64, u64)> {
        let end = offset.saturating_add(length);
        let mut gaps = Vec::new();
        let mut cursor = offset;

        if let Some(spans) = self.tracks.get(track) {
            for (&start, meta) in spans.range(..end) {
                let span_end = start + meta.length;
                if span_end <= cursor {
                    continue;
                }
                if start > cursor {
                    gaps.push((cursor, start - cursor));
                }
                cursor = cursor.max(span_end);
                if cursor >= end {
                    break;
                }
            }
        }

        if cursor < end {
            gaps.push((cursor, end - cursor));
        }
        gaps
    }

    /// The ordered spans covering `[offset, offset + length)`, or `None`
    /// if any byte of the range is missing.
    pub fn covering_spans(
        &self,
        track: &TrackRef,
        offset: u64,
        length: u64,
    ) -> Option<Vec<(u64, SpanMeta)>> {
        let end = offset.saturating_add(length);
        let spans = self.tracks.get(track)?;
        let mut covering = Vec::new();
        let mut cursor = offset;

        for (&start, meta) in spans.range(..end) {
            let span_end = start + meta.length;
            if span_end <= cursor {
                continue;
            }
            if start > cursor {
                return None;
            }
            covering.push((start, *meta));
            cursor = span_end;
            if cursor >= end {
                return Some(covering);
            }
        }

        if length == 0 {
            Some(covering)
        } else {
            None
        }
    }

    /// The least recently used span across all tracks, if any.
    pub fn least_recently_used(&self) -> Option<(TrackRef, u64)> {
        self.spans()
            .min_by_key(|(_, _, meta)| meta.touch)
            .map(|(track, offset, _)| (track.clone(), offset))
    }
}
