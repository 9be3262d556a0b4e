//! Domain models for playback persistence
//!
//! This module contains the models shared between the streaming core and the
//! playback history database.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

// =============================================================================
// ID Types
// =============================================================================

/// Opaque identifier for a playable track.
///
/// Track refs are assigned by the host's catalog; the core treats them as
/// opaque strings and uses them to key caches, retry state, and history rows.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct TrackRef(String);

impl TrackRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for TrackRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TrackRef {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TrackRef {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// =============================================================================
// Track
// =============================================================================

/// Display metadata for a track, persisted when the track is first played.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Track {
    pub track_ref: TrackRef,
    pub title: String,
    pub artist: Option<String>,
    pub album: Option<String>,
    /// Approximate duration rendered as "m:ss", if known.
    pub duration_text: Option<String>,
    pub artwork_url: Option<String>,
}

impl Track {
    pub fn new(track_ref: impl Into<TrackRef>, title: impl Into<String>) -> Self {
        Self {
            track_ref: track_ref.into(),
            title: title.into(),
            artist: None,
            album: None,
            duration_text: None,
            artwork_url: None,
        }
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = Some(artist.into());
        self
    }

    pub fn with_album(mut self, album: impl Into<String>) -> Self {
        self.album = Some(album.into());
        self
    }

    pub fn with_duration_text(mut self, text: impl Into<String>) -> Self {
        self.duration_text = Some(text.into());
        self
    }

    pub fn with_artwork_url(mut self, url: impl Into<String>) -> Self {
        self.artwork_url = Some(url.into());
        self
    }

    /// Validate required fields before persistence.
    pub fn validate(&self) -> Result<(), String> {
        if self.track_ref.is_empty() {
            return Err("track_ref must not be empty".to_string());
        }
        if self.title.trim().is_empty() {
            return Err("title must not be empty".to_string());
        }
        Ok(())
    }
}

// =============================================================================
// Play Events
// =============================================================================

/// A single listening event, recorded once a track passes the minimum
/// play-time gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct PlayEvent {
    pub track_ref: TrackRef,
    /// Wall-clock time the event was recorded (Unix millis).
    pub timestamp_ms: i64,
    /// Accumulated play time for this listen (millis).
    pub play_time_ms: i64,
}

impl PlayEvent {
    pub fn new(track_ref: impl Into<TrackRef>, timestamp_ms: i64, play_time_ms: i64) -> Self {
        Self {
            track_ref: track_ref.into(),
            timestamp_ms,
            play_time_ms,
        }
    }
}

// =============================================================================
// Stream Formats
// =============================================================================

/// Technical metadata of a resolved stream, persisted per track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, Default)]
pub struct StreamFormat {
    pub mime_type: Option<String>,
    /// Average bitrate in bits per second.
    pub bitrate: Option<i64>,
    /// Total stream length in bytes, if the remote endpoint reported one.
    pub content_length: Option<i64>,
    /// Perceptual loudness in dB, used for volume normalization.
    pub loudness_db: Option<f64>,
    /// Remote last-modified timestamp (Unix millis).
    pub last_modified_ms: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_ref_display_and_serde() {
        let track_ref = TrackRef::new("abc123");
        assert_eq!(track_ref.to_string(), "abc123");
        assert_eq!(track_ref.as_str(), "abc123");

        let json = serde_json::to_string(&track_ref).unwrap();
        assert_eq!(json, "\"abc123\"");
    }

    #[test]
    fn test_track_builder() {
        let track = Track::new("abc123", "Title")
            .with_artist("Artist")
            .with_album("Album")
            .with_duration_text("3:45")
            .with_artwork_url("https://example.com/art.jpg");

        assert_eq!(track.track_ref.as_str(), "abc123");
        assert_eq!(track.artist.as_deref(), Some("Artist"));
        assert_eq!(track.duration_text.as_deref(), Some("3:45"));
        assert!(track.validate().is_ok());
    }

    #[test]
    fn test_track_validation() {
        let empty_ref = Track::new("", "Title");
        assert!(empty_ref.validate().is_err());

        let empty_title = Track::new("abc123", "   ");
        assert!(empty_title.validate().is_err());
    }
}
