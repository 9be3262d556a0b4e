//! Persistent store for track metadata and playback history.
//!
//! The store records which tracks have been played and for how long, and
//! remembers the last known stream format per track so playback can make
//! informed decisions before the first byte arrives.

use crate::models::{PlayEvent, StreamFormat, Track, TrackRef};
use crate::{LibraryError, Result};
use async_trait::async_trait;
use sqlx::{Pool, Sqlite};
use tracing::{debug, instrument};

/// Store interface for track metadata and playback history.
#[async_trait]
pub trait TrackStore: Send + Sync {
    /// Insert a track, or update its metadata if it already exists.
    /// Accumulated play time is preserved on update.
    async fn insert_track(&self, track: &Track) -> Result<()>;

    /// Record a completed playback session for a track.
    ///
    /// Inserts a play event row and adds `play_time_ms` to the track's
    /// accumulated total.
    async fn record_play_event(&self, event: &PlayEvent) -> Result<()>;

    /// Update the human-readable duration text of a known track.
    async fn update_duration_text(&self, track_ref: &TrackRef, duration_text: &str) -> Result<()>;

    /// Store or replace the last known stream format for a track.
    async fn upsert_format(&self, track_ref: &TrackRef, format: &StreamFormat) -> Result<()>;

    /// Fetch the last known stream format for a track, if any.
    async fn find_format(&self, track_ref: &TrackRef) -> Result<Option<StreamFormat>>;

    /// Find a track by its reference.
    async fn find_track(&self, track_ref: &TrackRef) -> Result<Option<Track>>;

    /// Total accumulated play time for a track, in milliseconds.
    async fn total_play_time_ms(&self, track_ref: &TrackRef) -> Result<i64>;
}

/// SQLite implementation of [`TrackStore`].
pub struct SqliteTrackStore {
    pool: Pool<Sqlite>,
}

impl SqliteTrackStore {
    /// Create a new store backed by an existing pool.
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Open a store on the given database file, creating it if needed.
    pub async fn connect(config: crate::db::DatabaseConfig) -> Result<Self> {
        let pool = crate::db::create_pool(config).await?;
        Ok(Self::new(pool))
    }

    /// Create a store backed by an in-memory database. Intended for tests.
    pub async fn in_memory() -> Result<Self> {
        let pool = crate::db::create_test_pool().await?;
        Ok(Self::new(pool))
    }
}

#[async_trait]
impl TrackStore for SqliteTrackStore {
    #[instrument(skip(self, track), fields(track_ref = %track.track_ref))]
    async fn insert_track(&self, track: &Track) -> Result<()> {
        track
            .validate()
            .map_err(|message| LibraryError::InvalidInput {
                field: "track".to_string(),
                message,
            })?;

        sqlx::query(
            r#"
            INSERT INTO track (track_ref, title, artist, album, duration_text, artwork_url)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(track_ref) DO UPDATE SET
                title = excluded.title,
                artist = excluded.artist,
                album = excluded.album,
                duration_text = excluded.duration_text,
                artwork_url = excluded.artwork_url
            "#,
        )
        .bind(&track.track_ref)
        .bind(&track.title)
        .bind(&track.artist)
        .bind(&track.album)
        .bind(&track.duration_text)
        .bind(&track.artwork_url)
        .execute(&self.pool)
        .await?;

        debug!("Track upserted");
        Ok(())
    }

    #[instrument(skip(self, event), fields(track_ref = %event.track_ref))]
    async fn record_play_event(&self, event: &PlayEvent) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO play_event (track_ref, timestamp_ms, play_time_ms) VALUES (?, ?, ?)",
        )
        .bind(&event.track_ref)
        .bind(event.timestamp_ms)
        .bind(event.play_time_ms)
        .execute(&mut *tx)
        .await?;

        let result = sqlx::query(
            "UPDATE track SET total_play_time_ms = total_play_time_ms + ? WHERE track_ref = ?",
        )
        .bind(event.play_time_ms)
        .bind(&event.track_ref)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LibraryError::NotFound {
                entity_type: "track".to_string(),
                id: event.track_ref.to_string(),
            });
        }

        tx.commit().await?;

        debug!(play_time_ms = event.play_time_ms, "Play event recorded");
        Ok(())
    }

    #[instrument(skip(self), fields(track_ref = %track_ref))]
    async fn update_duration_text(&self, track_ref: &TrackRef, duration_text: &str) -> Result<()> {
        let result = sqlx::query("UPDATE track SET duration_text = ? WHERE track_ref = ?")
            .bind(duration_text)
            .bind(track_ref)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(LibraryError::NotFound {
                entity_type: "track".to_string(),
                id: track_ref.to_string(),
            });
        }

        Ok(())
    }

    #[instrument(skip(self, format), fields(track_ref = %track_ref))]
    async fn upsert_format(&self, track_ref: &TrackRef, format: &StreamFormat) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO stream_format
                (track_ref, mime_type, bitrate, content_length, loudness_db, last_modified_ms)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(track_ref) DO UPDATE SET
                mime_type = excluded.mime_type,
                bitrate = excluded.bitrate,
                content_length = excluded.content_length,
                loudness_db = excluded.loudness_db,
                last_modified_ms = excluded.last_modified_ms
            "#,
        )
        .bind(track_ref)
        .bind(&format.mime_type)
        .bind(format.bitrate)
        .bind(format.content_length)
        .bind(format.loudness_db)
        .bind(format.last_modified_ms)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_format(&self, track_ref: &TrackRef) -> Result<Option<StreamFormat>> {
        let format = sqlx::query_as::<_, StreamFormat>(
            r#"
            SELECT mime_type, bitrate, content_length, loudness_db, last_modified_ms
            FROM stream_format WHERE track_ref = ?
            "#,
        )
        .bind(track_ref)
        .fetch_optional(&self.pool)
        .await?;

        Ok(format)
    }

    async fn find_track(&self, track_ref: &TrackRef) -> Result<Option<Track>> {
        let track = sqlx::query_as::<_, Track>(
            r#"
            SELECT track_ref, title, artist, album, duration_text, artwork_url
            FROM track WHERE track_ref = ?
            "#,
        )
        .bind(track_ref)
        .fetch_optional(&self.pool)
        .await?;

        Ok(track)
    }

    async fn total_play_time_ms(&self, track_ref: &TrackRef) -> Result<i64> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT total_play_time_ms FROM track WHERE track_ref = ?")
                .bind(track_ref)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(total,)| total).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_track(id: &str) -> Track {
        Track::new(TrackRef::new(id), format!("Title {id}"))
            .with_artist("Artist")
            .with_duration_text("3:45")
    }

    #[tokio::test]
    async fn test_insert_and_find_track() {
        let store = SqliteTrackStore::in_memory().await.unwrap();
        let track = sample_track("t1");

        store.insert_track(&track).await.unwrap();

        let found = store.find_track(&track.track_ref).await.unwrap().unwrap();
        assert_eq!(found.title, "Title t1");
        assert_eq!(found.artist.as_deref(), Some("Artist"));
    }

    #[tokio::test]
    async fn test_upsert_preserves_play_time() {
        let store = SqliteTrackStore::in_memory().await.unwrap();
        let track = sample_track("t1");
        store.insert_track(&track).await.unwrap();

        store
            .record_play_event(&PlayEvent {
                track_ref: track.track_ref.clone(),
                timestamp_ms: 1_000,
                play_time_ms: 42_000,
            })
            .await
            .unwrap();

        // Re-inserting updated metadata must not reset the accumulated total.
        let updated = sample_track("t1").with_album("Album");
        store.insert_track(&updated).await.unwrap();

        let total = store.total_play_time_ms(&track.track_ref).await.unwrap();
        assert_eq!(total, 42_000);
    }

    #[tokio::test]
    async fn test_record_play_event_unknown_track() {
        let store = SqliteTrackStore::in_memory().await.unwrap();

        let result = store
            .record_play_event(&PlayEvent {
                track_ref: TrackRef::new("missing"),
                timestamp_ms: 0,
                play_time_ms: 10_000,
            })
            .await;

        assert!(matches!(result, Err(LibraryError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_invalid_track_rejected() {
        let store = SqliteTrackStore::in_memory().await.unwrap();
        let track = Track::new(TrackRef::new("t1"), "");

        let result = store.insert_track(&track).await;
        assert!(matches!(result, Err(LibraryError::InvalidInput { .. })));
    }

    #[tokio::test]
    async fn test_format_roundtrip() {
        let store = SqliteTrackStore::in_memory().await.unwrap();
        let track = sample_track("t1");
        store.insert_track(&track).await.unwrap();

        let format = StreamFormat {
            mime_type: Some("audio/webm".to_string()),
            bitrate: Some(160_000),
            content_length: Some(4_194_304),
            loudness_db: Some(-7.2),
            last_modified_ms: Some(1_700_000_000_000),
        };
        store.upsert_format(&track.track_ref, &format).await.unwrap();

        let found = store.find_format(&track.track_ref).await.unwrap().unwrap();
        assert_eq!(found.mime_type.as_deref(), Some("audio/webm"));
        assert_eq!(found.content_length, Some(4_194_304));

        assert!(store
            .find_format(&TrackRef::new("other"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_update_duration_text() {
        let store = SqliteTrackStore::in_memory().await.unwrap();
        let track = sample_track("t1");
        store.insert_track(&track).await.unwrap();

        store
            .update_duration_text(&track.track_ref, "4:02")
            .await
            .unwrap();

        let found = store.find_track(&track.track_ref).await.unwrap().unwrap();
        assert_eq!(found.duration_text.as_deref(), Some("4:02"));
    }
}
