//! # Playback Library Module
//!
//! Owns the playback history database and provides the persistence surface
//! used by the streaming core.
//!
//! ## Overview
//!
//! This module manages:
//! - SQLite database schema for tracks, play events, and stream formats
//! - The [`TrackStore`](store::TrackStore) trait for data access
//! - Connection pooling tuned for a single-writer playback workload

pub mod db;
pub mod error;
pub mod models;
pub mod store;

pub use error::{LibraryError, Result};
pub use models::{PlayEvent, StreamFormat, Track, TrackRef};
pub use store::{SqliteTrackStore, TrackStore};
