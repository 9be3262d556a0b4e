//! # Adaptive Streaming & Caching Engine
//!
//! Turns a track reference into playable audio bytes: fetched incrementally
//! over an unreliable network, cached on local storage, and resilient to
//! transient and permanent upstream failures.
//!
//! ## Overview
//!
//! This module handles:
//! - Span-indexed disk caching with pluggable eviction
//! - Network-quality-driven adaptive chunk sizing
//! - A small in-memory resolution cache for recent stream lookups
//! - Error classification with retry, skip, and hard-fail handling
//! - Queue continuation ("radio") from a remote mix endpoint

pub mod cache;
pub mod chunking;
pub mod config;
pub mod engine;
pub mod error;
pub mod pipeline;
pub mod quality;
pub mod radio;
pub mod resolution;
pub mod retry;

/// Stable identifier of a playable audio item, shared with the library.
pub use core_library::TrackRef;

pub use config::{CacheLimit, FailedTrackPolicy, StreamingConfig};
pub use engine::{CacheSummary, EngineBridges, StreamingEngine};
pub use error::{ErrorKind, Result, StreamingError};
pub use quality::{NetworkQualityAssessor, NetworkTier};
pub use radio::{ContinuationBatch, ContinuationSource, ContinuationToken, RadioMode, RadioState};
pub use resolution::{ResolveOutcome, ResolveStatus, ResolvedStream, Resolver};
pub use retry::{FailedTrackAction, RetryController, RetryDecision};
