//! # Event Bus System
//!
//! Provides an event-driven architecture for the streaming core using
//! `tokio::sync::broadcast`. This module enables decoupled communication
//! between core modules through typed events.
//!
//! ## Overview
//!
//! The event bus system consists of:
//! - **Event Types**: Strongly-typed enum hierarchies for different domains
//! - **EventBus**: Central broadcast channel for publishing events
//! - **EventStream**: Wrapper for consuming events with filtering
//! - **Subscription Management**: Multiple subscribers can listen independently
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     emit      ┌───────────┐
//! │ Fetch Module ├──────────────>│           │
//! └──────────────┘               │           │
//!                                │ EventBus  │
//! ┌──────────────┐     emit      │ (broadcast│     subscribe    ┌────────────┐
//! │ Cache Module ├──────────────>│  channel) ├─────────────────>│ Subscriber │
//! └──────────────┘               │           │                  └────────────┘
//!                                │           │
//! ┌──────────────┐     emit      │           │     subscribe    ┌────────────┐
//! │ Queue Module ├──────────────>│           ├─────────────────>│ Subscriber │
//! └──────────────┘               └───────────┘                  └────────────┘
//! ```
//!
//! ## Usage
//!
//! ### Creating an Event Bus
//!
//! ```rust
//! use core_runtime::events::EventBus;
//!
//! let event_bus = EventBus::new(100); // Buffer size of 100 events
//! ```
//!
//! ### Publishing Events
//!
//! ```rust
//! use core_runtime::events::{EventBus, CoreEvent, PlaybackEvent};
//!
//! # let event_bus = EventBus::new(100);
//! let event = CoreEvent::Playback(PlaybackEvent::Retrying {
//!     track_id: "track-123".to_string(),
//!     attempt: 1,
//! });
//!
//! event_bus.emit(event).ok();
//! ```
//!
//! ## Error Handling
//!
//! The event bus uses `tokio::sync::broadcast`, which can produce two types of
//! errors:
//!
//! - **`RecvError::Lagged(n)`**: Subscriber was too slow and missed `n` events.
//!   This is non-fatal; the subscriber can continue receiving new events.
//! - **`RecvError::Closed`**: All senders have been dropped. This indicates shutdown.
//!
//! Subscribers should handle `Lagged` gracefully and treat `Closed` as a signal
//! to exit.
//!
//! ## Thread Safety
//!
//! The event bus is fully thread-safe (`Send + Sync`). It can be safely shared
//! across async tasks using `Arc`.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

// Re-export commonly used types
pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
///
/// This value balances memory usage with the ability to handle bursts of events.
/// Subscribers that can't keep up will receive `RecvError::Lagged`.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
///
/// This is the main event type published and received through the event bus.
/// It wraps domain-specific event types for different modules.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Playback and fetch related events
    Playback(PlaybackEvent),
    /// On-disk media cache events
    Cache(CacheEvent),
    /// Queue continuation events
    Queue(QueueEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Playback(e) => e.description(),
            CoreEvent::Cache(e) => e.description(),
            CoreEvent::Queue(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Playback(PlaybackEvent::Error { .. }) => EventSeverity::Error,
            CoreEvent::Playback(PlaybackEvent::TrackFailed { .. }) => EventSeverity::Error,
            CoreEvent::Queue(QueueEvent::ContinuationFailed { .. }) => EventSeverity::Warning,
            CoreEvent::Playback(PlaybackEvent::Skipped { .. }) => EventSeverity::Info,
            CoreEvent::Queue(QueueEvent::ContinuationAppended { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    /// Debug-level events (verbose)
    Debug,
    /// Informational events
    Info,
    /// Warning events
    Warning,
    /// Error events
    Error,
}

// ============================================================================
// Playback Events
// ============================================================================

/// Events related to stream fetching and playback error handling.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    /// A fetch or resolution error occurred.
    Error {
        /// The track ID if available.
        track_id: Option<String>,
        /// Human-readable error message suitable for display.
        message: String,
        /// Whether the fetch can be retried.
        recoverable: bool,
    },
    /// A retry is being attempted for a track.
    Retrying {
        /// The track ID.
        track_id: String,
        /// Retry attempt number (1-based).
        attempt: u32,
    },
    /// A track exhausted its retry budget or failed permanently.
    TrackFailed {
        /// The failed track ID.
        track_id: String,
        /// Human-readable error message suitable for display.
        message: String,
    },
    /// An automatic skip has been scheduled after a grace period.
    SkipScheduled {
        /// The track ID that will be skipped.
        track_id: String,
        /// Grace period before the skip fires (milliseconds).
        grace_ms: u64,
    },
    /// The grace period elapsed; the host should advance to the next track.
    Skipped {
        /// The track ID that was skipped.
        track_id: String,
    },
    /// A play event passed the minimum play-time gate and was persisted.
    PlayRecorded {
        /// The track ID.
        track_id: String,
        /// Accumulated play time (milliseconds).
        play_time_ms: u64,
    },
}

impl PlaybackEvent {
    fn description(&self) -> &str {
        match self {
            PlaybackEvent::Error { .. } => "Playback error",
            PlaybackEvent::Retrying { .. } => "Retrying fetch",
            PlaybackEvent::TrackFailed { .. } => "Track failed",
            PlaybackEvent::SkipScheduled { .. } => "Automatic skip scheduled",
            PlaybackEvent::Skipped { .. } => "Track skipped",
            PlaybackEvent::PlayRecorded { .. } => "Play event recorded",
        }
    }
}

// ============================================================================
// Cache Events
// ============================================================================

/// Events related to the on-disk media cache.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum CacheEvent {
    /// A span of bytes was added to the cache.
    SpanAdded {
        /// The track ID owning the span.
        track_id: String,
        /// Byte offset of the span within the track.
        offset: u64,
        /// Span length in bytes.
        length: u64,
    },
    /// A span of bytes was removed from the cache.
    SpanRemoved {
        /// The track ID owning the span.
        track_id: String,
        /// Byte offset of the span within the track.
        offset: u64,
        /// Span length in bytes.
        length: u64,
    },
    /// A cached span was read, refreshing its recency.
    SpanTouched {
        /// The track ID owning the span.
        track_id: String,
        /// Byte offset of the span within the track.
        offset: u64,
        /// Span length in bytes.
        length: u64,
    },
    /// All cached spans for a track were removed.
    TrackRemoved {
        /// The track ID.
        track_id: String,
        /// Total bytes freed.
        bytes_freed: u64,
    },
}

impl CacheEvent {
    fn description(&self) -> &str {
        match self {
            CacheEvent::SpanAdded { .. } => "Cache span added",
            CacheEvent::SpanRemoved { .. } => "Cache span removed",
            CacheEvent::SpanTouched { .. } => "Cache span touched",
            CacheEvent::TrackRemoved { .. } => "Cached track removed",
        }
    }
}

// ============================================================================
// Queue Events
// ============================================================================

/// Events related to queue continuation (auto-extending playback queues).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum QueueEvent {
    /// A continuation fetch started because the queue ran low.
    ContinuationStarted {
        /// Number of items remaining in the queue when the fetch started.
        remaining: u64,
    },
    /// A continuation batch was appended to the queue.
    ContinuationAppended {
        /// Number of items appended.
        count: u64,
    },
    /// A continuation fetch failed; the queue is left unchanged.
    ContinuationFailed {
        /// Human-readable error message.
        message: String,
    },
}

impl QueueEvent {
    fn description(&self) -> &str {
        match self {
            QueueEvent::ContinuationStarted { .. } => "Queue continuation started",
            QueueEvent::ContinuationAppended { .. } => "Queue continuation appended",
            QueueEvent::ContinuationFailed { .. } => "Queue continuation failed",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
///
/// Uses `tokio::sync::broadcast` internally, which provides:
/// - Multiple producers (clone the `EventBus`)
/// - Multiple consumers (each `subscribe()` creates a new receiver)
/// - Non-blocking sends (events are cloned for each subscriber)
/// - Lagging detection (slow subscribers get `RecvError::Lagged`)
///
/// # Example
///
/// ```rust
/// use core_runtime::events::{EventBus, CoreEvent, CacheEvent};
///
/// # #[tokio::main]
/// # async fn main() {
/// let event_bus = EventBus::new(100);
///
/// // Subscribe to events
/// let mut subscriber = event_bus.subscribe();
///
/// // Emit an event
/// let event = CoreEvent::Cache(CacheEvent::SpanAdded {
///     track_id: "track-123".to_string(),
///     offset: 0,
///     length: 262_144,
/// });
/// event_bus.emit(event).ok();
/// # }
/// ```
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Maximum number of events to buffer per subscriber.
    ///   When a subscriber falls behind by more than this amount, it will
    ///   receive a `RecvError::Lagged` error.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Creates a new event bus with the default buffer size.
    #[allow(clippy::should_implement_trait)]
    pub fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event.
    /// Returns an error if there are no active subscribers.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber to receive events.
    ///
    /// Each call creates an independent receiver that will receive all future
    /// events. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

/// Type alias for event filter functions.
type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with additional filtering capabilities.
///
/// This provides a more ergonomic API for consuming events with optional
/// filtering by event type or severity.
///
/// # Example
///
/// ```rust
/// use core_runtime::events::{EventBus, EventStream, CoreEvent};
///
/// # #[tokio::main]
/// # async fn main() {
/// let event_bus = EventBus::new(100);
/// let stream = EventStream::new(event_bus.subscribe());
///
/// // Filter for cache events only
/// let mut cache_stream = stream.filter(|event| {
///     matches!(event, CoreEvent::Cache(_))
/// });
/// # }
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    /// Creates a new event stream from a receiver.
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Adds a filter function to this stream.
    ///
    /// Only events that match the filter will be returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Receives the next event that passes the filter (if any).
    ///
    /// This will skip events that don't match the filter and return the next
    /// matching event.
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;

            let Some(filter) = &self.filter else {
                return Ok(event);
            };

            if filter(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without blocking.
    ///
    /// Returns `None` if no events are currently available.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    let Some(filter) = &self.filter else {
                        return Some(Ok(event));
                    };

                    if filter(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
