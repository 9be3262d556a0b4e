//! # Disk Cache
//!
//! Content-addressed byte-range store keyed by track reference, with a
//! pluggable eviction policy and ordered listener hooks.

pub mod evictor;
pub mod listener;
pub mod span;
pub mod store;

pub use evictor::{CacheEvictor, LeastRecentlyUsedEvictor, NoOpEvictor};
pub use listener::{CacheListener, CachedBytesTracker, EventBusListener};
pub use span::{SpanIndex, SpanMeta};
pub use store::DiskCache;
