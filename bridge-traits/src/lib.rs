//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host platform.
//!
//! ## Overview
//!
//! This crate defines the contract between the streaming core and
//! platform-specific implementations. Each trait represents a capability the
//! core requires but that must be implemented differently per host (desktop,
//! mobile, embedded players).
//!
//! ## Traits
//!
//! ### Networking & I/O
//! - [`HttpClient`](http::HttpClient) - Async HTTP operations including ranged downloads
//! - [`FileSystemAccess`](storage::FileSystemAccess) - File I/O backing the on-disk media cache
//!
//! ### Platform Integration
//! - [`NetworkMonitor`](network::NetworkMonitor) - Connectivity, metered and validated network detection
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//!
//! ## Fail-Fast Strategy
//!
//! The core should fail fast with descriptive errors when a required capability
//! is missing rather than degrade silently. Hosts wire concrete adapters at
//! engine construction time; a missing adapter is a configuration error, not a
//! runtime surprise.
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type for
//! consistent error handling. Platform implementations should:
//!
//! - Convert platform-specific errors to `BridgeError`
//! - Distinguish timeouts from connection failures, since the core treats
//!   them differently when deciding whether to retry
//! - Provide actionable error messages with context (file paths, URLs)
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds to support safe concurrent
//! usage across async tasks. Implementations must ensure thread safety.

pub mod error;
pub mod http;
pub mod network;
pub mod storage;
pub mod time;

pub use error::{BridgeError, Result};

// Re-export commonly used types
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
pub use network::{NetworkInfo, NetworkMonitor, NetworkStatus, NetworkType};
pub use storage::{FileMetadata, FileSystemAccess};
pub use time::{Clock, ManualClock, SystemClock};
