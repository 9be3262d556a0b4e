//! # Streaming Error Types
//!
//! Classified error types for the streaming engine.
//!
//! Every failure that can reach the playback surface is represented here as
//! a single tagged union, constructed once at the boundary where the
//! underlying fault is known (transport layer, resolver response, cache).
//! Downstream code inspects [`ErrorKind`] instead of re-deriving the
//! classification from nested source errors.

use bridge_traits::BridgeError;
use thiserror::Error;

/// Closed classification of streaming failures.
///
/// The kind determines retry behavior: recoverable kinds are retried with
/// backoff up to a budget, non-recoverable kinds fail the track for the
/// session and schedule a skip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Network request timed out.
    NetworkTimeout,
    /// Could not establish a connection to the stream host.
    ConnectionFailure,
    /// Resolution succeeded but no playable format was returned.
    FormatNotFound,
    /// Content is removed, restricted, or otherwise unplayable.
    Unplayable,
    /// Upstream requires authentication to serve this content.
    LoginRequired,
    /// Resolved content identity does not match the requested track.
    IdentityMismatch,
    /// Fetch was cancelled because playback moved to another track.
    Cancelled,
    /// Unclassified failure. Treated as non-recoverable (conservative).
    Unknown,
}

impl ErrorKind {
    /// Returns `true` if the failure is transient and the fetch can be retried.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ErrorKind::NetworkTimeout | ErrorKind::ConnectionFailure)
    }

    /// Returns `true` if the failure originates from network conditions.
    ///
    /// Network-related retries are suppressed entirely while connectivity is
    /// down so the retry budget is not burned on a dead link.
    pub fn is_network_related(&self) -> bool {
        matches!(self, ErrorKind::NetworkTimeout | ErrorKind::ConnectionFailure)
    }

    /// Short user-visible message for this kind, mapped 1:1.
    pub fn user_message(&self) -> &'static str {
        match self {
            ErrorKind::NetworkTimeout => "The connection timed out while fetching the stream",
            ErrorKind::ConnectionFailure => "Could not reach the streaming server",
            ErrorKind::FormatNotFound => "No playable format was found for this track",
            ErrorKind::Unplayable => "This track is unavailable",
            ErrorKind::LoginRequired => "Sign in to play this track",
            ErrorKind::IdentityMismatch => "The stream returned does not match the requested track",
            ErrorKind::Cancelled => "Playback moved on before the stream finished loading",
            ErrorKind::Unknown => "An unexpected playback error occurred",
        }
    }
}

/// Errors surfaced by the streaming engine.
///
/// Transport and resolution faults are never propagated raw; they are mapped
/// into one of these variants at the boundary.
#[derive(Error, Debug)]
pub enum StreamingError {
    /// Network request timed out.
    #[error("Network timeout: {0}")]
    NetworkTimeout(String),

    /// Connection to the stream host failed.
    #[error("Connection failed: {0}")]
    ConnectionFailure(String),

    /// Resolution returned no playable format.
    #[error("No playable format for track: {0}")]
    FormatNotFound(String),

    /// Content removed or restricted upstream.
    #[error("Track unplayable: {0}")]
    Unplayable(String),

    /// Upstream requires authentication.
    #[error("Login required to resolve track: {0}")]
    LoginRequired(String),

    /// Resolved content does not match the requested track reference.
    #[error("Identity mismatch: requested {requested}, resolved {resolved}")]
    IdentityMismatch { requested: String, resolved: String },

    /// Fetch abandoned because playback moved to another track.
    #[error("Fetch cancelled for track: {0}")]
    Cancelled(String),

    /// Disk cache operation failed in a way that cannot be treated as a miss.
    #[error("Cache error: {0}")]
    Cache(String),

    /// Invalid engine configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Unclassified failure.
    #[error("Unknown streaming error: {0}")]
    Unknown(String),
}

impl StreamingError {
    /// Classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            StreamingError::NetworkTimeout(_) => ErrorKind::NetworkTimeout,
            StreamingError::ConnectionFailure(_) => ErrorKind::ConnectionFailure,
            StreamingError::FormatNotFound(_) => ErrorKind::FormatNotFound,
            StreamingError::Unplayable(_) => ErrorKind::Unplayable,
            StreamingError::LoginRequired(_) => ErrorKind::LoginRequired,
            StreamingError::IdentityMismatch { .. } => ErrorKind::IdentityMismatch,
            StreamingError::Cancelled(_) => ErrorKind::Cancelled,
            StreamingError::Cache(_) | StreamingError::Config(_) | StreamingError::Unknown(_) => {
                ErrorKind::Unknown
            }
        }
    }

    /// Returns `true` if the error is transient and the fetch can be retried.
    pub fn is_recoverable(&self) -> bool {
        self.kind().is_recoverable()
    }

    /// Short user-visible message derived from the classification.
    pub fn user_message(&self) -> &'static str {
        self.kind().user_message()
    }

    /// Classify a transport-layer fault.
    ///
    /// This is the single point where bridge errors become streaming errors;
    /// callers must not match on [`BridgeError`] variants elsewhere.
    pub fn from_transport(err: BridgeError) -> Self {
        match err {
            BridgeError::Timeout(msg) => StreamingError::NetworkTimeout(msg),
            BridgeError::ConnectionFailed(msg) => StreamingError::ConnectionFailure(msg),
            BridgeError::Io(e) => StreamingError::ConnectionFailure(e.to_string()),
            other => StreamingError::Unknown(other.to_string()),
        }
    }
}

/// Result type for streaming operations.
pub type Result<T> = std::result::Result<T, StreamingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_kinds() {
        assert!(ErrorKind::NetworkTimeout.is_recoverable());
        assert!(ErrorKind::ConnectionFailure.is_recoverable());
        assert!(!ErrorKind::Unplayable.is_recoverable());
        assert!(!ErrorKind::LoginRequired.is_recoverable());
        assert!(!ErrorKind::IdentityMismatch.is_recoverable());
        assert!(!ErrorKind::Cancelled.is_recoverable());
        // Unknown is conservative: never retried.
        assert!(!ErrorKind::Unknown.is_recoverable());
    }

    #[test]
    fn test_network_related_matches_recoverable_set() {
        for kind in [
            ErrorKind::NetworkTimeout,
            ErrorKind::ConnectionFailure,
            ErrorKind::FormatNotFound,
            ErrorKind::Unplayable,
            ErrorKind::LoginRequired,
            ErrorKind::IdentityMismatch,
            ErrorKind::Cancelled,
            ErrorKind::Unknown,
        ] {
            assert_eq!(kind.is_network_related(), kind.is_recoverable());
        }
    }

    #[test]
    fn test_transport_classification() {
        let e = StreamingError::from_transport(BridgeError::Timeout("read".to_string()));
        assert_eq!(e.kind(), ErrorKind::NetworkTimeout);

        let e = StreamingError::from_transport(BridgeError::ConnectionFailed("refused".to_string()));
        assert_eq!(e.kind(), ErrorKind::ConnectionFailure);

        let e = StreamingError::from_transport(BridgeError::OperationFailed("500".to_string()));
        assert_eq!(e.kind(), ErrorKind::Unknown);
    }

    #[test]
    fn test_every_kind_has_a_message() {
        for kind in [
            ErrorKind::NetworkTimeout,
            ErrorKind::ConnectionFailure,
            ErrorKind::FormatNotFound,
            ErrorKind::Unplayable,
            ErrorKind::LoginRequired,
            ErrorKind::IdentityMismatch,
            ErrorKind::Cancelled,
            ErrorKind::Unknown,
        ] {
            assert!(!kind.user_message().is_empty());
        }
    }
}
