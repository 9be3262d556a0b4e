//! Logging system demonstration
//!
//! This example shows how to use the logging infrastructure in different modes.
//!
//! Run with:
//! ```bash
//! # Pretty format (default in debug)
//! cargo run --example logging_demo
//!
//! # JSON format
//! cargo run --example logging_demo -- json
//!
//! # Compact format
//! cargo run --example logging_demo -- compact
//!
//! # With custom filter
//! cargo run --example logging_demo -- pretty "core_runtime=trace"
//! ```

use core_runtime::logging::{
    init_logging, redact_if_sensitive, strip_path, LogFormat, LogLevel, LoggingConfig,
};
use std::env;
use tracing::{debug, error, info, trace, warn};

fn main() {
    let args: Vec<String> = env::args().collect();

    let format = match args.get(1).map(String::as_str) {
        Some("json") => LogFormat::Json,
        Some("compact") => LogFormat::Compact,
        _ => LogFormat::Pretty,
    };

    let mut config = LoggingConfig::default()
        .with_format(format)
        .with_level(LogLevel::Trace);

    if let Some(filter) = args.get(2) {
        config = config.with_filter(filter.clone());
    }

    init_logging(config).expect("Failed to initialize logging");

    trace!("Trace-level message");
    debug!(track_id = "track-123", "Chunk size computed");
    info!(offset = 262_144, length = 131_072, "Span cached");
    warn!(remaining = 2, "Queue running low, fetching continuation");
    error!(
        track_id = "track-456",
        recoverable = false,
        "Track failed after exhausting retries"
    );

    // Redaction helpers for manually constructed entries
    let signed = redact_if_sensitive("signature", "abc123");
    info!(signature = %signed, "Resolved stream URL");

    let file = strip_path("/home/user/.cache/streaming/track-123/0.span");
    info!(file = %file, "Span file written");
}
