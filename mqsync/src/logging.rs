//! Structured log stream for the sync loop.
//!
//! The log stream is the operational surface of `mqsync`: every cycle,
//! discovery result, engine failure and output summary is reported here.
//! Output goes to stdout, one event per line with an RFC 3339 timestamp.

use std::io::IsTerminal;

use clap::ValueEnum;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// One JSON object per line (default; suited to log shippers).
    Json,
    /// Human-readable single-line events.
    Compact,
}

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG` env var. Defaults to `info` if unset.
///
/// # Example
/// ```bash
/// RUST_LOG=mqsync=debug mqsync --log-format compact once
/// ```
pub fn init(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(false)
                    .with_writer(std::io::stdout),
            )
            .init(),
        LogFormat::Compact => registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stdout)
                    .with_ansi(std::io::stdout().is_terminal())
                    .compact(),
            )
            .init(),
    }
}
