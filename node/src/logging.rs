//! # Structured Logging
//!
//! Initializes the `tracing` subscriber with configurable format (JSON or
//! pretty-printed) and environment-based filtering via `RUST_LOG`.
//!
//! All log output is written to stderr so that stdout carries only command
//! output (payloads, receipts, journal lines) and can be piped.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cli::LogFormatArg;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, colored output.
    Pretty,
    /// Machine-parseable JSON lines.
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Pretty => LogFormat::Pretty,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

/// Initialize the global tracing subscriber.
///
/// Call this exactly once, early in `main()`.
///
/// # Arguments
///
/// * `default_level` - The filter used when `RUST_LOG` is not set, e.g.
///   `"rase_node=info,rase_protocol=warn"`.
/// * `format` - Output format (JSON or pretty-printed).
///
/// # Environment
///
/// `RUST_LOG` overrides `default_level` when set:
///
/// ```text
/// RUST_LOG=rase_protocol=debug rase-node retrieve p1
/// ```
pub fn init_logging(default_level: &str, format: LogFormat) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    match format {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(true)
                        .with_thread_ids(false)
                        .with_file(false)
                        .with_line_number(false),
                )
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr).with_target(true))
                .init();
        }
    }

    tracing::debug!("logging initialized (format={:?})", format);
}
