//! # Observability
//!
//! Centralized logging layer for talkbridge.
//!
//! Components are **log producers**: they use standard `tracing` macros and
//! know nothing about where the events end up. The binary calls
//! [`init_with_config`] once at startup to install the sinks:
//!
//! - an optional compact stderr layer,
//! - a JSONL layer (one structured object per line),
//! - a status layer writing `[YYYY-MM-DD HH:MM:SS] message` lines.
//!
//! File sinks are append-only with per-line flush, so several processes can
//! share a file.
//!
//! ```rust,ignore
//! observability::init_with_config(observability::LogConfig {
//!     service_name: "talkbridge".into(),
//!     default_level: "debug".into(),
//!     also_stderr: true,
//!     ..Default::default()
//! });
//! tracing::info!("ready");
//! ```

mod fields;
mod json_layer;
mod status_layer;
mod writer;

use std::path::PathBuf;

pub use json_layer::{JsonLayer, LogEntry};
pub use status_layer::{format_status_line, StatusLineLayer, STATUS_TIMESTAMP_FORMAT};
pub use writer::{AppendLogWriter, WriterFactory};

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Name of the service, included in every JSONL line.
    pub service_name: String,

    /// Default log level filter (e.g., "debug", "info", "warn").
    /// Can be overridden by `RUST_LOG` environment variable.
    pub default_level: String,

    /// JSONL log file. Defaults to `~/.talkbridge/logs/talkbridge.jsonl`.
    pub log_path: Option<PathBuf>,

    /// Plain status log file. Disabled when `None`.
    pub status_log_path: Option<PathBuf>,

    /// Also emit logs to stderr for immediate feedback.
    pub also_stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".into(),
            default_level: "info".into(),
            log_path: None,
            status_log_path: None,
            also_stderr: false,
        }
    }
}

fn default_log_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| {
        home.join(".talkbridge")
            .join("logs")
            .join("talkbridge.jsonl")
    })
}

fn env_filter(default_level: &str) -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level))
}

/// Initialize logging with custom configuration.
///
/// A sink whose file cannot be opened is skipped with a note on stderr;
/// logging never prevents the process from starting. Calling this twice is
/// a no-op for the second call.
pub fn init_with_config(config: LogConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::Layer;

    let json_layer = config
        .log_path
        .clone()
        .or_else(default_log_path)
        .and_then(|path| match WriterFactory::open(&path) {
            Ok(factory) => Some(
                JsonLayer::new(config.service_name.clone(), factory)
                    .with_filter(env_filter(&config.default_level)),
            ),
            Err(e) => {
                eprintln!("failed to open log file {}: {}", path.display(), e);
                None
            }
        });

    let status_layer = config
        .status_log_path
        .as_ref()
        .and_then(|path| match WriterFactory::open(path) {
            Ok(factory) => Some(
                StatusLineLayer::new(factory).with_filter(env_filter(&config.default_level)),
            ),
            Err(e) => {
                eprintln!("failed to open status log {}: {}", path.display(), e);
                None
            }
        });

    let stderr_layer = if config.also_stderr {
        Some(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .compact()
                .with_writer(std::io::stderr)
                .with_filter(env_filter(&config.default_level)),
        )
    } else {
        None
    };

    let installed = tracing_subscriber::registry()
        .with(json_layer)
        .with(status_layer)
        .with(stderr_layer)
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!(service = %config.service_name, "observability initialized");
    }
}
