//! Logging initialization.
//!
//! Thin wrapper over the observability crate that points the sinks at the
//! talkbridge directory layout.

use crate::Paths;
use observability::LogConfig;

/// Initialize the logging system.
///
/// This sets up tracing with:
/// - Structured JSONL output to `<base>/logs/talkbridge.jsonl`
/// - Status lines (`[YYYY-MM-DD HH:MM:SS] message`) to `<base>/status.log`
/// - Compact stderr output
/// - Log level from RUST_LOG env var or the provided default
pub fn init_logging(level: &str, paths: &Paths) {
    observability::init_with_config(LogConfig {
        service_name: "talkbridge".into(),
        default_level: level.into(),
        log_path: Some(paths.json_log_file()),
        status_log_path: Some(paths.status_log_file()),
        also_stderr: true,
    });
}
