//! Logging initialization for the admin tools.
//!
//! All admin processes share the observability crate's JSONL stream at
//! `~/.storefront-admin/logs/dev.jsonl`.

use crate::{CoreResult, Paths};
use observability::LogConfig;

/// Service name written into every log line.
const SERVICE_NAME: &str = "storefront-admin";

/// Initialize logging for the admin tools.
///
/// - Structured JSONL output to the paths' log file
/// - Log level from RUST_LOG env var or the provided default
/// - Compact stderr output when `also_stderr` is set
pub fn init_logging(paths: &Paths, level: &str, also_stderr: bool) -> CoreResult<()> {
    observability::init_with_config(LogConfig {
        service_name: SERVICE_NAME.into(),
        default_level: parse_level(level).to_string().to_lowercase(),
        log_path: Some(paths.log_file()),
        also_stderr,
    })?;
    Ok(())
}

/// Parse a log level string into a tracing Level.
pub fn parse_level(level: &str) -> tracing::Level {
    match level.trim().to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" | "warning" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}
