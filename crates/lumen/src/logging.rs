//! Logging initialization.
//!
//! Uses the `tracing` ecosystem with env-filter support; output goes to
//! stderr so stdout stays reserved for data (JSON results, TOML dumps).

use lumen_core::Config;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the logging subsystem from config plus CLI overrides.
///
/// `verbose` forces DEBUG level; `json_logs` forces JSON output. The
/// RUST_LOG environment variable overrides the configured level entirely.
pub fn init(config: &Config, verbose: bool, json_logs: bool) {
    let default_level = if verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    if json_logs || config.logging.format == "json" {
        // JSON format for machine parsing
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        // Pretty format for humans
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .with_ansi(true),
            )
            .init();
    }
}
