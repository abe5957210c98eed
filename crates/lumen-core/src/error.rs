//! Error types for the Lumen transcoding pipeline.
//!
//! Errors are organized by stage so a failed item carries a clear,
//! actionable cause (which stage, which format, what the encoder said).

use thiserror::Error;

use crate::formats::OutputFormat;

/// Top-level error type for Lumen operations.
#[derive(Error, Debug)]
pub enum LumenError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Per-item transcoding errors, organized by pipeline stage.
///
/// These never escape a batch operation: the pipeline converts each one
/// into the item's terminal failed state with a readable message.
#[derive(Error, Debug)]
pub enum TranscodeError {
    /// Source bytes are not a recognizable image
    #[error("Decode error: {message}")]
    Decode { message: String },

    /// A render surface could not be built for the decoded image
    #[error("Surface error: {message}")]
    Surface { message: String },

    /// The host encoder rejected or errored on a request
    #[error("Encode error ({format}): {message}")]
    Encode {
        format: OutputFormat,
        message: String,
    },

    /// The encoder silently produced a different media type than requested
    #[error("Verification failed for {format}: encoder declared {declared}, expected {expected}")]
    Verification {
        format: OutputFormat,
        declared: String,
        expected: &'static str,
    },

    /// The baseline-format attempt also failed; no further fallback exists
    #[error("All formats exhausted, baseline {baseline} failed: {message}")]
    FallbackExhausted {
        baseline: OutputFormat,
        message: String,
    },

    /// Operation timed out
    #[error("Timeout in {stage} stage after {timeout_ms}ms")]
    Timeout { stage: &'static str, timeout_ms: u64 },
}

/// Convenience type alias for Lumen results.
pub type Result<T> = std::result::Result<T, LumenError>;

/// Convenience type alias for per-item transcoding results.
pub type TranscodeResult<T> = std::result::Result<T, TranscodeError>;
