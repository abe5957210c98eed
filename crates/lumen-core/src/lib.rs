//! Lumen Core - Embeddable batch image transcoding library.
//!
//! Lumen converts batches of raster images into a chosen output format
//! through a host-provided asynchronous encoder whose real capabilities
//! are discovered at runtime, with a deterministic fallback protocol that
//! guarantees some output for every accepted input.
//!
//! # Architecture
//!
//! ```text
//! Inputs → BatchCoordinator → ConcurrencyLimiter → EncodingPipeline
//!                                                    ├─ decode
//!                                                    ├─ render surface
//!                                                    ├─ select (CapabilityProbe)
//!                                                    ├─ encode + verify
//!                                                    └─ baseline retry
//! Artifacts live in the ArtifactStore until superseded or removed.
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use lumen_core::{BatchCoordinator, BatchInput, ImageRsEncoder, OutputFormat};
//!
//! #[tokio::main]
//! async fn main() {
//!     let encoder = Arc::new(ImageRsEncoder::default());
//!     let coordinator = BatchCoordinator::new(encoder, 4);
//!
//!     let inputs = vec![BatchInput {
//!         file_name: "photo.png".to_string(),
//!         bytes: std::fs::read("photo.png").unwrap(),
//!     }];
//!     coordinator.submit(inputs, OutputFormat::WebP, 0.85).await;
//! }
//! ```

// Module declarations
pub mod batch;
pub mod config;
pub mod encoder;
pub mod error;
pub mod formats;
pub mod pipeline;
pub mod probe;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports for convenient access
pub use batch::{
    BatchCoordinator, BatchInput, BatchOutcome, BatchStats, ExportEntry, ItemSnapshot,
    ItemStatus, ProgressHook,
};
pub use config::Config;
pub use encoder::{DecodedImage, EncodedArtifact, HostEncoder, ImageRsEncoder, Surface};
pub use error::{ConfigError, LumenError, Result, TranscodeError, TranscodeResult};
pub use formats::{
    FallbackDecision, FormatInfo, FormatSupport, OutputFormat, BASELINE_FORMAT,
    CANDIDATE_FORMATS,
};
pub use pipeline::{run_limited, EncodingPipeline, TranscodeOutcome, TranscodeRequest};
pub use probe::CapabilityProbe;
pub use store::{ArtifactHandle, ArtifactStore, StoredArtifact};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
