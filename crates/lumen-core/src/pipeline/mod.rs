//! The per-item encoding pipeline.
//!
//! Stages: decode, render, select format, encode, verify, with a single
//! baseline retry when the selected format fails. The fallback policy is
//! an ordered attempt list (`[selected, baseline]`), not nested catches,
//! and every failure becomes a terminal outcome value: nothing raised here
//! ever reaches the limiter or the coordinator.

mod limiter;

pub use limiter::run_limited;

use std::sync::Arc;
use std::time::Instant;

use crate::encoder::{EncodedArtifact, HostEncoder, Surface};
use crate::error::{TranscodeError, TranscodeResult};
use crate::formats::{FallbackDecision, OutputFormat, BASELINE_FORMAT};
use crate::probe::CapabilityProbe;

/// Everything the pipeline needs to process one item.
///
/// A request is a copy of the inputs, never a view into coordinator state:
/// the pipeline holds no references to the work-item collection.
#[derive(Clone)]
pub struct TranscodeRequest {
    /// Original input bytes
    pub bytes: Arc<Vec<u8>>,
    /// Original file name, used to derive the output name
    pub file_name: String,
    /// Requested output format
    pub format: OutputFormat,
    /// Quality for lossy formats, 0.0-1.0
    pub quality: f32,
}

/// Terminal result of one pipeline invocation.
#[derive(Debug)]
pub enum TranscodeOutcome {
    Succeeded {
        artifact: EncodedArtifact,
        /// The format actually produced (may differ from the request)
        actual: OutputFormat,
        /// Input name with its extension swapped for the actual format's
        output_name: String,
        /// Present exactly when `actual` differs from the request
        fallback: Option<FallbackDecision>,
    },
    Failed {
        reason: String,
    },
}

impl TranscodeOutcome {
    fn failed(error: TranscodeError) -> Self {
        Self::Failed {
            reason: error.to_string(),
        }
    }

    pub fn is_succeeded(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }
}

/// Converts one decoded image into an output artifact, applying the
/// fallback and verification protocol.
pub struct EncodingPipeline {
    encoder: Arc<dyn HostEncoder>,
    probe: Arc<CapabilityProbe>,
}

impl EncodingPipeline {
    pub fn new(encoder: Arc<dyn HostEncoder>, probe: Arc<CapabilityProbe>) -> Self {
        Self { encoder, probe }
    }

    /// Process one item to a terminal outcome. Never fails as a call:
    /// every error is folded into [`TranscodeOutcome::Failed`].
    pub async fn transcode(&self, request: &TranscodeRequest) -> TranscodeOutcome {
        let start = Instant::now();
        tracing::debug!(
            name = %request.file_name,
            format = %request.format,
            "transcoding"
        );

        // Decoding
        let decoded = match self.encoder.decode(&request.bytes).await {
            Ok(decoded) => decoded,
            Err(e) => return TranscodeOutcome::failed(e),
        };
        tracing::trace!(name = %request.file_name, "decoded {}x{}", decoded.width, decoded.height);

        // Rendering
        let surface = match Surface::render(&decoded) {
            Ok(surface) => surface,
            Err(e) => return TranscodeOutcome::failed(e),
        };

        // SelectingFormat: resolve against the capability snapshot before
        // any encode, so a known-unsupported target never wastes an attempt.
        let support = self.probe.detect_support().await;
        let selected = support.best_fallback(request.format);
        let mut fallback = (selected != request.format)
            .then(|| FallbackDecision::unsupported(request.format, selected));
        if let Some(decision) = &fallback {
            tracing::debug!(name = %request.file_name, reason = %decision.reason, "format substituted");
        }

        // Encoding + Verifying over the ordered attempt list.
        let mut attempts = vec![selected];
        if selected != BASELINE_FORMAT {
            attempts.push(BASELINE_FORMAT);
        }

        let mut last_error = None;
        for (attempt_index, format) in attempts.iter().copied().enumerate() {
            if attempt_index > 0 {
                // The prior attempt failed; this retry overwrites any
                // selection-time decision.
                let prior = attempts[attempt_index - 1];
                let decision = FallbackDecision::failed(request.format, prior, format);
                tracing::debug!(name = %request.file_name, reason = %decision.reason, "baseline retry");
                fallback = Some(decision);
            }

            match self.encode_verified(&surface, format, request.quality).await {
                Ok(artifact) => {
                    let output_name = derive_output_name(&request.file_name, format);
                    tracing::debug!(
                        name = %request.file_name,
                        output = %output_name,
                        bytes = artifact.len(),
                        elapsed = ?start.elapsed(),
                        "transcode succeeded"
                    );
                    return TranscodeOutcome::Succeeded {
                        artifact,
                        actual: format,
                        output_name,
                        fallback,
                    };
                }
                Err(e) => {
                    tracing::debug!(name = %request.file_name, %format, error = %e, "attempt failed");
                    last_error = Some(e);
                }
            }
        }

        // The baseline attempt itself failed; no further fallback exists.
        let message = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no encode attempt was made".to_string());
        TranscodeOutcome::failed(TranscodeError::FallbackExhausted {
            baseline: BASELINE_FORMAT,
            message,
        })
    }

    /// One encode attempt plus verification of the declared media type.
    /// A non-error result of the wrong type is a failure, not a success.
    async fn encode_verified(
        &self,
        surface: &Surface,
        format: OutputFormat,
        quality: f32,
    ) -> TranscodeResult<EncodedArtifact> {
        let artifact = self.encoder.encode(surface, format, quality).await?;
        if artifact.media_type != format.media_type() {
            return Err(TranscodeError::Verification {
                format,
                declared: artifact.media_type,
                expected: format.media_type(),
            });
        }
        Ok(artifact)
    }
}

/// Swap the input name's trailing extension for the actual format's.
pub fn derive_output_name(input_name: &str, format: OutputFormat) -> String {
    let stem = match input_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => input_name,
    };
    format!("{stem}.{}", format.extension())
}
