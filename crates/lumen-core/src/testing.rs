//! Test doubles shared across unit tests.

use async_trait::async_trait;
use image::DynamicImage;
use std::collections::HashMap;
use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::encoder::{DecodedImage, EncodedArtifact, HostEncoder, Surface};
use crate::error::{TranscodeError, TranscodeResult};
use crate::formats::OutputFormat;

/// Configurable in-memory encoder.
///
/// Behaviors compose per format: `failing` makes encode error, `declaring`
/// makes it succeed but lie about the produced media type (the silent
/// substitution verification exists to catch), anything not listed in
/// `supporting` errors as unsupported.
pub(crate) struct MockEncoder {
    supported: Vec<OutputFormat>,
    declared_overrides: HashMap<OutputFormat, String>,
    failing: Vec<OutputFormat>,
    decode_fails: bool,
    jitter_ms: Option<Range<u64>>,
    decode_calls: AtomicUsize,
    encode_calls: AtomicUsize,
}

impl MockEncoder {
    pub fn supporting(formats: &[OutputFormat]) -> Self {
        Self {
            supported: formats.to_vec(),
            declared_overrides: HashMap::new(),
            failing: Vec::new(),
            decode_fails: false,
            jitter_ms: None,
            decode_calls: AtomicUsize::new(0),
            encode_calls: AtomicUsize::new(0),
        }
    }

    /// Succeed for `format` but declare `media_type` instead of the real one.
    pub fn declaring(mut self, format: OutputFormat, media_type: &str) -> Self {
        self.declared_overrides.insert(format, media_type.to_string());
        self
    }

    /// Error on any encode request for `format`.
    pub fn failing(mut self, format: OutputFormat) -> Self {
        self.failing.push(format);
        self
    }

    /// Fail every decode request.
    pub fn with_decode_failure(mut self) -> Self {
        self.decode_fails = true;
        self
    }

    /// Sleep a random duration in `range` (milliseconds) inside each call,
    /// so completion order diverges from submission order.
    pub fn with_jitter(mut self, range: Range<u64>) -> Self {
        self.jitter_ms = Some(range);
        self
    }

    pub fn decode_calls(&self) -> usize {
        self.decode_calls.load(Ordering::Relaxed)
    }

    pub fn encode_calls(&self) -> usize {
        self.encode_calls.load(Ordering::Relaxed)
    }

    async fn maybe_sleep(&self) {
        if let Some(range) = &self.jitter_ms {
            let ms = {
                use rand::Rng;
                rand::thread_rng().gen_range(range.clone())
            };
            tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
        }
    }
}

#[async_trait]
impl HostEncoder for MockEncoder {
    fn name(&self) -> &str {
        "mock"
    }

    async fn decode(&self, bytes: &[u8]) -> TranscodeResult<DecodedImage> {
        self.decode_calls.fetch_add(1, Ordering::Relaxed);
        self.maybe_sleep().await;

        if self.decode_fails || bytes.is_empty() {
            return Err(TranscodeError::Decode {
                message: "not a recognizable image".to_string(),
            });
        }
        Ok(DecodedImage::new(DynamicImage::new_rgba8(2, 2), None))
    }

    async fn encode(
        &self,
        _surface: &Surface,
        format: OutputFormat,
        _quality: f32,
    ) -> TranscodeResult<EncodedArtifact> {
        self.encode_calls.fetch_add(1, Ordering::Relaxed);
        self.maybe_sleep().await;

        if self.failing.contains(&format) {
            return Err(TranscodeError::Encode {
                format,
                message: "mock encode failure".to_string(),
            });
        }
        if let Some(declared) = self.declared_overrides.get(&format) {
            return Ok(EncodedArtifact {
                bytes: vec![0xAB; 8],
                media_type: declared.clone(),
            });
        }
        if self.supported.contains(&format) {
            return Ok(EncodedArtifact {
                bytes: vec![0xCD; 16],
                media_type: format.media_type().to_string(),
            });
        }
        Err(TranscodeError::Encode {
            format,
            message: "format not supported by mock".to_string(),
        })
    }
}
