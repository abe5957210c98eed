//! Default [`HostEncoder`] backend built on the `image` crate.
//!
//! CPU-bound decode/encode work runs in `spawn_blocking` with a timeout.
//! AVIF encoding is not available in this backend, so the capability probe
//! genuinely discovers support at runtime instead of assuming it.

use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::webp::WebPEncoder;
use image::{DynamicImage, ExtendedColorType, ImageEncoder, ImageFormat, RgbaImage};
use std::io::Cursor;
use std::time::Duration;
use tokio::time::timeout;

use crate::config::LimitsConfig;
use crate::error::{TranscodeError, TranscodeResult};
use crate::formats::OutputFormat;

use super::{DecodedImage, EncodedArtifact, HostEncoder, Surface};

/// Host encoder backed by the `image` crate.
pub struct ImageRsEncoder {
    limits: LimitsConfig,
}

impl ImageRsEncoder {
    /// Create a new encoder with the given limits.
    pub fn new(limits: LimitsConfig) -> Self {
        Self { limits }
    }

    /// Synchronous decode (runs in spawn_blocking).
    fn decode_sync(bytes: Vec<u8>) -> TranscodeResult<DecodedImage> {
        let reader = image::ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| TranscodeError::Decode {
                message: format!("cannot detect image format: {e}"),
            })?;

        let source_format = reader.format().map(format_name);

        // Animated sources (gif) decode to their first frame here.
        let decoded = reader.decode().map_err(|e| TranscodeError::Decode {
            message: e.to_string(),
        })?;

        Ok(DecodedImage::new(decoded, source_format))
    }

    /// Synchronous encode (runs in spawn_blocking).
    fn encode_sync(
        pixels: RgbaImage,
        format: OutputFormat,
        quality: f32,
    ) -> TranscodeResult<EncodedArtifact> {
        let (width, height) = pixels.dimensions();
        let mut buffer = Cursor::new(Vec::new());

        match format {
            OutputFormat::Jpeg => {
                // JPEG has no alpha channel; flatten to RGB first.
                let rgb = DynamicImage::ImageRgba8(pixels).to_rgb8();
                let encoder =
                    JpegEncoder::new_with_quality(&mut buffer, quality_percent(quality));
                encoder
                    .write_image(rgb.as_raw(), width, height, ExtendedColorType::Rgb8)
                    .map_err(|e| TranscodeError::Encode {
                        format,
                        message: e.to_string(),
                    })?;
            }
            OutputFormat::Png => {
                // Lossless: quality intentionally ignored.
                DynamicImage::ImageRgba8(pixels)
                    .write_to(&mut buffer, ImageFormat::Png)
                    .map_err(|e| TranscodeError::Encode {
                        format,
                        message: e.to_string(),
                    })?;
            }
            OutputFormat::WebP => {
                // The image crate ships a lossless WebP encoder only.
                let encoder = WebPEncoder::new_lossless(&mut buffer);
                encoder
                    .write_image(pixels.as_raw(), width, height, ExtendedColorType::Rgba8)
                    .map_err(|e| TranscodeError::Encode {
                        format,
                        message: e.to_string(),
                    })?;
            }
            OutputFormat::Avif => {
                return Err(TranscodeError::Encode {
                    format,
                    message: "avif encoding not available in this backend".to_string(),
                });
            }
        }

        Ok(EncodedArtifact {
            bytes: buffer.into_inner(),
            media_type: format.media_type().to_string(),
        })
    }
}

impl Default for ImageRsEncoder {
    fn default() -> Self {
        Self::new(LimitsConfig::default())
    }
}

#[async_trait]
impl HostEncoder for ImageRsEncoder {
    fn name(&self) -> &str {
        "image-rs"
    }

    async fn decode(&self, bytes: &[u8]) -> TranscodeResult<DecodedImage> {
        let size_mb = bytes.len() as u64 / 1_000_000;
        if size_mb > self.limits.max_file_size_mb {
            return Err(TranscodeError::Decode {
                message: format!(
                    "input too large: {size_mb}MB > {}MB",
                    self.limits.max_file_size_mb
                ),
            });
        }

        let owned = bytes.to_vec();
        let timeout_duration = Duration::from_millis(self.limits.decode_timeout_ms);

        let decode_result = timeout(
            timeout_duration,
            tokio::task::spawn_blocking(move || Self::decode_sync(owned)),
        )
        .await;

        match decode_result {
            Ok(Ok(Ok(decoded))) => {
                if decoded.width > self.limits.max_image_dimension
                    || decoded.height > self.limits.max_image_dimension
                {
                    return Err(TranscodeError::Decode {
                        message: format!(
                            "image too large: {}x{} > {}",
                            decoded.width, decoded.height, self.limits.max_image_dimension
                        ),
                    });
                }
                Ok(decoded)
            }
            Ok(Ok(Err(e))) => Err(e),
            Ok(Err(e)) => Err(TranscodeError::Decode {
                message: format!("task join error: {e}"),
            }),
            Err(_) => Err(TranscodeError::Timeout {
                stage: "decode",
                timeout_ms: self.limits.decode_timeout_ms,
            }),
        }
    }

    async fn encode(
        &self,
        surface: &Surface,
        format: OutputFormat,
        quality: f32,
    ) -> TranscodeResult<EncodedArtifact> {
        let pixels = surface.pixels.clone();
        let timeout_duration = Duration::from_millis(self.limits.encode_timeout_ms);

        let encode_result = timeout(
            timeout_duration,
            tokio::task::spawn_blocking(move || Self::encode_sync(pixels, format, quality)),
        )
        .await;

        match encode_result {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(TranscodeError::Encode {
                format,
                message: format!("task join error: {e}"),
            }),
            Err(_) => Err(TranscodeError::Timeout {
                stage: "encode",
                timeout_ms: self.limits.encode_timeout_ms,
            }),
        }
    }
}

/// Map 0.0-1.0 quality to the 1-100 scale lossy encoders expect.
fn quality_percent(quality: f32) -> u8 {
    ((quality.clamp(0.0, 1.0) * 100.0).round() as u8).max(1)
}

/// Source format name for a detected `ImageFormat`.
fn format_name(format: ImageFormat) -> String {
    match format {
        ImageFormat::Jpeg => "jpeg".to_string(),
        ImageFormat::Png => "png".to_string(),
        ImageFormat::WebP => "webp".to_string(),
        ImageFormat::Gif => "gif".to_string(),
        ImageFormat::Bmp => "bmp".to_string(),
        ImageFormat::Tiff => "tiff".to_string(),
        other => format!("{other:?}").to_lowercase(),
    }
}
