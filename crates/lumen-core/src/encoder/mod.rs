//! The host-encoder seam: decode and encode primitives behind a trait.
//!
//! The pipeline never implements encoding itself; it consumes a
//! [`HostEncoder`] whose actual format support is discovered at runtime by
//! the capability probe. Uses `async_trait` because native async fn in
//! trait is not object-safe (we need `Arc<dyn HostEncoder>` for sharing
//! across pipeline invocations).

mod image_rs;

pub use image_rs::ImageRsEncoder;

use async_trait::async_trait;
use image::{DynamicImage, GenericImage, GenericImageView, RgbaImage};

use crate::error::{TranscodeError, TranscodeResult};
use crate::formats::OutputFormat;

/// A decoded, renderable image.
#[derive(Debug)]
pub struct DecodedImage {
    /// Pixel data for a single representative frame
    pub image: DynamicImage,
    /// Natural width in pixels
    pub width: u32,
    /// Natural height in pixels
    pub height: u32,
    /// Detected source format name, when recognizable ("png", "gif", ...)
    pub source_format: Option<String>,
}

impl DecodedImage {
    pub fn new(image: DynamicImage, source_format: Option<String>) -> Self {
        let (width, height) = image.dimensions();
        Self {
            image,
            width,
            height,
            source_format,
        }
    }
}

/// A fresh render target sized to an image's natural dimensions.
///
/// Encoding always goes through a surface rather than the decoded image
/// directly: the surface normalizes pixel layout to RGBA and is the unit
/// the probe paints its one-pixel test onto.
#[derive(Debug)]
pub struct Surface {
    pub width: u32,
    pub height: u32,
    pub pixels: RgbaImage,
}

impl Surface {
    /// Draw a decoded image onto a new surface of its natural size.
    pub fn render(decoded: &DecodedImage) -> TranscodeResult<Self> {
        if decoded.width == 0 || decoded.height == 0 {
            return Err(TranscodeError::Surface {
                message: format!(
                    "cannot create {}x{} surface",
                    decoded.width, decoded.height
                ),
            });
        }

        let mut pixels = RgbaImage::new(decoded.width, decoded.height);
        pixels
            .copy_from(&decoded.image.to_rgba8(), 0, 0)
            .map_err(|e| TranscodeError::Surface {
                message: format!("draw failed: {e}"),
            })?;

        Ok(Self {
            width: decoded.width,
            height: decoded.height,
            pixels,
        })
    }

    /// Minimal 1x1 opaque surface used by the capability probe.
    pub fn probe_pixel() -> Self {
        let mut pixels = RgbaImage::new(1, 1);
        pixels.put_pixel(0, 0, image::Rgba([0, 0, 0, 255]));
        Self {
            width: 1,
            height: 1,
            pixels,
        }
    }
}

/// An encoded artifact as returned by the host encoder.
///
/// `media_type` is what the encoder *declares* it produced, which is not
/// trusted: verification compares it against the requested format's type
/// to catch silent substitutions.
#[derive(Debug, Clone)]
pub struct EncodedArtifact {
    pub bytes: Vec<u8>,
    pub media_type: String,
}

impl EncodedArtifact {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// The asynchronous encoder provided by the host.
///
/// Implementations must be cheap to invoke repeatedly: the probe calls
/// `encode` once per candidate format on a 1x1 surface at startup.
#[async_trait]
pub trait HostEncoder: Send + Sync {
    /// Encoder name for logging (e.g., "image-rs").
    fn name(&self) -> &str;

    /// Decode input bytes into a renderable image.
    ///
    /// Animated sources decode to a single representative frame.
    async fn decode(&self, bytes: &[u8]) -> TranscodeResult<DecodedImage>;

    /// Encode a surface into the given format.
    ///
    /// `quality` is 0.0-1.0 and applies to lossy formats only; the
    /// lossless format ignores it.
    async fn encode(
        &self,
        surface: &Surface,
        format: OutputFormat,
        quality: f32,
    ) -> TranscodeResult<EncodedArtifact>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_surface_matches_natural_dimensions() {
        let decoded = DecodedImage::new(DynamicImage::new_rgb8(640, 480), None);
        let surface = Surface::render(&decoded).unwrap();
        assert_eq!(surface.width, 640);
        assert_eq!(surface.height, 480);
        assert_eq!(surface.pixels.dimensions(), (640, 480));
    }

    #[test]
    fn test_surface_rejects_zero_dimension() {
        let decoded = DecodedImage::new(DynamicImage::new_rgb8(0, 10), None);
        let err = Surface::render(&decoded).unwrap_err();
        assert!(matches!(err, TranscodeError::Surface { .. }));
    }

    #[test]
    fn test_probe_pixel_is_opaque() {
        let surface = Surface::probe_pixel();
        assert_eq!((surface.width, surface.height), (1, 1));
        assert_eq!(surface.pixels.get_pixel(0, 0).0[3], 255);
    }
}
