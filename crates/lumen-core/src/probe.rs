//! Runtime capability detection for the host encoder.
//!
//! The probe runs at most once per process: the first caller triggers it,
//! concurrent callers await the same in-flight detection, and everyone
//! after that reads the cached snapshot. One immutable [`FormatSupport`]
//! record keeps fallback decisions consistent across an entire batch run.

use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::encoder::{HostEncoder, Surface};
use crate::formats::{FormatInfo, FormatSupport, OutputFormat, CANDIDATE_FORMATS};

/// Quality used for probe encodes; the verdict only depends on the
/// declared media type, not output fidelity.
const PROBE_QUALITY: f32 = 0.8;

/// Probes and caches which output formats the encoder actually honors.
///
/// Constructed once at startup and passed by reference to everything that
/// needs it; there is no global state.
pub struct CapabilityProbe {
    encoder: Arc<dyn HostEncoder>,
    support: OnceCell<FormatSupport>,
}

impl CapabilityProbe {
    pub fn new(encoder: Arc<dyn HostEncoder>) -> Self {
        Self {
            encoder,
            support: OnceCell::new(),
        }
    }

    /// Detect encoder support, probing on first call (single-flight).
    pub async fn detect_support(&self) -> FormatSupport {
        *self
            .support
            .get_or_init(|| async { Self::probe_all(self.encoder.as_ref()).await })
            .await
    }

    /// Whether a format is supported per the cached snapshot.
    pub async fn is_supported(&self, format: OutputFormat) -> bool {
        self.detect_support().await.supports(format)
    }

    /// Resolve a requested format against the cached snapshot.
    pub async fn best_fallback(&self, requested: OutputFormat) -> OutputFormat {
        self.detect_support().await.best_fallback(requested)
    }

    /// Ordered per-format rows for display.
    pub async fn format_info_list(&self) -> Vec<FormatInfo> {
        let support = self.detect_support().await;
        CANDIDATE_FORMATS
            .iter()
            .map(|&format| {
                let supported = support.supports(format);
                FormatInfo {
                    format,
                    supported,
                    fallback: (!supported).then(|| support.best_fallback(format)),
                }
            })
            .collect()
    }

    async fn probe_all(encoder: &dyn HostEncoder) -> FormatSupport {
        // Guaranteed formats are baseline facts; only the rest are probed.
        let mut support = FormatSupport::guaranteed_only();

        for format in CANDIDATE_FORMATS {
            if format.is_guaranteed() {
                continue;
            }
            let verdict = Self::probe_format(encoder, format).await;
            match format {
                OutputFormat::WebP => support.webp = verdict,
                OutputFormat::Avif => support.avif = verdict,
                OutputFormat::Jpeg | OutputFormat::Png => unreachable!("guaranteed"),
            }
        }

        tracing::info!(
            encoder = encoder.name(),
            webp = support.webp,
            avif = support.avif,
            "capability probe complete"
        );
        support
    }

    /// Probe one format: encode a 1x1 opaque surface and accept support
    /// only when the declared media type matches exactly. A non-error,
    /// wrong-type result is a silent substitution, not support. Any error
    /// degrades this format alone; probing never aborts.
    async fn probe_format(encoder: &dyn HostEncoder, format: OutputFormat) -> bool {
        let surface = Surface::probe_pixel();
        match encoder.encode(&surface, format, PROBE_QUALITY).await {
            Ok(artifact) => {
                let matches = artifact.media_type == format.media_type();
                if !matches {
                    tracing::debug!(
                        %format,
                        declared = %artifact.media_type,
                        "probe: encoder substituted another type"
                    );
                }
                matches
            }
            Err(e) => {
                tracing::debug!(%format, error = %e, "probe: encode failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockEncoder;

    #[tokio::test]
    async fn test_probe_honest_encoder() {
        let encoder = Arc::new(MockEncoder::supporting(&[
            OutputFormat::Jpeg,
            OutputFormat::Png,
            OutputFormat::WebP,
        ]));
        let probe = CapabilityProbe::new(encoder);

        let support = probe.detect_support().await;
        assert!(support.jpeg && support.png && support.webp);
        assert!(!support.avif);
    }

    #[tokio::test]
    async fn test_guaranteed_formats_never_probed() {
        // Encoder claims nothing works, yet jpeg/png stay supported:
        // they are baseline facts, not probe results.
        let encoder = Arc::new(MockEncoder::supporting(&[]));
        let probe = CapabilityProbe::new(Arc::clone(&encoder) as Arc<dyn HostEncoder>);

        let support = probe.detect_support().await;
        assert!(support.jpeg && support.png);
        assert!(!support.webp && !support.avif);

        // Exactly one probe encode per probed format.
        assert_eq!(encoder.encode_calls(), 2);
    }

    #[tokio::test]
    async fn test_wrong_declared_type_is_not_support() {
        let encoder = Arc::new(
            MockEncoder::supporting(&[OutputFormat::WebP])
                .declaring(OutputFormat::WebP, "image/png"),
        );
        let probe = CapabilityProbe::new(encoder);

        assert!(!probe.is_supported(OutputFormat::WebP).await);
    }

    #[tokio::test]
    async fn test_probe_error_degrades_single_format() {
        let encoder = Arc::new(
            MockEncoder::supporting(&[OutputFormat::WebP, OutputFormat::Avif])
                .failing(OutputFormat::Avif),
        );
        let probe = CapabilityProbe::new(encoder);

        let support = probe.detect_support().await;
        assert!(support.webp);
        assert!(!support.avif);
    }

    #[tokio::test]
    async fn test_detect_support_single_flight() {
        let encoder = Arc::new(MockEncoder::supporting(&[OutputFormat::WebP]).with_jitter(1..5));
        let probe = Arc::new(CapabilityProbe::new(
            Arc::clone(&encoder) as Arc<dyn HostEncoder>
        ));

        let (a, b, c) = tokio::join!(
            probe.detect_support(),
            probe.detect_support(),
            probe.detect_support()
        );
        assert_eq!(a, b);
        assert_eq!(b, c);

        // Concurrent callers shared one probe run: two probed formats,
        // two encode calls total.
        assert_eq!(encoder.encode_calls(), 2);

        // Later calls hit the cache.
        probe.detect_support().await;
        assert_eq!(encoder.encode_calls(), 2);
    }

    #[tokio::test]
    async fn test_format_info_list_order_and_fallbacks() {
        let encoder = Arc::new(MockEncoder::supporting(&[OutputFormat::WebP]));
        let probe = CapabilityProbe::new(encoder);

        let infos = probe.format_info_list().await;
        let formats: Vec<OutputFormat> = infos.iter().map(|i| i.format).collect();
        assert_eq!(formats, CANDIDATE_FORMATS);

        let avif = infos
            .iter()
            .find(|i| i.format == OutputFormat::Avif)
            .unwrap();
        assert!(!avif.supported);
        assert_eq!(avif.fallback, Some(OutputFormat::WebP));

        let jpeg = infos
            .iter()
            .find(|i| i.format == OutputFormat::Jpeg)
            .unwrap();
        assert!(jpeg.supported);
        assert!(jpeg.fallback.is_none());
    }
}
