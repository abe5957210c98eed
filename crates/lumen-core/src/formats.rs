//! Output formats, the capability snapshot, and the fallback chain.
//!
//! The fallback policy is data: each format carries the ordered list of
//! substitutes tried when it is unsupported or fails verification, so the
//! policy can be tested without touching an encoder.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An output format the host encoder may be asked to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Jpeg,
    Png,
    WebP,
    Avif,
}

/// All candidate formats, in display/probe order.
pub const CANDIDATE_FORMATS: [OutputFormat; 4] = [
    OutputFormat::Jpeg,
    OutputFormat::Png,
    OutputFormat::WebP,
    OutputFormat::Avif,
];

/// The format guaranteed supported everywhere; final fallback target.
pub const BASELINE_FORMAT: OutputFormat = OutputFormat::Jpeg;

impl OutputFormat {
    /// Canonical lowercase name ("jpeg", "png", "webp", "avif").
    pub fn name(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpeg",
            OutputFormat::Png => "png",
            OutputFormat::WebP => "webp",
            OutputFormat::Avif => "avif",
        }
    }

    /// MIME type the encoder must declare for this format.
    pub fn media_type(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Png => "image/png",
            OutputFormat::WebP => "image/webp",
            OutputFormat::Avif => "image/avif",
        }
    }

    /// File extension for derived output names.
    ///
    /// JPEG is the one format whose conventional extension differs from
    /// its format name; everything else uses the name as-is.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            other => other.name(),
        }
    }

    /// Whether the format ignores the quality parameter.
    pub fn is_lossless(&self) -> bool {
        matches!(self, OutputFormat::Png)
    }

    /// Formats that are baseline facts: never probed, always supported.
    pub fn is_guaranteed(&self) -> bool {
        matches!(self, OutputFormat::Jpeg | OutputFormat::Png)
    }

    /// Ordered substitutes tried when this format is unsupported or fails,
    /// least-lossy first, terminating at the baseline.
    pub fn fallback_chain(&self) -> &'static [OutputFormat] {
        match self {
            OutputFormat::Avif => &[OutputFormat::WebP, OutputFormat::Jpeg],
            OutputFormat::WebP => &[OutputFormat::Jpeg],
            // Guaranteed formats are their own terminal answers.
            OutputFormat::Png | OutputFormat::Jpeg => &[],
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(OutputFormat::Jpeg),
            "png" => Ok(OutputFormat::Png),
            "webp" => Ok(OutputFormat::WebP),
            "avif" => Ok(OutputFormat::Avif),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}

/// Process-lifetime snapshot of which output formats the encoder honors.
///
/// Fixed shape: one flag per candidate format. Guaranteed formats are
/// constructed `true` without probing; once computed the record is never
/// mutated, so every pipeline invocation in a batch sees the same verdicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatSupport {
    pub jpeg: bool,
    pub png: bool,
    pub webp: bool,
    pub avif: bool,
}

impl FormatSupport {
    /// Snapshot with only the guaranteed baseline facts set.
    pub fn guaranteed_only() -> Self {
        Self {
            jpeg: true,
            png: true,
            webp: false,
            avif: false,
        }
    }

    /// Snapshot claiming support for everything (test / trusted hosts).
    pub fn full() -> Self {
        Self {
            jpeg: true,
            png: true,
            webp: true,
            avif: true,
        }
    }

    pub fn supports(&self, format: OutputFormat) -> bool {
        match format {
            OutputFormat::Jpeg => self.jpeg,
            OutputFormat::Png => self.png,
            OutputFormat::WebP => self.webp,
            OutputFormat::Avif => self.avif,
        }
    }

    /// Resolve a requested format against this snapshot.
    ///
    /// Supported formats come back unchanged; otherwise the first supported
    /// entry in the fixed chain wins. The chain terminates at the baseline,
    /// which is supported by construction.
    pub fn best_fallback(&self, requested: OutputFormat) -> OutputFormat {
        if self.supports(requested) {
            return requested;
        }
        for candidate in requested.fallback_chain() {
            if self.supports(*candidate) {
                return *candidate;
            }
        }
        BASELINE_FORMAT
    }
}

/// One row of the format-support listing shown to users.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormatInfo {
    pub format: OutputFormat,
    pub supported: bool,
    /// Where requests for this format would land, when unsupported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<OutputFormat>,
}

/// Record of a format substitution, attached to an item's result.
///
/// Only produced when `actual != requested`; absence means the requested
/// format was honored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackDecision {
    pub requested: OutputFormat,
    pub actual: OutputFormat,
    pub reason: String,
}

impl FallbackDecision {
    /// Decision made before encoding, when the probe says the requested
    /// format is unsupported.
    pub fn unsupported(requested: OutputFormat, actual: OutputFormat) -> Self {
        Self {
            requested,
            actual,
            reason: format!("{requested} unsupported, using {actual}"),
        }
    }

    /// Decision made after an encode or verification failure, when the
    /// attempt is retried against the baseline.
    pub fn failed(requested: OutputFormat, prior: OutputFormat, baseline: OutputFormat) -> Self {
        Self {
            requested,
            actual: baseline,
            reason: format!("{prior} failed, using {baseline}"),
        }
    }
}
