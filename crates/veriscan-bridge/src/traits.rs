// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-agnostic trait definitions for native vision capabilities.
//
// The engine is deliberately blind to where barcodes and text actually get
// decoded — Vision/MLKit on device, a software decoder in CI. Implementors
// run on camera delivery threads; their outputs must be marshalled into the
// engine through `ScanEngine::submit_result` / `submit_quality_sample`,
// never applied to session state directly.

use veriscan_core::error::Result;
use veriscan_core::types::{LicenseData, RawQualitySample};

/// Unified bridge that groups all native vision capabilities.
///
/// Platforms that lack a capability (e.g. no PDF417 decoder in a headless
/// test build) return `VeriscanError::PlatformUnavailable` from the stub
/// implementation.
pub trait VisionBridge: BarcodeDecoder + TextRecognizer + FieldParser + FrameAnalyzer {
    /// Human-readable platform name (e.g. "iOS 19 Vision", "Android 16 MLKit").
    fn platform_name(&self) -> &str;
}

/// One camera frame, borrowed from the capture layer for the duration of a
/// single decode call.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub width: u32,
    pub height: u32,
    /// Stride of `luma` in bytes; at least `width`.
    pub bytes_per_row: usize,
    /// 8-bit luminance plane, row-major.
    pub luma: &'a [u8],
    /// Capture timestamp relative to session start.
    pub timestamp_ms: u64,
}

/// A successfully located and decoded barcode symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct BarcodeHit {
    /// Raw symbol payload (for PDF417 this is the AAMVA data string).
    pub payload: String,
    pub symbology: Symbology,
    /// Decoder self-reported confidence, 0.0–1.0.
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symbology {
    Pdf417,
    QrCode,
    Code128,
}

/// One recognized line of text with its placement in the frame.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub text: String,
    pub confidence: f64,
    /// Normalized bounding box: x, y, width, height in 0.0–1.0 frame space.
    pub bounds: [f64; 4],
}

/// Locate and decode barcodes in a frame.
pub trait BarcodeDecoder {
    /// Decode the first supported symbol found, or `Ok(None)` when the
    /// frame contains no locatable barcode.
    fn decode(&self, frame: &Frame<'_>) -> Result<Option<BarcodeHit>>;
}

/// Recognize printed text in a frame.
pub trait TextRecognizer {
    /// All text lines found, in reading order. An empty vector means the
    /// recognizer ran but saw nothing usable.
    fn recognize(&self, frame: &Frame<'_>) -> Result<Vec<TextLine>>;
}

/// Turn raw decoder output into structured license fields.
pub trait FieldParser {
    /// Parse an AAMVA PDF417 payload into license fields.
    fn parse_barcode_payload(&self, payload: &str) -> Result<LicenseData>;

    /// Assemble license fields from recognized text lines, using layout
    /// heuristics for the issuing jurisdiction.
    fn parse_text_lines(&self, lines: &[TextLine]) -> Result<LicenseData>;
}

/// Cheap per-frame quality signals, computed before any decode attempt.
pub trait FrameAnalyzer {
    /// Measure blur, brightness, uniformity, and document alignment for one
    /// frame. Runs at camera rate; must be cheap.
    fn analyze(&self, frame: &Frame<'_>) -> Result<RawQualitySample>;
}
