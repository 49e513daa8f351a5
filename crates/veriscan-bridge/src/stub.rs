// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Stub bridge for desktop/CI builds where native vision APIs are
// unavailable. Every trait method returns `PlatformUnavailable` — real
// implementations live in the platform app layers.

use veriscan_core::error::{Result, VeriscanError};
use veriscan_core::types::{LicenseData, RawQualitySample};

use crate::traits::*;

/// No-op bridge returned on non-mobile platforms.
pub struct StubBridge;

impl VisionBridge for StubBridge {
    fn platform_name(&self) -> &str {
        "Desktop (stub)"
    }
}

impl BarcodeDecoder for StubBridge {
    fn decode(&self, _frame: &Frame<'_>) -> Result<Option<BarcodeHit>> {
        tracing::warn!("BarcodeDecoder::decode called on stub bridge");
        Err(VeriscanError::PlatformUnavailable)
    }
}

impl TextRecognizer for StubBridge {
    fn recognize(&self, _frame: &Frame<'_>) -> Result<Vec<TextLine>> {
        tracing::warn!("TextRecognizer::recognize called on stub bridge");
        Err(VeriscanError::PlatformUnavailable)
    }
}

impl FieldParser for StubBridge {
    fn parse_barcode_payload(&self, _payload: &str) -> Result<LicenseData> {
        tracing::warn!("FieldParser::parse_barcode_payload called on stub bridge");
        Err(VeriscanError::PlatformUnavailable)
    }

    fn parse_text_lines(&self, _lines: &[TextLine]) -> Result<LicenseData> {
        Err(VeriscanError::PlatformUnavailable)
    }
}

impl FrameAnalyzer for StubBridge {
    fn analyze(&self, _frame: &Frame<'_>) -> Result<RawQualitySample> {
        Err(VeriscanError::PlatformUnavailable)
    }
}
