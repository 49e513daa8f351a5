// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Veriscan — Native vision bridge abstractions.
//
// Defines the traits the engine consumes for barcode decoding, text
// recognition, field parsing, and frame quality analysis. Platform app
// layers (iOS Vision/AVFoundation, Android MLKit/CameraX) implement these
// and feed results back through the engine's command queue.

pub mod stub;
pub mod traits;

pub use stub::StubBridge;
pub use traits::{
    BarcodeDecoder, BarcodeHit, FieldParser, Frame, FrameAnalyzer, Symbology, TextLine,
    TextRecognizer, VisionBridge,
};

/// The bridge implementation for the current build.
///
/// Host platforms register their own [`VisionBridge`] with the capture
/// layer; desktop and CI builds get the stub, which reports every
/// capability as unavailable.
pub fn vision_bridge() -> Box<dyn VisionBridge> {
    Box::new(StubBridge)
}
