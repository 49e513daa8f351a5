// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Veriscan.
//
// Two layers: `VeriscanError` is the operational error returned by engine
// and store APIs; `ScanError` is the serializable value that travels inside
// pipeline results and terminal scan reports, carrying a user-facing message
// and a recoverability flag.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::user_messages::humanize_code;

/// Top-level error type for all Veriscan operations.
#[derive(Debug, Error)]
pub enum VeriscanError {
    // -- Orchestration misuse --
    #[error("a scan session is already active")]
    SessionActive,

    #[error("session is not in a terminal state")]
    SessionNotTerminal,

    #[error("no active scan session")]
    NoActiveSession,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("scan engine has shut down")]
    EngineClosed,

    // -- Collaborator / bridge --
    #[error("field parsing failed: {0}")]
    ParseFailed(String),

    #[error("feature not available on this platform")]
    PlatformUnavailable,

    // -- Storage / persistence --
    #[error("database error: {0}")]
    Database(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, VeriscanError>;

/// Classification of pipeline failures for retry/fallback decisions.
///
/// Recoverable failures are absorbed by the retry budget; non-recoverable
/// failures short-circuit the session to `Failed` since switching pipeline
/// cannot compensate for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScanErrorCode {
    /// No barcode was located in the frame — try the next frame.
    NoBarcodeFound,
    /// A barcode was located but could not be decoded.
    DecodeFailed,
    /// No legible text was located in the frame.
    NoTextFound,
    /// Extraction succeeded but confidence fell below the threshold.
    LowConfidence,
    /// Raw data was extracted but the AAMVA field parser rejected it.
    ParseFailed,
    /// The barcode symbology is not one we support.
    UnsupportedFormat,
    /// The camera (or the vision worker behind it) is gone.
    CameraUnavailable,
    /// The session ran out of time without a usable result.
    Timeout,
    /// The user cancelled the scan.
    Cancelled,
}

impl ScanErrorCode {
    /// Whether a failure with this code may be retried (same pipeline) or
    /// absorbed by fallback. Non-recoverable codes always terminate the
    /// session, bypassing any remaining retry budget.
    pub fn is_recoverable(self) -> bool {
        match self {
            Self::NoBarcodeFound
            | Self::DecodeFailed
            | Self::NoTextFound
            | Self::LowConfidence
            | Self::ParseFailed => true,
            Self::UnsupportedFormat
            | Self::CameraUnavailable
            | Self::Timeout
            | Self::Cancelled => false,
        }
    }
}

/// A pipeline-level failure as surfaced to the UI layer.
///
/// `user_message` and `recoverable` are derived from the code at
/// construction so callers never assemble them inconsistently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanError {
    pub code: ScanErrorCode,
    /// Technical detail for logs and diagnostics.
    pub message: String,
    /// Plain-English text suitable for direct display.
    pub user_message: String,
    pub recoverable: bool,
}

impl ScanError {
    pub fn new(code: ScanErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            user_message: humanize_code(code).message,
            recoverable: code.is_recoverable(),
        }
    }

    /// Synthesized terminal error for sessions that time out without any
    /// underlying pipeline error.
    pub fn timed_out() -> Self {
        Self::new(ScanErrorCode::Timeout, "scan timed out before producing a result")
    }
}

impl std::fmt::Display for ScanError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}
