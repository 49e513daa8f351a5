// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable messages for scan failures.
//
// Every error code is mapped to plain English with a clear suggestion.
// The severity levels drive UI presentation (retry button vs. hard stop).

use crate::error::{ScanErrorCode, VeriscanError};

/// Severity of a failure from the user's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Momentary miss — the system retries automatically.
    Transient,
    /// The user must do something (steady the phone, find light).
    ActionRequired,
    /// Cannot be fixed by retrying — wrong document, dead camera.
    Permanent,
}

/// A human-readable failure with plain English message and suggestion.
#[derive(Debug, Clone)]
pub struct UserMessage {
    /// Plain English summary (shown as a heading).
    pub message: String,
    /// What the user should try (shown as body text).
    pub suggestion: String,
    /// Whether the system keeps retrying on its own.
    pub retriable: bool,
    pub severity: Severity,
}

/// Map a pipeline error code to user-facing text.
pub fn humanize_code(code: ScanErrorCode) -> UserMessage {
    match code {
        ScanErrorCode::NoBarcodeFound => UserMessage {
            message: "We can't see the barcode yet.".into(),
            suggestion: "Flip the license over and line up the barcode inside the frame.".into(),
            retriable: true,
            severity: Severity::Transient,
        },
        ScanErrorCode::DecodeFailed => UserMessage {
            message: "The barcode isn't reading clearly.".into(),
            suggestion: "Hold the phone steady and make sure the barcode isn't scratched or covered.".into(),
            retriable: true,
            severity: Severity::Transient,
        },
        ScanErrorCode::NoTextFound => UserMessage {
            message: "We can't read the text on the license yet.".into(),
            suggestion: "Move to better light and hold the license flat inside the frame.".into(),
            retriable: true,
            severity: Severity::Transient,
        },
        ScanErrorCode::LowConfidence => UserMessage {
            message: "We got a partial read, but it's not clear enough.".into(),
            suggestion: "Hold still for a moment — we're trying again.".into(),
            retriable: true,
            severity: Severity::Transient,
        },
        ScanErrorCode::ParseFailed => UserMessage {
            message: "We read something, but it doesn't look like a license.".into(),
            suggestion: "Make sure this is a driver's license or state ID and try again.".into(),
            retriable: true,
            severity: Severity::ActionRequired,
        },
        ScanErrorCode::UnsupportedFormat => UserMessage {
            message: "This ID uses a format we don't support.".into(),
            suggestion: "Try entering the details manually instead.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },
        ScanErrorCode::CameraUnavailable => UserMessage {
            message: "The camera stopped working.".into(),
            suggestion: "Close other apps that might be using the camera, then try again.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },
        ScanErrorCode::Timeout => UserMessage {
            message: "Scanning took too long.".into(),
            suggestion: "Try again in better light, or enter the details manually.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },
        ScanErrorCode::Cancelled => UserMessage {
            message: "Scan cancelled.".into(),
            suggestion: "Tap Scan when you're ready to try again.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },
    }
}

/// Map an operational error to user-facing text.
///
/// Misuse errors reach developers, not end users, so their text is blunt.
pub fn humanize_error(err: &VeriscanError) -> UserMessage {
    match err {
        VeriscanError::SessionActive => UserMessage {
            message: "A scan is already running.".into(),
            suggestion: "Wait for it to finish, or cancel it first.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },
        VeriscanError::SessionNotTerminal | VeriscanError::NoActiveSession => UserMessage {
            message: "The scanner is busy.".into(),
            suggestion: "Wait a moment and try again.".into(),
            retriable: true,
            severity: Severity::Transient,
        },
        VeriscanError::InvalidConfig(detail) => UserMessage {
            message: "The scan settings are invalid.".into(),
            suggestion: format!("Fix the configuration and restart the scan. ({detail})"),
            retriable: false,
            severity: Severity::Permanent,
        },
        VeriscanError::EngineClosed => UserMessage {
            message: "The scanner shut down.".into(),
            suggestion: "Restart the app and try again.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },
        VeriscanError::ParseFailed(_) => humanize_code(ScanErrorCode::ParseFailed),
        VeriscanError::PlatformUnavailable => UserMessage {
            message: "Scanning isn't available on this device.".into(),
            suggestion: "Enter the details manually instead.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },
        VeriscanError::Database(_) | VeriscanError::Io(_) | VeriscanError::Serialization(_) => {
            UserMessage {
                message: "The app had a storage problem.".into(),
                suggestion: "Try again. Your scan settings may have reset to defaults.".into(),
                retriable: true,
                severity: Severity::Transient,
            }
        }
    }
}
