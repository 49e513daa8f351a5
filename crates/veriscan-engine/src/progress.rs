// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Progress reporting: maps orchestrator state to the UI-facing
// `ScanProgress` snapshot.
//
// Pure over read-only session state — recomputed on every transition and
// throttled quality tick, never stored as history. Message text lives in
// one fixed lookup so the viewfinder copy stays consistent.

use std::time::Instant;

use veriscan_core::config::FallbackConfig;
use veriscan_core::types::{QualityMetrics, QualityStatus, ScanProgress, ScanState};

use crate::session::ScanSession;

/// Builds `ScanProgress` snapshots from the current session.
pub struct ProgressReporter;

impl ProgressReporter {
    /// Snapshot the session for the UI layer.
    pub fn snapshot(session: &ScanSession, config: &FallbackConfig, now: Instant) -> ScanProgress {
        let state = session.state;
        let elapsed_ms = session.elapsed_ms(now);

        let (ratio, remaining_ms) = match state {
            ScanState::Barcode | ScanState::FallbackTransition => {
                let timeout = config.barcode_timeout_ms;
                (
                    elapsed_ms as f64 / timeout.max(1) as f64,
                    timeout.saturating_sub(elapsed_ms),
                )
            }
            ScanState::Ocr => {
                let timeout = config.ocr_timeout_ms;
                let ocr_elapsed = session.ocr_elapsed_ms(now);
                (
                    ocr_elapsed as f64 / timeout.max(1) as f64,
                    timeout.saturating_sub(ocr_elapsed),
                )
            }
            _ => (0.0, 0),
        };

        // Clamped to [0, 100): only a completed scan reads 100.
        let progress_percentage = if state == ScanState::Completed {
            100.0
        } else {
            (ratio * 100.0).clamp(0.0, 99.0)
        };

        let (message, announcement) = message_for(session);

        ScanProgress {
            state,
            mode: session.requested_mode,
            time_elapsed_ms: elapsed_ms,
            barcode_attempts: session.barcode_tracker.attempts,
            message,
            progress_percentage,
            show_cancel_button: !state.is_terminal(),
            is_transitioning: state == ScanState::FallbackTransition,
            estimated_time_remaining_ms: remaining_ms,
            accessibility_announcement: announcement,
        }
    }
}

/// Fixed (state, attempts, quality) → copy table.
///
/// Returns (viewfinder message, screen-reader announcement).
fn message_for(session: &ScanSession) -> (String, String) {
    match session.state {
        ScanState::Idle => (
            "Ready to scan.".into(),
            "Scanner ready. Position your license to begin.".into(),
        ),
        ScanState::Barcode => {
            if let Some(hint) = quality_hint(session.last_quality.as_ref()) {
                return hint;
            }
            if session.barcode_tracker.attempts == 0 {
                (
                    "Line up the barcode on the back of your license.".into(),
                    "Scanning for the barcode on the back of your license.".into(),
                )
            } else {
                (
                    "Reading the barcode…".into(),
                    format!(
                        "Still reading the barcode, attempt {}.",
                        session.barcode_tracker.attempts
                    ),
                )
            }
        }
        ScanState::FallbackTransition => (
            "Switching to text recognition…".into(),
            "The barcode couldn't be read. Switching to reading the front of your license.".into(),
        ),
        ScanState::Ocr => {
            if let Some(hint) = quality_hint(session.last_quality.as_ref()) {
                return hint;
            }
            (
                "Reading the front of your license…".into(),
                "Reading the text on the front of your license.".into(),
            )
        }
        ScanState::Completed => (
            "Scan complete.".into(),
            "Scan complete. Your license details were captured.".into(),
        ),
        ScanState::Failed => (
            "Scan failed.".into(),
            "Scanning failed. You can try again or enter the details manually.".into(),
        ),
        ScanState::Cancelled => ("Scan cancelled.".into(), "Scan cancelled.".into()),
    }
}

/// Actionable coaching for the worst degraded aspect, if any.
fn quality_hint(quality: Option<&QualityMetrics>) -> Option<(String, String)> {
    let q = quality?;
    if q.overall.status != QualityStatus::Poor {
        return None;
    }

    if !q.positioning.document_detected || q.positioning.status == QualityStatus::Poor {
        Some((
            "Center the license in the frame.".into(),
            "The license isn't positioned well. Center it inside the frame.".into(),
        ))
    } else if q.blur.status == QualityStatus::Poor {
        Some((
            "Hold the phone steady.".into(),
            "The image is blurry. Hold the phone steady.".into(),
        ))
    } else if q.lighting.status == QualityStatus::Poor {
        Some((
            "Find better light.".into(),
            "The lighting is too poor to scan. Move somewhere brighter.".into(),
        ))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use veriscan_core::types::{RawQualitySample, ScanMode};

    use crate::quality::QualityGate;

    fn at(base: Instant, ms: u64) -> Instant {
        base + Duration::from_millis(ms)
    }

    #[test]
    fn barcode_progress_tracks_elapsed_ratio() {
        let t0 = Instant::now();
        let config = FallbackConfig::default(); // 10s barcode window
        let session = ScanSession::new(ScanMode::Auto, ScanState::Barcode, t0);

        let progress = ProgressReporter::snapshot(&session, &config, at(t0, 2_500));
        assert_eq!(progress.state, ScanState::Barcode);
        assert!((progress.progress_percentage - 25.0).abs() < 0.01);
        assert_eq!(progress.estimated_time_remaining_ms, 7_500);
        assert!(progress.show_cancel_button);
        assert!(!progress.is_transitioning);
    }

    #[test]
    fn percentage_never_reaches_100_before_completion() {
        let t0 = Instant::now();
        let config = FallbackConfig::default();
        let session = ScanSession::new(ScanMode::Auto, ScanState::Barcode, t0);

        // Well past the timeout — still clamped below 100.
        let progress = ProgressReporter::snapshot(&session, &config, at(t0, 60_000));
        assert!(progress.progress_percentage < 100.0);
        assert_eq!(progress.estimated_time_remaining_ms, 0);
    }

    #[test]
    fn completed_reads_exactly_100() {
        let t0 = Instant::now();
        let mut session = ScanSession::new(ScanMode::Auto, ScanState::Barcode, t0);
        session.transition_to(ScanState::Completed, at(t0, 1_000));

        let progress = ProgressReporter::snapshot(&session, &FallbackConfig::default(), at(t0, 1_000));
        assert_eq!(progress.progress_percentage, 100.0);
        assert!(!progress.show_cancel_button);
    }

    #[test]
    fn ocr_progress_measured_from_ocr_entry() {
        let t0 = Instant::now();
        let config = FallbackConfig::default(); // 15s OCR window
        let mut session = ScanSession::new(ScanMode::Auto, ScanState::Barcode, t0);
        session.transition_to(ScanState::FallbackTransition, at(t0, 10_000));
        session.transition_to(ScanState::Ocr, at(t0, 10_000));
        session.ocr_entered_at = Some(at(t0, 10_000));

        let progress = ProgressReporter::snapshot(&session, &config, at(t0, 13_000));
        assert!((progress.progress_percentage - 20.0).abs() < 0.01);
        assert_eq!(progress.estimated_time_remaining_ms, 12_000);
    }

    #[test]
    fn transition_state_flags_transitioning() {
        let t0 = Instant::now();
        let mut session = ScanSession::new(ScanMode::Auto, ScanState::Barcode, t0);
        session.transition_to(ScanState::FallbackTransition, at(t0, 5_000));

        let progress = ProgressReporter::snapshot(&session, &FallbackConfig::default(), at(t0, 5_000));
        assert!(progress.is_transitioning);
        assert!(progress.message.contains("text recognition"));
    }

    #[test]
    fn poor_blur_gets_steady_hint() {
        let t0 = Instant::now();
        let mut session = ScanSession::new(ScanMode::Auto, ScanState::Barcode, t0);
        session.last_quality = Some(QualityGate::default().classify(RawQualitySample {
            blur: 0.9,
            brightness: 0.6,
            uniformity: 0.9,
            alignment: 0.85,
            document_detected: true,
        }));

        let progress = ProgressReporter::snapshot(&session, &FallbackConfig::default(), t0);
        assert_eq!(progress.message, "Hold the phone steady.");
        assert!(progress.accessibility_announcement.contains("blurry"));
    }

    #[test]
    fn missing_document_gets_positioning_hint() {
        let t0 = Instant::now();
        let mut session = ScanSession::new(ScanMode::Auto, ScanState::Barcode, t0);
        session.last_quality = Some(QualityGate::default().classify(RawQualitySample {
            blur: 0.1,
            brightness: 0.6,
            uniformity: 0.9,
            alignment: 0.2,
            document_detected: false,
        }));

        let progress = ProgressReporter::snapshot(&session, &FallbackConfig::default(), t0);
        assert_eq!(progress.message, "Center the license in the frame.");
    }
}
