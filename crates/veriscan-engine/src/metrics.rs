// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Metrics collection: folds the session's transition log into the final
// `ScanMetrics` summary at termination.

use std::time::Instant;

use veriscan_core::config::FallbackConfig;
use veriscan_core::types::{PerformanceRating, Pipeline, ScanMetrics, ScanState};

use crate::session::ScanSession;

/// Derives the immutable `ScanMetrics` summary from a finished session.
///
/// Pure over read-only session state — called exactly once, at the terminal
/// transition.
pub struct MetricsCollector;

impl MetricsCollector {
    /// Fold the transition log into a summary.
    ///
    /// `now` closes the final (terminal) interval; terminal states carry no
    /// processing time, so only non-terminal intervals contribute.
    pub fn collect(session: &ScanSession, config: &FallbackConfig, now: Instant) -> ScanMetrics {
        let mut barcode_ms = 0u64;
        let mut ocr_ms = 0u64;
        let mut transition_ms = 0u64;
        let mut fallback_triggered = false;
        let mut final_mode = None;

        for record in &session.log {
            match record.state {
                ScanState::Barcode => {
                    barcode_ms += record.duration_ms(now);
                    final_mode = Some(Pipeline::Barcode);
                }
                ScanState::Ocr => {
                    ocr_ms += record.duration_ms(now);
                    final_mode = Some(Pipeline::Ocr);
                }
                ScanState::FallbackTransition => {
                    transition_ms += record.duration_ms(now);
                    fallback_triggered = true;
                }
                ScanState::Idle
                | ScanState::Completed
                | ScanState::Failed
                | ScanState::Cancelled => {}
            }
        }

        let total_ms = barcode_ms + ocr_ms + transition_ms;
        let success = session.state == ScanState::Completed;

        // Cancellation reports no fallback reason, per the progress/metrics
        // contract for user-initiated aborts.
        let fallback_reason = if session.state == ScanState::Cancelled {
            None
        } else {
            session.fallback_reason
        };

        let ratio = total_ms as f64 / config.combined_budget_ms().max(1) as f64;

        ScanMetrics {
            total_processing_time_ms: total_ms,
            barcode_attempt_time_ms: barcode_ms,
            ocr_processing_time_ms: ocr_ms,
            mode_transition_time_ms: transition_ms,
            barcode_attempts: session.barcode_tracker.attempts,
            ocr_attempts: session.ocr_tracker.attempts,
            fallback_triggered,
            fallback_reason,
            final_mode,
            success,
            performance_rating: PerformanceRating::from_ratio(ratio),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use veriscan_core::types::{FallbackReason, ScanMode};

    fn at(base: Instant, ms: u64) -> Instant {
        base + Duration::from_millis(ms)
    }

    #[test]
    fn first_attempt_success_metrics() {
        let t0 = Instant::now();
        let mut session = ScanSession::new(ScanMode::Auto, ScanState::Barcode, t0);
        session.barcode_tracker.record_attempt(at(t0, 1200));
        session.transition_to(ScanState::Completed, at(t0, 1200));

        let metrics = MetricsCollector::collect(&session, &FallbackConfig::default(), at(t0, 1200));

        assert!(metrics.success);
        assert!(!metrics.fallback_triggered);
        assert_eq!(metrics.final_mode, Some(Pipeline::Barcode));
        assert_eq!(metrics.barcode_attempt_time_ms, 1200);
        assert_eq!(metrics.ocr_processing_time_ms, 0);
        assert_eq!(metrics.total_processing_time_ms, 1200);
        assert_eq!(metrics.barcode_attempts, 1);
        // 1200ms of a 30s budget is comfortably excellent.
        assert_eq!(metrics.performance_rating, PerformanceRating::Excellent);
    }

    #[test]
    fn fallback_session_sums_per_state() {
        let t0 = Instant::now();
        let mut session = ScanSession::new(ScanMode::Auto, ScanState::Barcode, t0);
        session.transition_to(ScanState::FallbackTransition, at(t0, 10_000));
        session.transition_to(ScanState::Ocr, at(t0, 10_050));
        session.fallback_reason = Some(FallbackReason::Timeout);
        session.transition_to(ScanState::Completed, at(t0, 14_050));

        let metrics =
            MetricsCollector::collect(&session, &FallbackConfig::default(), at(t0, 14_050));

        assert!(metrics.fallback_triggered);
        assert_eq!(metrics.fallback_reason, Some(FallbackReason::Timeout));
        assert_eq!(metrics.final_mode, Some(Pipeline::Ocr));
        assert_eq!(metrics.barcode_attempt_time_ms, 10_000);
        assert_eq!(metrics.mode_transition_time_ms, 50);
        assert_eq!(metrics.ocr_processing_time_ms, 4_000);
        assert_eq!(metrics.total_processing_time_ms, 14_050);
    }

    #[test]
    fn cancelled_session_reports_no_fallback_reason() {
        let t0 = Instant::now();
        let mut session = ScanSession::new(ScanMode::Auto, ScanState::Barcode, t0);
        session.transition_to(ScanState::FallbackTransition, at(t0, 2_000));
        session.transition_to(ScanState::Ocr, at(t0, 2_000));
        session.fallback_reason = Some(FallbackReason::Failure);
        session.transition_to(ScanState::Cancelled, at(t0, 3_000));

        let metrics = MetricsCollector::collect(&session, &FallbackConfig::default(), at(t0, 3_000));

        assert!(!metrics.success);
        assert_eq!(metrics.fallback_reason, None);
        // The log still shows that fallback happened before the abort.
        assert!(metrics.fallback_triggered);
    }

    #[test]
    fn slow_session_rates_poorly() {
        let config = FallbackConfig::default(); // 30s combined budget
        let t0 = Instant::now();
        let mut session = ScanSession::new(ScanMode::Auto, ScanState::Barcode, t0);
        session.transition_to(ScanState::FallbackTransition, at(t0, 10_000));
        session.transition_to(ScanState::Ocr, at(t0, 10_000));
        session.transition_to(ScanState::Failed, at(t0, 35_000));

        let metrics = MetricsCollector::collect(&session, &config, at(t0, 35_000));
        assert_eq!(metrics.performance_rating, PerformanceRating::Poor);

        let mut slower = ScanSession::new(ScanMode::Auto, ScanState::Barcode, t0);
        slower.transition_to(ScanState::Failed, at(t0, 50_000));
        let metrics = MetricsCollector::collect(&slower, &config, at(t0, 50_000));
        assert_eq!(metrics.performance_rating, PerformanceRating::Critical);
    }
}
