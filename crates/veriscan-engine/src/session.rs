// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-session bookkeeping: attempt trackers, the transition log, and the
// `ScanSession` the orchestrator exclusively owns.

use std::time::Instant;

use veriscan_core::error::ScanError;
use veriscan_core::types::{
    FallbackReason, LicenseData, QualityMetrics, ScanMode, ScanState, SessionId,
};

/// Bookkeeping for one pipeline's extraction attempts.
///
/// Mutated only by the orchestrator while the owning pipeline is active.
#[derive(Debug, Clone, Copy, Default)]
pub struct AttemptTracker {
    pub attempts: u32,
    pub first_attempt_at: Option<Instant>,
    pub last_attempt_at: Option<Instant>,
}

impl AttemptTracker {
    pub fn record_attempt(&mut self, now: Instant) {
        self.attempts += 1;
        self.first_attempt_at.get_or_insert(now);
        self.last_attempt_at = Some(now);
    }

    /// Milliseconds between the first attempt and `now`; zero before any
    /// attempt has been recorded.
    pub fn elapsed_ms(&self, now: Instant) -> u64 {
        self.first_attempt_at
            .map(|first| now.saturating_duration_since(first).as_millis() as u64)
            .unwrap_or(0)
    }
}

/// One interval of the session's life in a given state.
#[derive(Debug, Clone, Copy)]
pub struct TransitionRecord {
    pub state: ScanState,
    pub entered_at: Instant,
    /// `None` while the state is still active.
    pub exited_at: Option<Instant>,
}

impl TransitionRecord {
    /// Duration of the interval in milliseconds; measured to `now` while
    /// still open.
    pub fn duration_ms(&self, now: Instant) -> u64 {
        let end = self.exited_at.unwrap_or(now);
        end.saturating_duration_since(self.entered_at).as_millis() as u64
    }
}

/// The unit of work for one user-initiated scan.
///
/// Created by `start`, owned exclusively by the orchestrator, discarded by
/// `reset`. No two sessions are ever concurrently active.
#[derive(Debug, Clone)]
pub struct ScanSession {
    pub id: SessionId,
    pub requested_mode: ScanMode,
    pub state: ScanState,
    pub started_at: Instant,
    pub barcode_tracker: AttemptTracker,
    pub ocr_tracker: AttemptTracker,
    /// Set when the orchestrator decides to fall back. The fallback ceiling
    /// timer is measured from this instant, across OCR retries.
    pub fallback_began_at: Option<Instant>,
    /// Set on entry into the OCR state (fallback or explicit OCR mode).
    pub ocr_entered_at: Option<Instant>,
    pub fallback_reason: Option<FallbackReason>,
    /// Consecutive poor overall quality classifications. Reset by any
    /// non-poor sample.
    pub poor_quality_streak: u32,
    /// Latest classified frame, kept only for progress messaging.
    pub last_quality: Option<QualityMetrics>,
    pub last_error: Option<ScanError>,
    /// Closed and open intervals, in order. Consumed by the metrics
    /// collector at termination.
    pub log: Vec<TransitionRecord>,
    pub result: Option<LicenseData>,
}

impl ScanSession {
    /// Begin a session directly in its first pipeline state.
    pub fn new(requested_mode: ScanMode, initial_state: ScanState, now: Instant) -> Self {
        Self {
            id: SessionId::new(),
            requested_mode,
            state: initial_state,
            started_at: now,
            barcode_tracker: AttemptTracker::default(),
            ocr_tracker: AttemptTracker::default(),
            fallback_began_at: None,
            ocr_entered_at: None,
            fallback_reason: None,
            poor_quality_streak: 0,
            last_quality: None,
            last_error: None,
            log: vec![TransitionRecord {
                state: initial_state,
                entered_at: now,
                exited_at: None,
            }],
            result: None,
        }
    }

    /// Close the current log interval and open one for `state`.
    pub fn transition_to(&mut self, state: ScanState, now: Instant) {
        if let Some(open) = self.log.last_mut() {
            open.exited_at = Some(now);
        }
        self.state = state;
        self.log.push(TransitionRecord {
            state,
            entered_at: now,
            exited_at: None,
        });
    }

    /// Total session age in milliseconds.
    pub fn elapsed_ms(&self, now: Instant) -> u64 {
        now.saturating_duration_since(self.started_at).as_millis() as u64
    }

    /// Milliseconds since OCR entry; zero if OCR never started.
    pub fn ocr_elapsed_ms(&self, now: Instant) -> u64 {
        self.ocr_entered_at
            .map(|at| now.saturating_duration_since(at).as_millis() as u64)
            .unwrap_or(0)
    }

    /// Milliseconds since the fallback decision; zero if none was made.
    pub fn fallback_elapsed_ms(&self, now: Instant) -> u64 {
        self.fallback_began_at
            .map(|at| now.saturating_duration_since(at).as_millis() as u64)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn tracker_records_first_and_last() {
        let t0 = Instant::now();
        let t1 = t0 + Duration::from_millis(500);
        let t2 = t0 + Duration::from_millis(900);

        let mut tracker = AttemptTracker::default();
        assert_eq!(tracker.elapsed_ms(t0), 0);

        tracker.record_attempt(t1);
        tracker.record_attempt(t2);

        assert_eq!(tracker.attempts, 2);
        assert_eq!(tracker.first_attempt_at, Some(t1));
        assert_eq!(tracker.last_attempt_at, Some(t2));
        assert_eq!(tracker.elapsed_ms(t2), 400);
    }

    #[test]
    fn transition_closes_previous_interval() {
        let t0 = Instant::now();
        let t1 = t0 + Duration::from_millis(1200);

        let mut session = ScanSession::new(ScanMode::Auto, ScanState::Barcode, t0);
        session.transition_to(ScanState::FallbackTransition, t1);

        assert_eq!(session.log.len(), 2);
        assert_eq!(session.log[0].state, ScanState::Barcode);
        assert_eq!(session.log[0].exited_at, Some(t1));
        assert_eq!(session.log[0].duration_ms(t1), 1200);
        assert_eq!(session.log[1].state, ScanState::FallbackTransition);
        assert!(session.log[1].exited_at.is_none());
    }

    #[test]
    fn elapsed_helpers_default_to_zero() {
        let t0 = Instant::now();
        let session = ScanSession::new(ScanMode::Ocr, ScanState::Ocr, t0);
        let later = t0 + Duration::from_secs(3);

        assert_eq!(session.elapsed_ms(later), 3000);
        assert_eq!(session.ocr_elapsed_ms(later), 0);
        assert_eq!(session.fallback_elapsed_ms(later), 0);
    }
}
