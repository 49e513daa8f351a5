// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The scan orchestration state machine.
//
// Owns the single active `ScanSession` and decides every transition:
// retries, fallback from barcode to OCR, timeouts, quality-driven switches,
// cancellation. Every mutating call is stamped with the event's arrival
// `Instant` so evaluation is deterministic and testable without a clock.
//
// The machine itself is synchronous; serialization of concurrent callers
// and timer firing live in `engine.rs`.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use veriscan_core::config::{ConfigUpdate, FallbackConfig};
use veriscan_core::error::{Result, ScanError, ScanErrorCode, VeriscanError};
use veriscan_core::types::{
    FallbackReason, LicenseData, Pipeline, PipelineResult, QualityStatus, RawQualitySample,
    ScanMode, ScanProgress, ScanReport, ScanState, SessionId,
};

use crate::metrics::MetricsCollector;
use crate::progress::ProgressReporter;
use crate::quality::QualityGate;
use crate::session::ScanSession;

/// Everything the orchestrator publishes to the outside world.
#[derive(Debug, Clone)]
pub enum ScanEvent {
    /// UI snapshot, emitted on every transition and quality tick.
    Progress(ScanProgress),
    /// Final report, emitted exactly once per session.
    Terminal(ScanReport),
}

/// Internal verdict for one pipeline result, computed before any state is
/// touched so the transition logic stays in one place.
enum Verdict {
    Accept(LicenseData),
    /// Recoverable failure to absorb (retry or fall back per budgets).
    Retry(Option<ScanError>),
    Fallback(FallbackReason),
    Fail(ScanError),
}

/// The core state machine. One instance supervises at most one session.
pub struct ScanOrchestrator {
    config: FallbackConfig,
    gate: QualityGate,
    session: Option<ScanSession>,
}

impl ScanOrchestrator {
    pub fn new(config: FallbackConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            gate: QualityGate::default(),
            session: None,
        })
    }

    pub fn with_gate(config: FallbackConfig, gate: QualityGate) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            gate,
            session: None,
        })
    }

    /// Current state; `Idle` when no session exists.
    pub fn state(&self) -> ScanState {
        self.session
            .as_ref()
            .map(|s| s.state)
            .unwrap_or(ScanState::Idle)
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.session.as_ref().map(|s| s.id)
    }

    pub fn config(&self) -> &FallbackConfig {
        &self.config
    }

    /// Replace configuration between sessions. Rejected while a session is
    /// live so a running state machine never changes policy mid-flight.
    pub fn update_config(&mut self, update: ConfigUpdate) -> Result<()> {
        if !self.state().is_terminal() && self.state() != ScanState::Idle {
            return Err(VeriscanError::SessionActive);
        }
        self.config = self.config.apply(update)?;
        info!(config = ?self.config, "fallback config updated");
        Ok(())
    }

    /// Begin a new session. Fails fast if one is already active; a prior
    /// terminal session is discarded.
    pub fn start(&mut self, mode: ScanMode, now: Instant) -> Result<Vec<ScanEvent>> {
        if let Some(session) = &self.session {
            if !session.state.is_terminal() {
                return Err(VeriscanError::SessionActive);
            }
        }

        let initial = match mode {
            ScanMode::Auto | ScanMode::Barcode => ScanState::Barcode,
            ScanMode::Ocr => ScanState::Ocr,
        };
        let mut session = ScanSession::new(mode, initial, now);
        if initial == ScanState::Ocr {
            session.ocr_entered_at = Some(now);
        }
        info!(session_id = %session.id, ?mode, ?initial, "scan session started");
        self.session = Some(session);

        Ok(self.progress(now))
    }

    /// Feed one pipeline outcome into the machine — the only way extraction
    /// results enter. Late or mismatched results are dropped, not acted on.
    pub fn submit_result(&mut self, result: PipelineResult, now: Instant) -> Vec<ScanEvent> {
        let Some(session) = self.session.as_mut() else {
            debug!("result received with no session — dropped");
            return Vec::new();
        };
        if session.state.is_terminal() {
            debug!(session_id = %session.id, "result received after terminal state — dropped");
            return Vec::new();
        }
        let Some(active) = session.state.active_pipeline() else {
            debug!(state = ?session.state, "result received outside a pipeline state — dropped");
            return Vec::new();
        };
        if result.pipeline != active {
            warn!(
                expected = ?active,
                got = ?result.pipeline,
                "stale result from inactive pipeline — dropped"
            );
            return Vec::new();
        }

        let threshold = self.config.confidence_threshold;
        let verdict = match active {
            Pipeline::Barcode => {
                session.barcode_tracker.record_attempt(now);
                let v = evaluate_result(result, threshold, ScanErrorCode::DecodeFailed);
                self.judge_barcode(v, now)
            }
            Pipeline::Ocr => {
                session.ocr_tracker.record_attempt(now);
                let v = evaluate_result(result, threshold, ScanErrorCode::NoTextFound);
                self.judge_ocr(v, now)
            }
        };

        self.apply_verdict(verdict, now)
    }

    /// Feed one classified-quality tick. Only the `Barcode` state may
    /// transition on quality alone; elsewhere the sample just refreshes the
    /// progress snapshot.
    pub fn submit_quality_sample(&mut self, sample: RawQualitySample, now: Instant) -> Vec<ScanEvent> {
        let Some(session) = self.session.as_mut() else {
            return Vec::new();
        };
        if session.state.is_terminal() {
            debug!(session_id = %session.id, "quality sample after terminal state — dropped");
            return Vec::new();
        }

        let metrics = self.gate.classify(sample);
        match session.state {
            ScanState::Barcode => {
                if metrics.overall.status == QualityStatus::Poor {
                    session.poor_quality_streak += 1;
                } else {
                    session.poor_quality_streak = 0;
                }
                session.last_quality = Some(metrics);

                // A due timeout outranks the quality trigger when both are
                // satisfied on the same tick.
                let elapsed = session.elapsed_ms(now);
                let streak = session.poor_quality_streak;
                if elapsed >= self.config.barcode_timeout_ms {
                    self.apply_verdict(Verdict::Fallback(FallbackReason::Timeout), now)
                } else if streak >= self.config.quality_auto_switch_threshold {
                    debug!(streak, "sustained poor quality — switching pipelines");
                    self.apply_verdict(Verdict::Fallback(FallbackReason::Quality), now)
                } else {
                    self.progress(now)
                }
            }
            ScanState::Ocr => {
                session.last_quality = Some(metrics);
                self.progress(now)
            }
            _ => Vec::new(),
        }
    }

    /// Caller-forced switch to OCR (reported as `FallbackReason::Manual`).
    pub fn force_fallback(&mut self, now: Instant) -> Result<Vec<ScanEvent>> {
        let Some(session) = self.session.as_ref() else {
            return Err(VeriscanError::NoActiveSession);
        };
        if session.state != ScanState::Barcode {
            return Err(VeriscanError::NoActiveSession);
        }
        if session.requested_mode == ScanMode::Barcode || !self.config.enable_fallback {
            return Err(VeriscanError::InvalidConfig(
                "fallback is disabled for this session".into(),
            ));
        }
        Ok(self.begin_fallback(FallbackReason::Manual, now))
    }

    /// A timer fired (or might have). Evaluates every armed deadline
    /// against `now` and transitions if one is due.
    pub fn poll_deadline(&mut self, now: Instant) -> Vec<ScanEvent> {
        let Some(session) = self.session.as_ref() else {
            return Vec::new();
        };
        match session.state {
            ScanState::Barcode => {
                if session.elapsed_ms(now) >= self.config.barcode_timeout_ms {
                    self.apply_verdict(Verdict::Fallback(FallbackReason::Timeout), now)
                } else {
                    Vec::new()
                }
            }
            ScanState::Ocr => {
                let ocr_due = session.ocr_elapsed_ms(now) >= self.config.ocr_timeout_ms;
                let ceiling_due = session.fallback_began_at.is_some()
                    && session.fallback_elapsed_ms(now)
                        >= self.config.max_fallback_processing_time_ms;
                if ocr_due || ceiling_due {
                    let error = session
                        .last_error
                        .clone()
                        .unwrap_or_else(ScanError::timed_out);
                    self.apply_verdict(Verdict::Fail(error), now)
                } else {
                    Vec::new()
                }
            }
            _ => Vec::new(),
        }
    }

    /// When the next timer should fire, if any is armed.
    pub fn next_deadline(&self) -> Option<Instant> {
        let session = self.session.as_ref()?;
        match session.state {
            ScanState::Barcode => {
                Some(session.started_at + Duration::from_millis(self.config.barcode_timeout_ms))
            }
            ScanState::Ocr => {
                let ocr_deadline = session
                    .ocr_entered_at
                    .map(|at| at + Duration::from_millis(self.config.ocr_timeout_ms));
                let ceiling = session.fallback_began_at.map(|at| {
                    at + Duration::from_millis(self.config.max_fallback_processing_time_ms)
                });
                match (ocr_deadline, ceiling) {
                    (Some(a), Some(b)) => Some(a.min(b)),
                    (a, b) => a.or(b),
                }
            }
            _ => None,
        }
    }

    /// Abort the session. Effective immediately; a second call (or a call
    /// with nothing to cancel) is a no-op with no duplicate terminal event.
    pub fn cancel(&mut self, now: Instant) -> Vec<ScanEvent> {
        let Some(session) = self.session.as_mut() else {
            debug!("cancel with no session — no-op");
            return Vec::new();
        };
        if session.state.is_terminal() {
            debug!(session_id = %session.id, "cancel after terminal state — no-op");
            return Vec::new();
        }

        info!(session_id = %session.id, state = ?session.state, "scan cancelled");
        session.transition_to(ScanState::Cancelled, now);
        let error = ScanError::new(ScanErrorCode::Cancelled, "scan cancelled by caller");
        session.last_error = Some(error.clone());
        self.terminal_events(Err(error), now)
    }

    /// Discard a terminal session and return to `Idle`. Illegal while a
    /// session is still running.
    pub fn reset(&mut self) -> Result<()> {
        match &self.session {
            None => Ok(()),
            Some(session) if session.state.is_terminal() => {
                debug!(session_id = %session.id, "session reset");
                self.session = None;
                Ok(())
            }
            Some(_) => Err(VeriscanError::SessionNotTerminal),
        }
    }

    // -- transition helpers -------------------------------------------------

    /// Decide what a barcode verdict means under the retry/fallback policy.
    fn judge_barcode(&mut self, verdict: Verdict, now: Instant) -> Verdict {
        let Some(session) = self.session.as_mut() else {
            return verdict;
        };
        match verdict {
            Verdict::Retry(error) => {
                if let Some(error) = error {
                    session.last_error = Some(error);
                }
                // Budgets are evaluated after the attempt is recorded; a
                // simultaneously exceeded timeout and attempt cap reports
                // `Timeout` (the higher-priority reason).
                let timed_out = session.elapsed_ms(now) >= self.config.barcode_timeout_ms;
                let exhausted =
                    session.barcode_tracker.attempts >= self.config.max_barcode_attempts;
                if timed_out {
                    Verdict::Fallback(FallbackReason::Timeout)
                } else if exhausted {
                    Verdict::Fallback(FallbackReason::Failure)
                } else {
                    Verdict::Retry(None)
                }
            }
            other => other,
        }
    }

    /// Decide what an OCR verdict means under the OCR/fallback budgets.
    /// OCR has nowhere left to fall back to, so exhaustion is terminal.
    fn judge_ocr(&mut self, verdict: Verdict, now: Instant) -> Verdict {
        let Some(session) = self.session.as_mut() else {
            return verdict;
        };
        match verdict {
            Verdict::Retry(error) => {
                if let Some(error) = error {
                    session.last_error = Some(error);
                }
                let ocr_due = session.ocr_elapsed_ms(now) >= self.config.ocr_timeout_ms;
                let ceiling_due = session.fallback_began_at.is_some()
                    && session.fallback_elapsed_ms(now)
                        >= self.config.max_fallback_processing_time_ms;
                if ocr_due || ceiling_due {
                    let error = session
                        .last_error
                        .clone()
                        .unwrap_or_else(ScanError::timed_out);
                    Verdict::Fail(error)
                } else {
                    Verdict::Retry(None)
                }
            }
            other => other,
        }
    }

    fn apply_verdict(&mut self, verdict: Verdict, now: Instant) -> Vec<ScanEvent> {
        match verdict {
            Verdict::Accept(data) => self.complete(data, now),
            Verdict::Retry(_) => self.progress(now),
            Verdict::Fallback(reason) => self.fallback_or_fail(reason, now),
            Verdict::Fail(error) => self.fail(error, now),
        }
    }

    /// Fallback is only available in `Auto`/`Ocr`-capable sessions with the
    /// toggle on; otherwise the same trigger is terminal.
    fn fallback_or_fail(&mut self, reason: FallbackReason, now: Instant) -> Vec<ScanEvent> {
        let Some(session) = self.session.as_ref() else {
            return Vec::new();
        };
        let barcode_only = session.requested_mode == ScanMode::Barcode;
        if barcode_only || !self.config.enable_fallback {
            let error = session
                .last_error
                .clone()
                .unwrap_or_else(ScanError::timed_out);
            return self.fail(error, now);
        }
        self.begin_fallback(reason, now)
    }

    /// Cross `FallbackTransition` into `Ocr` within this evaluation. The
    /// transition interval is logged even though the machine never idles in
    /// it between events.
    fn begin_fallback(&mut self, reason: FallbackReason, now: Instant) -> Vec<ScanEvent> {
        let Some(session) = self.session.as_mut() else {
            return Vec::new();
        };
        info!(session_id = %session.id, ?reason, "falling back from barcode to OCR");

        session.transition_to(ScanState::FallbackTransition, now);
        session.fallback_began_at.get_or_insert(now);
        if session.fallback_reason.is_none() {
            session.fallback_reason = Some(reason);
        }
        session.poor_quality_streak = 0;

        let mut events = self.progress(now);

        if let Some(session) = self.session.as_mut() {
            session.transition_to(ScanState::Ocr, now);
            session.ocr_entered_at = Some(now);
        }
        events.extend(self.progress(now));
        events
    }

    fn complete(&mut self, data: LicenseData, now: Instant) -> Vec<ScanEvent> {
        let Some(session) = self.session.as_mut() else {
            return Vec::new();
        };
        info!(session_id = %session.id, source = ?data.source, "scan completed");
        session.result = Some(data.clone());
        session.transition_to(ScanState::Completed, now);
        self.terminal_events(Ok(data), now)
    }

    fn fail(&mut self, error: ScanError, now: Instant) -> Vec<ScanEvent> {
        let Some(session) = self.session.as_mut() else {
            return Vec::new();
        };
        warn!(session_id = %session.id, code = ?error.code, "scan failed: {}", error.message);
        session.last_error = Some(error.clone());
        session.transition_to(ScanState::Failed, now);
        self.terminal_events(Err(error), now)
    }

    /// Final progress snapshot plus the one-and-only terminal report.
    fn terminal_events(
        &mut self,
        outcome: std::result::Result<LicenseData, ScanError>,
        now: Instant,
    ) -> Vec<ScanEvent> {
        let mut events = self.progress(now);
        if let Some(session) = self.session.as_ref() {
            let metrics = MetricsCollector::collect(session, &self.config, now);
            events.push(ScanEvent::Terminal(ScanReport {
                session_id: session.id,
                metrics,
                outcome,
            }));
        }
        events
    }

    fn progress(&self, now: Instant) -> Vec<ScanEvent> {
        match self.session.as_ref() {
            Some(session) => vec![ScanEvent::Progress(ProgressReporter::snapshot(
                session,
                &self.config,
                now,
            ))],
            None => Vec::new(),
        }
    }
}

/// First-pass evaluation of a raw pipeline result against the confidence
/// threshold, before retry budgets are considered.
fn evaluate_result(
    result: PipelineResult,
    threshold: f64,
    default_code: ScanErrorCode,
) -> Verdict {
    if result.success && result.confidence.unwrap_or(0.0) >= threshold {
        if let Some(data) = result.data {
            return Verdict::Accept(data);
        }
        // A "successful" result with no payload cannot be accepted.
        return Verdict::Retry(Some(ScanError::new(
            default_code,
            "pipeline reported success without data",
        )));
    }

    let error = result.error.unwrap_or_else(|| {
        if result.success {
            ScanError::new(
                ScanErrorCode::LowConfidence,
                format!(
                    "confidence {:?} below threshold {threshold}",
                    result.confidence
                ),
            )
        } else {
            ScanError::new(default_code, "pipeline reported failure without detail")
        }
    });

    if error.recoverable {
        Verdict::Retry(Some(error))
    } else {
        Verdict::Fail(error)
    }
}
