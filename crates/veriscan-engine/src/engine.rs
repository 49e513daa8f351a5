// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Async front door for the orchestrator.
//
// Camera frames, decoder callbacks, timers and UI commands all arrive on
// different tasks; this module funnels them through one mpsc queue into a
// single owner task, so the state machine itself never needs a lock. The
// owner task also arms exactly one timer, re-derived from the machine's
// `next_deadline` after every event.

use std::future;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{self, Instant};
use tracing::{debug, info};

use veriscan_core::config::{ConfigUpdate, FallbackConfig};
use veriscan_core::error::{Result, VeriscanError};
use veriscan_core::types::{PipelineResult, RawQualitySample, ScanMode, ScanState, SessionId};

use crate::orchestrator::{ScanEvent, ScanOrchestrator};

/// Progress ticks caused by quality samples alone are coalesced to this
/// interval; transitions and terminal events always go through.
const QUALITY_EMIT_INTERVAL: Duration = Duration::from_millis(125);

const COMMAND_QUEUE_DEPTH: usize = 64;
const EVENT_FANOUT_DEPTH: usize = 64;

enum Command {
    Start {
        mode: ScanMode,
        reply: oneshot::Sender<Result<SessionId>>,
    },
    SubmitResult {
        result: PipelineResult,
    },
    SubmitQuality {
        sample: RawQualitySample,
    },
    ForceFallback {
        reply: oneshot::Sender<Result<()>>,
    },
    Cancel {
        reply: oneshot::Sender<()>,
    },
    Reset {
        reply: oneshot::Sender<Result<()>>,
    },
    UpdateConfig {
        update: ConfigUpdate,
        reply: oneshot::Sender<Result<()>>,
    },
    State {
        reply: oneshot::Sender<ScanState>,
    },
}

/// Cloneable handle to a running scan engine. The engine task exits when
/// every handle has been dropped.
#[derive(Clone)]
pub struct ScanEngine {
    commands: mpsc::Sender<Command>,
    events: broadcast::Sender<ScanEvent>,
}

impl ScanEngine {
    /// Validate the configuration and spawn the owner task.
    pub fn spawn(config: FallbackConfig) -> Result<Self> {
        let orchestrator = ScanOrchestrator::new(config)?;
        let (commands, rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        let (events, _) = broadcast::channel(EVENT_FANOUT_DEPTH);

        let fanout = events.clone();
        tokio::spawn(async move {
            EngineTask::new(orchestrator, rx, fanout).run().await;
        });

        Ok(Self { commands, events })
    }

    /// Subscribe to progress and terminal events. Slow subscribers that
    /// fall `EVENT_FANOUT_DEPTH` behind see a `Lagged` error and resume
    /// from the most recent events.
    pub fn subscribe(&self) -> broadcast::Receiver<ScanEvent> {
        self.events.subscribe()
    }

    pub async fn start(&self, mode: ScanMode) -> Result<SessionId> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Start { mode, reply }).await?;
        response.await.map_err(|_| VeriscanError::EngineClosed)?
    }

    /// Hand a pipeline outcome to the engine. Fire-and-forget: a result
    /// that loses a race with cancellation is silently dropped.
    pub async fn submit_result(&self, result: PipelineResult) -> Result<()> {
        self.send(Command::SubmitResult { result }).await
    }

    pub async fn submit_quality_sample(&self, sample: RawQualitySample) -> Result<()> {
        self.send(Command::SubmitQuality { sample }).await
    }

    pub async fn force_fallback(&self) -> Result<()> {
        let (reply, response) = oneshot::channel();
        self.send(Command::ForceFallback { reply }).await?;
        response.await.map_err(|_| VeriscanError::EngineClosed)?
    }

    /// Cancel the active session. Resolves only after the machine has
    /// reached `Cancelled`, so results submitted afterwards are guaranteed
    /// to be dropped.
    pub async fn cancel(&self) -> Result<()> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Cancel { reply }).await?;
        response.await.map_err(|_| VeriscanError::EngineClosed)
    }

    pub async fn reset(&self) -> Result<()> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Reset { reply }).await?;
        response.await.map_err(|_| VeriscanError::EngineClosed)?
    }

    pub async fn update_config(&self, update: ConfigUpdate) -> Result<()> {
        let (reply, response) = oneshot::channel();
        self.send(Command::UpdateConfig { update, reply }).await?;
        response.await.map_err(|_| VeriscanError::EngineClosed)?
    }

    pub async fn state(&self) -> Result<ScanState> {
        let (reply, response) = oneshot::channel();
        self.send(Command::State { reply }).await?;
        response.await.map_err(|_| VeriscanError::EngineClosed)
    }

    async fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| VeriscanError::EngineClosed)
    }
}

struct EngineTask {
    orchestrator: ScanOrchestrator,
    commands: mpsc::Receiver<Command>,
    events: broadcast::Sender<ScanEvent>,
    /// Last state a progress event was published for, with its send time.
    /// Used to coalesce quality-driven progress ticks.
    last_progress: Option<(ScanState, Instant)>,
}

impl EngineTask {
    fn new(
        orchestrator: ScanOrchestrator,
        commands: mpsc::Receiver<Command>,
        events: broadcast::Sender<ScanEvent>,
    ) -> Self {
        Self {
            orchestrator,
            commands,
            events,
            last_progress: None,
        }
    }

    async fn run(mut self) {
        info!("scan engine task started");
        loop {
            let deadline = self
                .orchestrator
                .next_deadline()
                .map(Instant::from_std);

            tokio::select! {
                biased;

                maybe_cmd = self.commands.recv() => {
                    match maybe_cmd {
                        Some(command) => self.handle(command),
                        None => {
                            debug!("all engine handles dropped — task exiting");
                            break;
                        }
                    }
                }

                _ = async {
                    match deadline {
                        Some(at) => time::sleep_until(at).await,
                        None => future::pending().await,
                    }
                } => {
                    let now = Instant::now();
                    let events = self.orchestrator.poll_deadline(now.into_std());
                    self.publish(events, now, false);
                }
            }
        }
    }

    fn handle(&mut self, command: Command) {
        let now = Instant::now();
        match command {
            Command::Start { mode, reply } => {
                let outcome = self.orchestrator.start(mode, now.into_std());
                let response = match outcome {
                    Ok(events) => {
                        self.publish(events, now, false);
                        // A fresh session always has an id.
                        self.orchestrator
                            .session_id()
                            .ok_or(VeriscanError::NoActiveSession)
                    }
                    Err(e) => Err(e),
                };
                let _ = reply.send(response);
            }
            Command::SubmitResult { result } => {
                let events = self.orchestrator.submit_result(result, now.into_std());
                self.publish(events, now, false);
            }
            Command::SubmitQuality { sample } => {
                let events = self
                    .orchestrator
                    .submit_quality_sample(sample, now.into_std());
                self.publish(events, now, true);
            }
            Command::ForceFallback { reply } => {
                let outcome = self.orchestrator.force_fallback(now.into_std());
                let response = match outcome {
                    Ok(events) => {
                        self.publish(events, now, false);
                        Ok(())
                    }
                    Err(e) => Err(e),
                };
                let _ = reply.send(response);
            }
            Command::Cancel { reply } => {
                let events = self.orchestrator.cancel(now.into_std());
                self.publish(events, now, false);
                let _ = reply.send(());
            }
            Command::Reset { reply } => {
                let _ = reply.send(self.orchestrator.reset());
            }
            Command::UpdateConfig { update, reply } => {
                let _ = reply.send(self.orchestrator.update_config(update));
            }
            Command::State { reply } => {
                let _ = reply.send(self.orchestrator.state());
            }
        }
    }

    /// Broadcast a batch of events. With `coalesce` set, progress ticks
    /// that repeat the already-published state inside the emit interval
    /// are dropped; state changes and terminal reports always go out.
    fn publish(&mut self, events: Vec<ScanEvent>, now: Instant, coalesce: bool) {
        for event in events {
            if let ScanEvent::Progress(progress) = &event {
                let repeat = self
                    .last_progress
                    .is_some_and(|(state, at)| {
                        state == progress.state && now.duration_since(at) < QUALITY_EMIT_INTERVAL
                    });
                if coalesce && repeat {
                    continue;
                }
                self.last_progress = Some((progress.state, now));
            }
            if self.events.send(event).is_err() {
                // No subscribers right now; events are best-effort.
                debug!("scan event dropped — no active subscribers");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use veriscan_core::error::ScanErrorCode;
    use veriscan_core::types::{FallbackReason, Pipeline};

    fn barcode_hit(confidence: f64) -> PipelineResult {
        PipelineResult::ok(Pipeline::Barcode, confidence, json!({ "last_name": "DOE" }))
    }

    fn ocr_hit(confidence: f64) -> PipelineResult {
        PipelineResult::ok(Pipeline::Ocr, confidence, json!({ "last_name": "DOE" }))
    }

    fn poor_sample() -> RawQualitySample {
        RawQualitySample {
            blur: 0.9,
            brightness: 0.6,
            uniformity: 0.9,
            alignment: 0.85,
            document_detected: true,
        }
    }

    /// Drain the subscription until a terminal report arrives.
    async fn next_terminal(
        rx: &mut broadcast::Receiver<ScanEvent>,
    ) -> veriscan_core::types::ScanReport {
        loop {
            match rx.recv().await.expect("event stream open") {
                ScanEvent::Terminal(report) => return report,
                ScanEvent::Progress(_) => {}
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn barcode_timeout_drives_fallback_then_failure() {
        let engine = ScanEngine::spawn(FallbackConfig::default()).expect("spawn");
        let mut rx = engine.subscribe();
        engine.start(ScanMode::Auto).await.expect("start");

        // No results at all: the barcode window (10s) expires, then the
        // OCR window (15s) expires. The paused clock auto-advances through
        // the engine's armed timers.
        let report = next_terminal(&mut rx).await;
        assert!(!report.metrics.success);
        assert!(report.metrics.fallback_triggered);
        assert_eq!(report.metrics.fallback_reason, Some(FallbackReason::Timeout));
        assert_eq!(report.metrics.final_mode, Some(Pipeline::Ocr));

        assert_eq!(engine.state().await.expect("state"), ScanState::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn successful_scan_reports_once() {
        let engine = ScanEngine::spawn(FallbackConfig::default()).expect("spawn");
        let mut rx = engine.subscribe();
        engine.start(ScanMode::Auto).await.expect("start");

        engine.submit_result(barcode_hit(0.95)).await.expect("send");
        let report = next_terminal(&mut rx).await;
        assert!(report.metrics.success);
        assert_eq!(report.metrics.final_mode, Some(Pipeline::Barcode));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_is_synchronous_with_later_results() {
        let engine = ScanEngine::spawn(FallbackConfig::default()).expect("spawn");
        let mut rx = engine.subscribe();
        engine.start(ScanMode::Auto).await.expect("start");

        engine.cancel().await.expect("cancel");
        assert_eq!(engine.state().await.expect("state"), ScanState::Cancelled);

        // Queued behind the cancel, so guaranteed to be dropped.
        engine.submit_result(barcode_hit(0.99)).await.expect("send");

        let report = next_terminal(&mut rx).await;
        assert!(!report.metrics.success);
        match &report.outcome {
            Err(error) => assert_eq!(error.code, ScanErrorCode::Cancelled),
            Ok(_) => panic!("expected cancelled outcome"),
        }
        // The high-confidence result after cancel produced nothing.
        assert_eq!(engine.state().await.expect("state"), ScanState::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn double_start_is_rejected() {
        let engine = ScanEngine::spawn(FallbackConfig::default()).expect("spawn");
        engine.start(ScanMode::Auto).await.expect("start");
        let err = engine.start(ScanMode::Auto).await.unwrap_err();
        assert!(matches!(err, VeriscanError::SessionActive));
    }

    #[tokio::test(start_paused = true)]
    async fn reset_allows_restart_after_terminal() {
        let engine = ScanEngine::spawn(FallbackConfig::default()).expect("spawn");
        engine.start(ScanMode::Auto).await.expect("start");
        engine.cancel().await.expect("cancel");

        engine.reset().await.expect("reset");
        assert_eq!(engine.state().await.expect("state"), ScanState::Idle);
        engine.start(ScanMode::Barcode).await.expect("restart");
    }

    #[tokio::test(start_paused = true)]
    async fn quality_progress_is_coalesced() {
        let engine = ScanEngine::spawn(FallbackConfig::default()).expect("spawn");
        let mut rx = engine.subscribe();
        engine.start(ScanMode::Auto).await.expect("start");
        // Consume the start snapshot.
        assert!(matches!(
            rx.recv().await.expect("event"),
            ScanEvent::Progress(_)
        ));

        // Three samples inside one emit interval: only the first may pass,
        // and it is itself coalesced against the start snapshot.
        for _ in 0..3 {
            engine
                .submit_quality_sample(poor_sample())
                .await
                .expect("send");
        }
        engine.state().await.expect("state"); // fence: samples processed
        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));

        // After the interval elapses a sample gets through again.
        time::sleep(QUALITY_EMIT_INTERVAL).await;
        engine
            .submit_quality_sample(poor_sample())
            .await
            .expect("send");
        engine.state().await.expect("state");
        assert!(matches!(
            rx.try_recv(),
            Ok(ScanEvent::Progress(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn manual_fallback_switches_to_ocr() {
        let engine = ScanEngine::spawn(FallbackConfig::default()).expect("spawn");
        let mut rx = engine.subscribe();
        engine.start(ScanMode::Auto).await.expect("start");

        engine.force_fallback().await.expect("force");
        assert_eq!(engine.state().await.expect("state"), ScanState::Ocr);

        engine.submit_result(ocr_hit(0.9)).await.expect("send");
        let report = next_terminal(&mut rx).await;
        assert_eq!(report.metrics.fallback_reason, Some(FallbackReason::Manual));
    }

    #[tokio::test(start_paused = true)]
    async fn sustained_poor_quality_switches_via_engine() {
        let engine = ScanEngine::spawn(FallbackConfig::default()).expect("spawn");
        engine.start(ScanMode::Auto).await.expect("start");

        let threshold = FallbackConfig::default().quality_auto_switch_threshold;
        for _ in 0..threshold {
            engine
                .submit_quality_sample(poor_sample())
                .await
                .expect("send");
        }
        assert_eq!(engine.state().await.expect("state"), ScanState::Ocr);
    }
}
