// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Veriscan Engine — the scan orchestration state machine, frame quality
// gate, and the async engine that serializes commands, timers, and pipeline
// results onto a single owner task.

pub mod engine;
pub mod metrics;
pub mod orchestrator;
pub mod progress;
pub mod quality;
pub mod session;

pub use engine::ScanEngine;
pub use orchestrator::{ScanEvent, ScanOrchestrator};
pub use quality::{QualityGate, QualityThresholds};
pub use session::ScanSession;
