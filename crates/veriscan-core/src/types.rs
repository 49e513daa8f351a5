// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Veriscan scan orchestration engine.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ScanError;

/// Unique identifier for a scan session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Caller-selectable extraction strategy.
///
/// `Auto` lets the orchestrator start with barcode and fall back to OCR;
/// the explicit modes pin a single pipeline for the whole session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanMode {
    #[default]
    Auto,
    Barcode,
    Ocr,
}

/// One of the two concrete extraction pipelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Pipeline {
    Barcode,
    Ocr,
}

/// Lifecycle states of a scan session. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanState {
    /// No session running — waiting for `start`.
    Idle,
    /// Barcode pipeline active, consuming decode results.
    Barcode,
    /// OCR pipeline active, consuming recognition results.
    Ocr,
    /// Crossing from barcode to OCR. Entered only from `Barcode`; exits
    /// only into `Ocr` (or `Cancelled`), never into `Completed`.
    FallbackTransition,
    /// Terminal: structured license data was produced.
    Completed,
    /// Terminal: the session ended without usable data.
    Failed,
    /// Terminal: the user cancelled.
    Cancelled,
}

impl ScanState {
    /// Terminal states admit no further session mutation.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// States in which a pipeline is actively consuming results.
    pub fn active_pipeline(self) -> Option<Pipeline> {
        match self {
            Self::Barcode => Some(Pipeline::Barcode),
            Self::Ocr => Some(Pipeline::Ocr),
            _ => None,
        }
    }
}

/// Why the session switched from barcode to OCR.
///
/// Variant order is the deterministic reporting priority: when several
/// triggers are satisfied in the same evaluation tick, the smallest
/// variant wins (`Timeout` outranks `Quality` outranks `Failure`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FallbackReason {
    /// The barcode timeout elapsed.
    Timeout,
    /// Sustained poor frame quality made barcode decoding hopeless.
    Quality,
    /// The attempt budget was exhausted by decode failures.
    Failure,
    /// The caller forced the switch.
    Manual,
}

/// Discretized end-to-end latency verdict for a finished session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PerformanceRating {
    Excellent,
    Good,
    Acceptable,
    Poor,
    Critical,
}

impl PerformanceRating {
    /// Rate total processing time against the configured budget.
    ///
    /// `ratio` = total time / combined timeout budget.
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio <= 0.5 {
            Self::Excellent
        } else if ratio <= 0.75 {
            Self::Good
        } else if ratio <= 1.0 {
            Self::Acceptable
        } else if ratio <= 1.5 {
            Self::Poor
        } else {
            Self::Critical
        }
    }
}

/// Structured license data produced by the (opaque) AAMVA field parser.
///
/// The engine never inspects the fields; it only records which pipeline
/// produced them and hands the value through to the UI layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LicenseData {
    /// Which pipeline extracted the raw payload.
    pub source: Pipeline,
    /// Parsed named fields, keyed per the host app's parser.
    pub fields: serde_json::Value,
}

/// Outcome of one extraction attempt, delivered by the vision layer.
///
/// This is the only way pipeline outcomes enter the state machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub pipeline: Pipeline,
    pub success: bool,
    /// Pipeline-reported trust in the extraction, 0.0–1.0.
    pub confidence: Option<f64>,
    pub data: Option<LicenseData>,
    pub error: Option<ScanError>,
}

impl PipelineResult {
    pub fn ok(pipeline: Pipeline, confidence: f64, fields: serde_json::Value) -> Self {
        Self {
            pipeline,
            success: true,
            confidence: Some(confidence),
            data: Some(LicenseData {
                source: pipeline,
                fields,
            }),
            error: None,
        }
    }

    pub fn failed(pipeline: Pipeline, error: ScanError) -> Self {
        Self {
            pipeline,
            success: false,
            confidence: None,
            data: None,
            error: Some(error),
        }
    }
}

// ---------------------------------------------------------------------------
// Frame quality
// ---------------------------------------------------------------------------

/// Raw per-frame signals from the camera layer, all normalized to 0.0–1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawQualitySample {
    /// Blur measure — lower is sharper.
    pub blur: f64,
    pub brightness: f64,
    /// Illumination uniformity — higher is more even.
    pub uniformity: f64,
    /// How well the document fills the guide frame.
    pub alignment: f64,
    pub document_detected: bool,
}

/// Per-aspect classification of a quality signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QualityStatus {
    Good,
    Warning,
    Poor,
}

/// Estimated document distance, derived from alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistanceStatus {
    TooFar,
    Ideal,
    TooClose,
    /// No document detected, so distance is meaningless.
    Unknown,
}

/// Classified sharpness for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlurQuality {
    pub value: f64,
    pub status: QualityStatus,
}

/// Classified illumination for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LightingQuality {
    pub brightness: f64,
    pub uniformity: f64,
    pub status: QualityStatus,
}

/// Classified document placement for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositioningQuality {
    pub document_detected: bool,
    pub alignment: f64,
    pub distance: DistanceStatus,
    pub status: QualityStatus,
}

/// Combined readiness verdict for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverallQuality {
    /// Weighted 0.0–1.0 score across all aspects.
    pub score: f64,
    pub status: QualityStatus,
    pub ready_to_scan: bool,
}

/// Full classified snapshot for one frame. Consumed, never retained —
/// the orchestrator keeps only the streak counter it needs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub blur: BlurQuality,
    pub lighting: LightingQuality,
    pub positioning: PositioningQuality,
    pub overall: OverallQuality,
}

// ---------------------------------------------------------------------------
// UI-facing snapshots
// ---------------------------------------------------------------------------

/// Progress snapshot recomputed on every transition and throttled quality
/// tick. Never stored as history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanProgress {
    pub state: ScanState,
    pub mode: ScanMode,
    pub time_elapsed_ms: u64,
    pub barcode_attempts: u32,
    /// Short status line for the viewfinder overlay.
    pub message: String,
    /// Elapsed/timeout ratio for the active pipeline, clamped to [0, 100).
    pub progress_percentage: f64,
    pub show_cancel_button: bool,
    pub is_transitioning: bool,
    pub estimated_time_remaining_ms: u64,
    /// Longer text for screen readers, announced on state changes.
    pub accessibility_announcement: String,
}

/// Final summary built exactly once, at session termination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanMetrics {
    pub total_processing_time_ms: u64,
    pub barcode_attempt_time_ms: u64,
    pub ocr_processing_time_ms: u64,
    pub mode_transition_time_ms: u64,
    pub barcode_attempts: u32,
    pub ocr_attempts: u32,
    pub fallback_triggered: bool,
    pub fallback_reason: Option<FallbackReason>,
    /// Pipeline that was active when the session ended.
    pub final_mode: Option<Pipeline>,
    pub success: bool,
    pub performance_rating: PerformanceRating,
}

/// Everything the UI receives at the terminal transition, exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    pub session_id: SessionId,
    pub metrics: ScanMetrics,
    pub outcome: std::result::Result<LicenseData, ScanError>,
}
