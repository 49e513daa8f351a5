// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Frame-quality gate: pure classification of raw camera signals.
//
// Each call is stateless. Sustained-poor-quality tracking (the consecutive
// counter that triggers early fallback) belongs to the orchestrator, not
// here.

use veriscan_core::types::{
    BlurQuality, DistanceStatus, LightingQuality, OverallQuality, PositioningQuality,
    QualityMetrics, QualityStatus, RawQualitySample,
};

/// Classification thresholds. These are configuration, not magic numbers —
/// hosts tuning for a specific camera stack can override any of them.
#[derive(Debug, Clone, PartialEq)]
pub struct QualityThresholds {
    /// Blur above this is a warning (lower blur is sharper).
    pub blur_warning: f64,
    /// Blur above this is poor.
    pub blur_poor: f64,
    /// Brightness below this is poor (too dark).
    pub brightness_min: f64,
    /// Brightness above this is poor (blown out).
    pub brightness_max: f64,
    /// Ideal brightness; the warning band extends this far either side.
    pub brightness_ideal: f64,
    pub brightness_warning_band: f64,
    /// Uniformity below this is poor (harsh shadows/glare).
    pub uniformity_poor: f64,
    pub uniformity_warning: f64,
    /// Alignment below this is poor.
    pub alignment_poor: f64,
    /// Alignment below this is a warning.
    pub alignment_warning: f64,
    /// Alignment above this means the document crowds the frame edges.
    pub alignment_too_close: f64,
    /// Weights for the overall score (blur inverted, brightness closeness,
    /// alignment). Should sum to 1.0.
    pub weight_blur: f64,
    pub weight_brightness: f64,
    pub weight_alignment: f64,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            blur_warning: 0.3,
            blur_poor: 0.6,
            brightness_min: 0.4,
            brightness_max: 0.85,
            brightness_ideal: 0.625,
            brightness_warning_band: 0.15,
            uniformity_poor: 0.35,
            uniformity_warning: 0.6,
            alignment_poor: 0.4,
            alignment_warning: 0.7,
            alignment_too_close: 0.95,
            weight_blur: 0.4,
            weight_brightness: 0.3,
            weight_alignment: 0.3,
        }
    }
}

/// Pure classifier from raw frame signals to per-aspect statuses and an
/// overall readiness verdict.
#[derive(Debug, Clone, Default)]
pub struct QualityGate {
    thresholds: QualityThresholds,
}

impl QualityGate {
    pub fn new(thresholds: QualityThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &QualityThresholds {
        &self.thresholds
    }

    /// Classify one frame. Stateless — the caller owns any history.
    pub fn classify(&self, sample: RawQualitySample) -> QualityMetrics {
        let blur = self.classify_blur(sample.blur);
        let lighting = self.classify_lighting(sample.brightness, sample.uniformity);
        let positioning = self.classify_positioning(sample.alignment, sample.document_detected);

        let score = self.overall_score(&sample);
        let status = worst(&[blur.status, lighting.status, positioning.status]);
        let overall = OverallQuality {
            score,
            status,
            ready_to_scan: status == QualityStatus::Good && sample.document_detected,
        };

        QualityMetrics {
            blur,
            lighting,
            positioning,
            overall,
        }
    }

    fn classify_blur(&self, value: f64) -> BlurQuality {
        let t = &self.thresholds;
        let status = if value > t.blur_poor {
            QualityStatus::Poor
        } else if value > t.blur_warning {
            QualityStatus::Warning
        } else {
            QualityStatus::Good
        };
        BlurQuality { value, status }
    }

    fn classify_lighting(&self, brightness: f64, uniformity: f64) -> LightingQuality {
        let t = &self.thresholds;

        let brightness_status = if brightness < t.brightness_min || brightness > t.brightness_max {
            QualityStatus::Poor
        } else if (brightness - t.brightness_ideal).abs() > t.brightness_warning_band {
            QualityStatus::Warning
        } else {
            QualityStatus::Good
        };

        let uniformity_status = if uniformity < t.uniformity_poor {
            QualityStatus::Poor
        } else if uniformity < t.uniformity_warning {
            QualityStatus::Warning
        } else {
            QualityStatus::Good
        };

        LightingQuality {
            brightness,
            uniformity,
            status: worst(&[brightness_status, uniformity_status]),
        }
    }

    fn classify_positioning(&self, alignment: f64, document_detected: bool) -> PositioningQuality {
        let t = &self.thresholds;

        if !document_detected {
            return PositioningQuality {
                document_detected,
                alignment,
                distance: DistanceStatus::Unknown,
                status: QualityStatus::Poor,
            };
        }

        let status = if alignment < t.alignment_poor {
            QualityStatus::Poor
        } else if alignment < t.alignment_warning {
            QualityStatus::Warning
        } else {
            QualityStatus::Good
        };

        let distance = if alignment < t.alignment_poor {
            DistanceStatus::TooFar
        } else if alignment > t.alignment_too_close {
            DistanceStatus::TooClose
        } else {
            DistanceStatus::Ideal
        };

        PositioningQuality {
            document_detected,
            alignment,
            distance,
            status,
        }
    }

    /// Weighted average: sharpness (blur inverted), brightness closeness to
    /// ideal, and alignment.
    fn overall_score(&self, sample: &RawQualitySample) -> f64 {
        let t = &self.thresholds;
        let sharpness = (1.0 - sample.blur).clamp(0.0, 1.0);
        let closeness =
            (1.0 - (sample.brightness - t.brightness_ideal).abs() * 2.0).clamp(0.0, 1.0);
        let alignment = sample.alignment.clamp(0.0, 1.0);

        (t.weight_blur * sharpness + t.weight_brightness * closeness + t.weight_alignment * alignment)
            .clamp(0.0, 1.0)
    }
}

/// Worst-of combinator for aspect statuses.
fn worst(statuses: &[QualityStatus]) -> QualityStatus {
    if statuses.contains(&QualityStatus::Poor) {
        QualityStatus::Poor
    } else if statuses.contains(&QualityStatus::Warning) {
        QualityStatus::Warning
    } else {
        QualityStatus::Good
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn good_sample() -> RawQualitySample {
        RawQualitySample {
            blur: 0.1,
            brightness: 0.6,
            uniformity: 0.9,
            alignment: 0.85,
            document_detected: true,
        }
    }

    #[test]
    fn sharp_well_lit_frame_is_ready() {
        let gate = QualityGate::default();
        let metrics = gate.classify(good_sample());

        assert_eq!(metrics.blur.status, QualityStatus::Good);
        assert_eq!(metrics.lighting.status, QualityStatus::Good);
        assert_eq!(metrics.positioning.status, QualityStatus::Good);
        assert_eq!(metrics.overall.status, QualityStatus::Good);
        assert!(metrics.overall.ready_to_scan);
        assert!(metrics.overall.score > 0.8);
    }

    #[test]
    fn blur_thresholds() {
        let gate = QualityGate::default();

        let warn = gate.classify(RawQualitySample {
            blur: 0.4,
            ..good_sample()
        });
        assert_eq!(warn.blur.status, QualityStatus::Warning);

        let poor = gate.classify(RawQualitySample {
            blur: 0.7,
            ..good_sample()
        });
        assert_eq!(poor.blur.status, QualityStatus::Poor);
        assert!(!poor.overall.ready_to_scan);
    }

    #[test]
    fn dark_frame_is_poor() {
        let gate = QualityGate::default();
        let metrics = gate.classify(RawQualitySample {
            brightness: 0.2,
            ..good_sample()
        });
        assert_eq!(metrics.lighting.status, QualityStatus::Poor);
        assert_eq!(metrics.overall.status, QualityStatus::Poor);
    }

    #[test]
    fn blown_out_frame_is_poor() {
        let gate = QualityGate::default();
        let metrics = gate.classify(RawQualitySample {
            brightness: 0.95,
            ..good_sample()
        });
        assert_eq!(metrics.lighting.status, QualityStatus::Poor);
    }

    #[test]
    fn slightly_off_brightness_is_warning() {
        let gate = QualityGate::default();
        let metrics = gate.classify(RawQualitySample {
            brightness: 0.45,
            ..good_sample()
        });
        assert_eq!(metrics.lighting.status, QualityStatus::Warning);
    }

    #[test]
    fn missing_document_never_ready() {
        let gate = QualityGate::default();
        let metrics = gate.classify(RawQualitySample {
            document_detected: false,
            ..good_sample()
        });
        assert_eq!(metrics.positioning.status, QualityStatus::Poor);
        assert_eq!(metrics.positioning.distance, DistanceStatus::Unknown);
        assert!(!metrics.overall.ready_to_scan);
    }

    #[test]
    fn distance_classification() {
        let gate = QualityGate::default();

        let far = gate.classify(RawQualitySample {
            alignment: 0.2,
            ..good_sample()
        });
        assert_eq!(far.positioning.distance, DistanceStatus::TooFar);

        let close = gate.classify(RawQualitySample {
            alignment: 0.98,
            ..good_sample()
        });
        assert_eq!(close.positioning.distance, DistanceStatus::TooClose);

        let ideal = gate.classify(good_sample());
        assert_eq!(ideal.positioning.distance, DistanceStatus::Ideal);
    }

    #[test]
    fn overall_is_worst_aspect() {
        let gate = QualityGate::default();
        // Only alignment degraded — overall should be exactly Warning.
        let metrics = gate.classify(RawQualitySample {
            alignment: 0.5,
            ..good_sample()
        });
        assert_eq!(metrics.positioning.status, QualityStatus::Warning);
        assert_eq!(metrics.overall.status, QualityStatus::Warning);
    }

    #[test]
    fn score_is_clamped() {
        let gate = QualityGate::default();
        let metrics = gate.classify(RawQualitySample {
            blur: 1.0,
            brightness: 0.0,
            uniformity: 0.0,
            alignment: 0.0,
            document_detected: false,
        });
        assert!(metrics.overall.score >= 0.0);
        assert!(metrics.overall.score <= 1.0);
    }
}
