// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Fallback policy configuration.
//
// Set once at session start and immutable while a session is live; the
// engine accepts updates only between sessions.

use serde::{Deserialize, Serialize};

use crate::error::{Result, VeriscanError};

/// Timeouts, budgets, and toggles governing pipeline fallback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackConfig {
    /// Hard deadline for the barcode pipeline, measured from session start.
    pub barcode_timeout_ms: u64,
    /// Hard deadline for the OCR pipeline, measured from OCR entry.
    pub ocr_timeout_ms: u64,
    /// Decode failures tolerated before switching away from barcode.
    pub max_barcode_attempts: u32,
    /// Ceiling on total fallback cost, measured from the moment fallback
    /// began (not from OCR entry), surviving OCR retries.
    pub max_fallback_processing_time_ms: u64,
    /// Minimum pipeline confidence to accept a result, 0.0–1.0.
    pub confidence_threshold: f64,
    /// Whether barcode failures may fall back to OCR at all.
    pub enable_fallback: bool,
    /// Consecutive poor-quality frames tolerated before a quality-driven
    /// switch to OCR.
    pub quality_auto_switch_threshold: u32,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            barcode_timeout_ms: 10_000,
            ocr_timeout_ms: 15_000,
            max_barcode_attempts: 5,
            max_fallback_processing_time_ms: 20_000,
            confidence_threshold: 0.8,
            enable_fallback: true,
            quality_auto_switch_threshold: 8,
        }
    }
}

impl FallbackConfig {
    /// Reject configurations the state machine cannot operate under.
    pub fn validate(&self) -> Result<()> {
        if self.barcode_timeout_ms == 0 {
            return Err(VeriscanError::InvalidConfig(
                "barcode_timeout_ms must be non-zero".into(),
            ));
        }
        if self.ocr_timeout_ms == 0 {
            return Err(VeriscanError::InvalidConfig(
                "ocr_timeout_ms must be non-zero".into(),
            ));
        }
        if self.max_barcode_attempts == 0 {
            return Err(VeriscanError::InvalidConfig(
                "max_barcode_attempts must be non-zero".into(),
            ));
        }
        if self.max_fallback_processing_time_ms == 0 {
            return Err(VeriscanError::InvalidConfig(
                "max_fallback_processing_time_ms must be non-zero".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(VeriscanError::InvalidConfig(format!(
                "confidence_threshold {} outside 0.0–1.0",
                self.confidence_threshold
            )));
        }
        if self.quality_auto_switch_threshold == 0 {
            return Err(VeriscanError::InvalidConfig(
                "quality_auto_switch_threshold must be non-zero".into(),
            ));
        }
        Ok(())
    }

    /// Apply a partial update, returning the merged (validated) config.
    pub fn apply(&self, update: ConfigUpdate) -> Result<Self> {
        let merged = Self {
            barcode_timeout_ms: update.barcode_timeout_ms.unwrap_or(self.barcode_timeout_ms),
            ocr_timeout_ms: update.ocr_timeout_ms.unwrap_or(self.ocr_timeout_ms),
            max_barcode_attempts: update
                .max_barcode_attempts
                .unwrap_or(self.max_barcode_attempts),
            max_fallback_processing_time_ms: update
                .max_fallback_processing_time_ms
                .unwrap_or(self.max_fallback_processing_time_ms),
            confidence_threshold: update
                .confidence_threshold
                .unwrap_or(self.confidence_threshold),
            enable_fallback: update.enable_fallback.unwrap_or(self.enable_fallback),
            quality_auto_switch_threshold: update
                .quality_auto_switch_threshold
                .unwrap_or(self.quality_auto_switch_threshold),
        };
        merged.validate()?;
        Ok(merged)
    }

    /// Combined timeout budget used for performance rating: the barcode
    /// window plus the fallback window when fallback is on the table.
    pub fn combined_budget_ms(&self) -> u64 {
        if self.enable_fallback {
            self.barcode_timeout_ms + self.max_fallback_processing_time_ms
        } else {
            self.barcode_timeout_ms
        }
    }
}

/// Partial overlay for `FallbackConfig::apply`. Unset fields keep their
/// current values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigUpdate {
    pub barcode_timeout_ms: Option<u64>,
    pub ocr_timeout_ms: Option<u64>,
    pub max_barcode_attempts: Option<u32>,
    pub max_fallback_processing_time_ms: Option<u64>,
    pub confidence_threshold: Option<f64>,
    pub enable_fallback: Option<bool>,
    pub quality_auto_switch_threshold: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(FallbackConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_timeout_rejected() {
        let config = FallbackConfig {
            barcode_timeout_ms: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(VeriscanError::InvalidConfig(_))
        ));
    }

    #[test]
    fn out_of_range_threshold_rejected() {
        let config = FallbackConfig {
            confidence_threshold: 1.2,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn apply_merges_only_set_fields() {
        let base = FallbackConfig::default();
        let merged = base
            .apply(ConfigUpdate {
                max_barcode_attempts: Some(3),
                enable_fallback: Some(false),
                ..Default::default()
            })
            .expect("valid update");

        assert_eq!(merged.max_barcode_attempts, 3);
        assert!(!merged.enable_fallback);
        assert_eq!(merged.barcode_timeout_ms, base.barcode_timeout_ms);
        assert_eq!(merged.confidence_threshold, base.confidence_threshold);
    }

    #[test]
    fn apply_rejects_invalid_merge() {
        let base = FallbackConfig::default();
        let result = base.apply(ConfigUpdate {
            confidence_threshold: Some(-0.1),
            ..Default::default()
        });
        assert!(result.is_err());
    }

    #[test]
    fn combined_budget_depends_on_fallback_toggle() {
        let with = FallbackConfig::default();
        assert_eq!(with.combined_budget_ms(), 30_000);

        let without = FallbackConfig {
            enable_fallback: false,
            ..Default::default()
        };
        assert_eq!(without.combined_budget_ms(), 10_000);
    }
}
