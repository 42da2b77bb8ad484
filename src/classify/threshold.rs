//! Variance-driven High/Low cut-off.

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;

/// Cut-offs for the two primary axes. Both entries carry the same value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdPair {
    pub axis_a: f64,
    pub axis_b: f64,
}

impl ThresholdPair {
    pub fn uniform(threshold: f64) -> Self {
        Self {
            axis_a: threshold,
            axis_b: threshold,
        }
    }
}

/// `max(floor, scale * sqrt(variance / 100))`.
///
/// Tightly clustered score sets get a narrow band so some polarity survives;
/// the square root damps the pull of a single outlier axis.
pub fn dynamic_threshold(variance: f64, config: &EngineConfig) -> f64 {
    let spread = config.threshold_scale * (variance.max(0.0) / 100.0).sqrt();
    spread.max(config.threshold_floor)
}
