//! Decides how many cells (4, 5 or 6) a run produces.

use serde::{Deserialize, Serialize};

use crate::classify::{Polarity, ScoreAnalysis};
use crate::config::EngineConfig;

pub const BASE_CELL_COUNT: usize = 4;
pub const MAX_CELL_COUNT: usize = 6;

/// Scores within this distance of the mean count as sitting on it.
const MEAN_TOLERANCE: f64 = 1e-9;

/// Half-width of the soft zone around the Neutral band edge, in thresholds.
const BAND_EDGE_SOFTNESS: f64 = 0.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AxisSlot {
    A,
    B,
}

/// Extra cells lean toward `axis` when the primaries' spreads differ sharply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellBias {
    pub axis: AxisSlot,
    /// Pole implied by the dominant axis's deviation sign.
    pub pole: Polarity,
}

/// Output of the type-count heuristic, with the estimates that drove it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellPlan {
    pub neutral_rate: f64,
    pub imbalance_ratio: f64,
    pub spread_gap: f64,
    pub neutral_variant: bool,
    pub edge_variant: bool,
    pub bias: Option<CellBias>,
}

impl CellPlan {
    pub fn type_count(&self) -> usize {
        let extra = usize::from(self.neutral_variant) + usize::from(self.edge_variant);
        (BASE_CELL_COUNT + extra).min(MAX_CELL_COUNT)
    }
}

pub fn plan_cells(analysis: &ScoreAnalysis, config: &EngineConfig) -> CellPlan {
    let dev_a = analysis.deviation_a();
    let dev_b = analysis.deviation_b();

    let neutral_rate = neutral_rate(analysis.scores.values(), analysis.mean, analysis.threshold);
    let neutral_variant =
        neutral_rate > config.neutral_rate_trigger || analysis.polarity.both_neutral();

    let imbalance_ratio = imbalance_ratio(analysis.scores.values(), analysis.mean);
    let edge_variant = imbalance_ratio < config.imbalance_ratio_trigger;

    let spread_gap = (dev_a.abs() - dev_b.abs()).abs();
    let bias = (neutral_variant && edge_variant && spread_gap > config.spread_bias_trigger).then(
        || {
            // Ties go to axis A.
            if dev_a.abs() >= dev_b.abs() {
                CellBias {
                    axis: AxisSlot::A,
                    pole: Polarity::from_sign(dev_a),
                }
            } else {
                CellBias {
                    axis: AxisSlot::B,
                    pole: Polarity::from_sign(dev_b),
                }
            }
        },
    );

    CellPlan {
        neutral_rate,
        imbalance_ratio,
        spread_gap,
        neutral_variant,
        edge_variant,
        bias,
    }
}

/// Expected rate of a double-Neutral primary pair.
///
/// Each axis weighs 1 up to `0.6 * thr` from the mean, ½ on the band edge and 0
/// from `1.4 * thr` out. The profile's mean weight is the chance one primary
/// lands Neutral; the pair rate is its square.
fn neutral_rate(scores: &[f64], mean: f64, threshold: f64) -> f64 {
    let weight = |score: &f64| {
        let distance = (score - mean).abs() / threshold;
        ((1.0 + BAND_EDGE_SOFTNESS - distance) / (2.0 * BAND_EDGE_SOFTNESS)).clamp(0.0, 1.0)
    };
    let share = scores.iter().map(weight).sum::<f64>() / scores.len() as f64;
    share * share
}

/// Squared min/max ratio of the smoothed share of axes above vs below the mean.
///
/// Base cell populations are `P_H², P_H·P_L, P_L·P_H, P_L²`, so the ratio of the
/// emptiest to the fullest cell is `(min(P_H, P_L) / max(P_H, P_L))²`.
fn imbalance_ratio(scores: &[f64], mean: f64) -> f64 {
    let above = scores.iter().filter(|s| **s > mean + MEAN_TOLERANCE).count();
    let at_mean = scores
        .iter()
        .filter(|s| (**s - mean).abs() <= MEAN_TOLERANCE)
        .count();
    let n = scores.len() as f64;

    let p_high = (above as f64 + 0.5 * at_mean as f64 + 1.0) / (n + 2.0);
    let p_low = 1.0 - p_high;
    (p_high.min(p_low) / p_high.max(p_low)).powi(2)
}
