//! Ranks axes by how strongly they separate this user from their own average.

use std::cmp::Reverse;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::scoring::NormalizedScoreVector;

/// Composites are compared on a 1e-9 grid so float noise cannot reorder ties.
const TIE_RESOLUTION: f64 = 1e9;

#[derive(Debug, Clone, PartialEq)]
pub struct AxisDispersion {
    /// Position in axis declaration order.
    pub index: usize,
    /// `|s - mean|`.
    pub deviation: f64,
    /// `max(s - min, max - s) / (max - min)`, 0 when the range is empty.
    pub range_share: f64,
    pub composite: f64,
}

/// The two axes that drive classification. `axis_a` ranked first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrimaryAxisPair {
    pub axis_a: usize,
    pub axis_b: usize,
}

/// Rank every axis by the deviation/range composite, strongest first.
///
/// Ties keep declaration order, so identical inputs always rank identically.
pub fn rank_axes(scores: &NormalizedScoreVector, config: &EngineConfig) -> Vec<AxisDispersion> {
    let mean = scores.mean();
    let min = scores.min();
    let max = scores.max();
    let range = max - min;

    let deviations: Vec<f64> = scores.values().iter().map(|s| (s - mean).abs()).collect();
    let max_deviation = deviations.iter().copied().fold(0.0, f64::max);

    let mut ranked: Vec<AxisDispersion> = scores
        .values()
        .iter()
        .zip(&deviations)
        .enumerate()
        .map(|(index, (&s, &deviation))| {
            let deviation_share = if max_deviation > 0.0 {
                deviation / max_deviation
            } else {
                0.0
            };
            let range_share = if range > 0.0 {
                (s - min).max(max - s) / range
            } else {
                0.0
            };
            AxisDispersion {
                index,
                deviation,
                range_share,
                composite: config.deviation_weight * deviation_share
                    + config.range_weight * range_share,
            }
        })
        .collect();

    // Stable sort: equal composites stay in declaration order.
    ranked.sort_by_key(|d| Reverse((d.composite * TIE_RESOLUTION).round() as i64));
    ranked
}

pub fn select_primary_axes(
    scores: &NormalizedScoreVector,
    config: &EngineConfig,
) -> Result<PrimaryAxisPair, EngineError> {
    let ranked = rank_axes(scores, config);
    match ranked.as_slice() {
        [first, second, ..] => Ok(PrimaryAxisPair {
            axis_a: first.index,
            axis_b: second.index,
        }),
        _ => Err(EngineError::structural(
            "at least two axes are required to select primary axes",
        )),
    }
}
