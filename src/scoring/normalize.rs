//! Min–max rescaling of raw scores onto the 0–100 display range.

use crate::error::EngineError;

use super::accumulator::RawScoreVector;

/// Score every axis receives when all raw scores are identical.
pub const NEUTRAL_SCORE: f64 = 50.0;

/// Per-axis score in `[0, 100]`, aligned with axis declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedScoreVector {
    values: Vec<f64>,
}

impl NormalizedScoreVector {
    /// Wrap already-normalized scores (e.g. from an upstream session store).
    pub fn from_values(values: Vec<f64>) -> Result<Self, EngineError> {
        if values.is_empty() {
            return Err(EngineError::structural("empty score vector"));
        }
        if let Some(bad) = values
            .iter()
            .find(|v| !v.is_finite() || !(0.0..=100.0).contains(*v))
        {
            return Err(EngineError::structural(format!(
                "normalized score {bad} outside [0, 100]"
            )));
        }
        Ok(Self { values })
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied()
    }

    pub fn mean(&self) -> f64 {
        self.values.iter().sum::<f64>() / self.values.len() as f64
    }

    /// Population variance (divides by n).
    pub fn variance(&self) -> f64 {
        let mean = self.mean();
        self.values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / self.values.len() as f64
    }

    pub fn min(&self) -> f64 {
        self.values.iter().copied().fold(f64::INFINITY, f64::min)
    }

    pub fn max(&self) -> f64 {
        self.values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }
}

/// Linearly rescale `raw` so its minimum maps to 0 and its maximum to 100,
/// rounded to one decimal.
///
/// When every raw score is identical each axis gets exactly [`NEUTRAL_SCORE`].
pub fn normalize(raw: &RawScoreVector) -> NormalizedScoreVector {
    NormalizedScoreVector {
        values: rescale(raw.values()),
    }
}

fn rescale(values: &[f64]) -> Vec<f64> {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = max - min;

    if span == 0.0 {
        return vec![NEUTRAL_SCORE; values.len()];
    }

    values
        .iter()
        .map(|v| round1((v - min) / span * 100.0).clamp(0.0, 100.0))
        .collect()
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

impl NormalizedScoreVector {
    /// Run the min–max pass again over already-normalized scores.
    ///
    /// For any vector produced by [`normalize`] with `max > min` this is the identity.
    pub fn renormalize(&self) -> NormalizedScoreVector {
        NormalizedScoreVector {
            values: rescale(&self.values),
        }
    }
}
