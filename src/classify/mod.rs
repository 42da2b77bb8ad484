//! Primary-axis selection, threshold and polarity for one normalized score vector.
//!
//! Everything here is pure: the same scores and config always produce the same
//! [`ScoreAnalysis`].

mod dispersion;
mod polarity;
mod threshold;

pub use dispersion::{rank_axes, select_primary_axes, AxisDispersion, PrimaryAxisPair};
pub use polarity::{classify_pair, classify_score, Polarity, PolarityPair};
pub use threshold::{dynamic_threshold, ThresholdPair};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::scoring::NormalizedScoreVector;

/// Snapshot of the classification stages for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreAnalysis {
    pub scores: NormalizedScoreVector,
    pub mean: f64,
    /// Population variance of every axis score.
    pub variance: f64,
    pub threshold: f64,
    pub primary: PrimaryAxisPair,
    pub polarity: PolarityPair,
}

impl ScoreAnalysis {
    pub fn score_a(&self) -> f64 {
        self.scores.values()[self.primary.axis_a]
    }

    pub fn score_b(&self) -> f64 {
        self.scores.values()[self.primary.axis_b]
    }

    /// Signed deviation of axis A from the cross-axis mean.
    pub fn deviation_a(&self) -> f64 {
        self.score_a() - self.mean
    }

    pub fn deviation_b(&self) -> f64 {
        self.score_b() - self.mean
    }

    pub fn thresholds(&self) -> ThresholdPair {
        ThresholdPair::uniform(self.threshold)
    }
}

/// Steps of [`analyze_with`], reported in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisStep {
    AxesSelected,
    Thresholded,
    Classified,
}

/// Dispersion ranking → threshold → polarity.
pub fn analyze(
    scores: &NormalizedScoreVector,
    config: &EngineConfig,
) -> Result<ScoreAnalysis, EngineError> {
    analyze_with(scores, config, |_| {})
}

/// [`analyze`], calling `on_step` as each step completes.
pub fn analyze_with(
    scores: &NormalizedScoreVector,
    config: &EngineConfig,
    mut on_step: impl FnMut(AnalysisStep),
) -> Result<ScoreAnalysis, EngineError> {
    let primary = select_primary_axes(scores, config)?;
    on_step(AnalysisStep::AxesSelected);

    let mean = scores.mean();
    let variance = scores.variance();
    let threshold = dynamic_threshold(variance, config);
    on_step(AnalysisStep::Thresholded);

    let values = scores.values();
    let polarity = classify_pair(values[primary.axis_a], values[primary.axis_b], mean, threshold);
    on_step(AnalysisStep::Classified);

    Ok(ScoreAnalysis {
        scores: scores.clone(),
        mean,
        variance,
        threshold,
        primary,
        polarity,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyze_values(values: &[f64]) -> ScoreAnalysis {
        let scores = NormalizedScoreVector::from_values(values.to_vec()).unwrap();
        analyze(&scores, &EngineConfig::default()).unwrap()
    }

    #[test]
    fn documented_profile() {
        // Exploration, Risk, Harmony, Convergence
        let a = analyze_values(&[72.0, 65.0, 55.0, 38.0]);
        assert_eq!(a.primary, PrimaryAxisPair { axis_a: 3, axis_b: 0 });
        assert_eq!(a.threshold.round(), 13.0);
        assert_eq!(a.polarity.axis_a, Polarity::Low);
        assert_eq!(a.polarity.axis_b, Polarity::High);
        // Risk is not primary but would sit inside the band.
        assert_eq!(classify_score(65.0, a.mean, a.threshold), Polarity::Neutral);
    }

    #[test]
    fn all_equal_scores_stay_neutral() {
        let a = analyze_values(&[50.0, 50.0, 50.0, 50.0]);
        assert_eq!(a.variance, 0.0);
        assert_eq!(a.threshold, 5.0);
        assert!(a.polarity.both_neutral());
        assert!(!a.polarity.forced_binarization);
    }

    #[test]
    fn close_cluster_is_force_binarized() {
        let a = analyze_values(&[54.0, 46.0, 50.0, 50.0]);
        assert_eq!(a.threshold, 5.0);
        assert_eq!(a.primary, PrimaryAxisPair { axis_a: 0, axis_b: 1 });
        assert_eq!(a.polarity.axis_a, Polarity::High);
        assert_eq!(a.polarity.axis_b, Polarity::Low);
        assert!(a.polarity.forced_binarization);
    }

    #[test]
    fn steps_are_reported_in_order() {
        let scores = NormalizedScoreVector::from_values(vec![72.0, 65.0, 55.0, 38.0]).unwrap();
        let mut steps = Vec::new();
        let a = analyze_with(&scores, &EngineConfig::default(), |step| steps.push(step)).unwrap();
        assert_eq!(
            steps,
            vec![
                AnalysisStep::AxesSelected,
                AnalysisStep::Thresholded,
                AnalysisStep::Classified
            ]
        );
        assert_eq!(a, analyze_values(&[72.0, 65.0, 55.0, 38.0]));
    }

    #[test]
    fn failed_selection_reports_no_steps() {
        let scores = NormalizedScoreVector::from_values(vec![10.0]).unwrap();
        let mut steps = Vec::new();
        assert!(analyze_with(&scores, &EngineConfig::default(), |step| steps.push(step)).is_err());
        assert!(steps.is_empty());
    }

    #[test]
    fn deviations_are_signed() {
        let a = analyze_values(&[72.0, 65.0, 55.0, 38.0]);
        assert!((a.deviation_a() + 19.5).abs() < 1e-9);
        assert!((a.deviation_b() - 14.5).abs() < 1e-9);
        assert_eq!(a.thresholds().axis_a, a.thresholds().axis_b);
    }
}
