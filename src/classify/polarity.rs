//! High / Low / Neutral labelling of the primary axes.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Polarity {
    High,
    Low,
    Neutral,
}

impl Polarity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Polarity::High => "high",
            Polarity::Low => "low",
            Polarity::Neutral => "neutral",
        }
    }

    /// Pole implied by the sign of a deviation; zero counts as High.
    pub fn from_sign(deviation: f64) -> Self {
        if deviation >= 0.0 {
            Polarity::High
        } else {
            Polarity::Low
        }
    }

    /// High ↔ Low; Neutral stays Neutral.
    pub fn opposite(&self) -> Self {
        match self {
            Polarity::High => Polarity::Low,
            Polarity::Low => Polarity::High,
            Polarity::Neutral => Polarity::Neutral,
        }
    }
}

/// Labels for the two primary axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolarityPair {
    pub axis_a: Polarity,
    pub axis_b: Polarity,
    /// True when a double-Neutral result was re-binarized.
    pub forced_binarization: bool,
}

impl PolarityPair {
    pub fn both_neutral(&self) -> bool {
        self.axis_a == Polarity::Neutral && self.axis_b == Polarity::Neutral
    }
}

pub fn classify_score(score: f64, mean: f64, threshold: f64) -> Polarity {
    if score >= mean + threshold {
        Polarity::High
    } else if score <= mean - threshold {
        Polarity::Low
    } else {
        Polarity::Neutral
    }
}

/// Label both primaries, then apply the double-Neutral tie-break.
///
/// If both land Neutral but sit more than `threshold` apart, the higher one
/// becomes High and the other Low. Otherwise both stay Neutral.
pub fn classify_pair(score_a: f64, score_b: f64, mean: f64, threshold: f64) -> PolarityPair {
    let axis_a = classify_score(score_a, mean, threshold);
    let axis_b = classify_score(score_b, mean, threshold);

    if axis_a == Polarity::Neutral
        && axis_b == Polarity::Neutral
        && (score_a - score_b).abs() > threshold
    {
        let (axis_a, axis_b) = if score_a >= score_b {
            (Polarity::High, Polarity::Low)
        } else {
            (Polarity::Low, Polarity::High)
        };
        return PolarityPair {
            axis_a,
            axis_b,
            forced_binarization: true,
        };
    }

    PolarityPair {
        axis_a,
        axis_b,
        forced_binarization: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_edges_are_inclusive() {
        assert_eq!(classify_score(60.0, 50.0, 10.0), Polarity::High);
        assert_eq!(classify_score(40.0, 50.0, 10.0), Polarity::Low);
        assert_eq!(classify_score(59.9, 50.0, 10.0), Polarity::Neutral);
    }

    #[test]
    fn close_neutrals_stay_neutral() {
        let pair = classify_pair(50.0, 50.0, 50.0, 5.0);
        assert!(pair.both_neutral());
        assert!(!pair.forced_binarization);
    }

    #[test]
    fn distant_neutrals_are_binarized() {
        // Floor threshold 5: both within the band, 8 apart.
        let pair = classify_pair(46.0, 54.0, 50.0, 5.0);
        assert_eq!(pair.axis_a, Polarity::Low);
        assert_eq!(pair.axis_b, Polarity::High);
        assert!(pair.forced_binarization);
    }

    #[test]
    fn mixed_labels_untouched() {
        let pair = classify_pair(72.0, 65.0, 57.5, 12.78);
        assert_eq!(pair.axis_a, Polarity::High);
        assert_eq!(pair.axis_b, Polarity::Neutral);
        assert!(!pair.forced_binarization);
    }

    #[test]
    fn opposite_and_sign() {
        assert_eq!(Polarity::High.opposite(), Polarity::Low);
        assert_eq!(Polarity::Neutral.opposite(), Polarity::Neutral);
        assert_eq!(Polarity::from_sign(0.0), Polarity::High);
        assert_eq!(Polarity::from_sign(-0.1), Polarity::Low);
    }
}
