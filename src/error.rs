//! Input and structural errors raised before or during a classification run.

use crate::types::FailureCode;

/// Errors produced while validating axes, scores and choices.
///
/// None of these reach the end user: the engine turns them into a preset fallback
/// with the matching [`FailureCode`]. Callers that want to reject bad input up front
/// get the same errors from [`crate::AxisSet::new`] and
/// [`crate::ClassificationRequest::validate`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    /// Fewer than 2 or more than 6 axes.
    #[error("axis count {count} outside supported range [{min}, {max}]")]
    AxisCount {
        count: usize,
        min: usize,
        max: usize,
    },

    /// Malformed input: empty ids, duplicates, missing or non-finite scores.
    #[error("structural input error: {0}")]
    Structural(String),

    /// A weight or score referenced an axis outside the session's axis set.
    #[error("unknown axis id: {0}")]
    UnknownAxis(String),

    #[error("weight {weight} for axis '{axis}' outside [-1, 1]")]
    WeightOutOfRange { axis: String, weight: f64 },

    #[error("all {max} scenes already answered")]
    ScenesExhausted { max: usize },

    #[error("choice index {index} out of range for a scene with {available} choices")]
    ChoiceOutOfRange { index: usize, available: usize },
}

impl EngineError {
    pub fn structural(message: impl Into<String>) -> Self {
        Self::Structural(message.into())
    }

    /// Failure code recorded in run metadata when this error ends a run.
    pub fn failure_code(&self) -> FailureCode {
        match self {
            Self::AxisCount { .. } => FailureCode::AxisCount,
            _ => FailureCode::Structural,
        }
    }
}
