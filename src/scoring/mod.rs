//! Raw score accumulation and min–max normalization.

pub mod accumulator;
pub mod normalize;

pub use accumulator::{ChoiceWeightVector, RawScoreVector, Scene, ScoreAccumulator, CHOICES_PER_SCENE};
pub use normalize::{normalize, NormalizedScoreVector, NEUTRAL_SCORE};
