//! Folds the weight vectors of the chosen options into per-axis raw scores.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::axes::AxisSet;
use crate::config::EngineConfig;
use crate::error::EngineError;

pub const CHOICES_PER_SCENE: usize = 4;

/// Weights attached to one scene choice. Axes absent from the map contribute 0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChoiceWeightVector {
    pub weights: BTreeMap<String, f64>,
}

impl ChoiceWeightVector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn weight(mut self, axis_id: impl Into<String>, value: f64) -> Self {
        self.weights.insert(axis_id.into(), value);
        self
    }
}

/// A generated scene and its four choices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub choices: Vec<ChoiceWeightVector>,
}

/// Per-axis accumulated score, aligned with [`AxisSet`] declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct RawScoreVector {
    values: Vec<f64>,
}

impl RawScoreVector {
    /// Build from an id-keyed map. Every axis must be present exactly once.
    ///
    /// Scores are clamped to `[-bound, bound]`.
    pub fn from_map(
        axes: &AxisSet,
        scores: &HashMap<String, f64>,
        bound: f64,
    ) -> Result<Self, EngineError> {
        if let Some(unknown) = scores.keys().find(|id| axes.index_of(id).is_none()) {
            return Err(EngineError::UnknownAxis(unknown.clone()));
        }
        let mut values = Vec::with_capacity(axes.len());
        for axis in axes.iter() {
            let value = *scores.get(&axis.id).ok_or_else(|| {
                EngineError::structural(format!("missing raw score for axis '{}'", axis.id))
            })?;
            if !value.is_finite() {
                return Err(EngineError::structural(format!(
                    "raw score for axis '{}' is not finite",
                    axis.id
                )));
            }
            values.push(value.clamp(-bound, bound));
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

    pub fn to_map(&self, axes: &AxisSet) -> BTreeMap<String, f64> {
        axes.iter()
            .zip(&self.values)
            .map(|(axis, v)| (axis.id.clone(), *v))
            .collect()
    }
}

/// Running totals for one session.
///
/// Totals are mutated one axis-wise add per submitted choice and clamped after
/// every add. [`ScoreAccumulator::finalize`] freezes them into a [`RawScoreVector`].
#[derive(Debug, Clone)]
pub struct ScoreAccumulator {
    axes: AxisSet,
    totals: Vec<f64>,
    history: Vec<Vec<f64>>,
    max_scenes: usize,
    bound: f64,
}

impl ScoreAccumulator {
    pub fn new(axes: AxisSet, config: &EngineConfig) -> Self {
        let totals = vec![0.0; axes.len()];
        Self {
            axes,
            totals,
            history: Vec::new(),
            max_scenes: config.max_scenes,
            bound: config.raw_score_bound,
        }
    }

    /// Add one chosen option's weights to the running totals.
    pub fn submit(&mut self, choice: &ChoiceWeightVector) -> Result<(), EngineError> {
        if self.history.len() >= self.max_scenes {
            return Err(EngineError::ScenesExhausted {
                max: self.max_scenes,
            });
        }

        // Validate the whole vector before touching totals.
        let mut contribution = vec![0.0; self.axes.len()];
        for (axis_id, &weight) in &choice.weights {
            let idx = self
                .axes
                .index_of(axis_id)
                .ok_or_else(|| EngineError::UnknownAxis(axis_id.clone()))?;
            if !weight.is_finite() || !(-1.0..=1.0).contains(&weight) {
                return Err(EngineError::WeightOutOfRange {
                    axis: axis_id.clone(),
                    weight,
                });
            }
            contribution[idx] = weight;
        }

        for (total, add) in self.totals.iter_mut().zip(&contribution) {
            *total = (*total + add).clamp(-self.bound, self.bound);
        }
        self.history.push(contribution);
        debug!(scene = self.history.len(), "choice accumulated");
        Ok(())
    }

    /// Select choice `index` of `scene` and accumulate it.
    pub fn submit_scene(&mut self, scene: &Scene, index: usize) -> Result<(), EngineError> {
        if scene.choices.len() != CHOICES_PER_SCENE {
            return Err(EngineError::structural(format!(
                "scene has {} choices, expected {CHOICES_PER_SCENE}",
                scene.choices.len()
            )));
        }
        let choice = scene
            .choices
            .get(index)
            .ok_or(EngineError::ChoiceOutOfRange {
                index,
                available: scene.choices.len(),
            })?;
        self.submit(choice)
    }

    pub fn answered(&self) -> usize {
        self.history.len()
    }

    /// Per-scene contributions in submission order.
    pub fn history(&self) -> &[Vec<f64>] {
        &self.history
    }

    pub fn axes(&self) -> &AxisSet {
        &self.axes
    }

    pub fn finalize(self) -> RawScoreVector {
        RawScoreVector {
            values: self.totals,
        }
    }
}
