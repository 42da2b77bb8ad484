//! Request and result types exchanged with callers.
//!
//! JSON field names are camelCase; enum values are snake_case.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::axes::{AxisDefinition, AxisSet};
use crate::cells::TypeCell;
use crate::classify::{PolarityPair, ThresholdPair};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::scoring::{ChoiceWeightVector, RawScoreVector, ScoreAccumulator};

/// Version tag stamped on every result and trace.
pub const ALGORITHM_VERSION: &str = "adaptive-2.1";

// =============================================================================
// Request
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationRequest {
    pub session_id: String,
    pub axes: Vec<AxisDefinition>,
    pub raw_scores: HashMap<String, f64>,
}

impl ClassificationRequest {
    pub fn new(
        session_id: impl Into<String>,
        axes: Vec<AxisDefinition>,
        raw_scores: HashMap<String, f64>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            axes,
            raw_scores,
        }
    }

    /// Fold a session's chosen options into a request.
    pub fn from_choices(
        session_id: impl Into<String>,
        axes: AxisSet,
        choices: &[ChoiceWeightVector],
        config: &EngineConfig,
    ) -> Result<Self, EngineError> {
        let mut accumulator = ScoreAccumulator::new(axes.clone(), config);
        for choice in choices {
            accumulator.submit(choice)?;
        }
        let raw = accumulator.finalize();
        Ok(Self {
            session_id: session_id.into(),
            raw_scores: raw.to_map(&axes).into_iter().collect(),
            axes: axes.as_slice().to_vec(),
        })
    }

    /// Check axis count and structure, then resolve the raw scores in axis order.
    pub fn validate(&self, config: &EngineConfig) -> Result<(AxisSet, RawScoreVector), EngineError> {
        let axes = AxisSet::new(self.axes.clone())?;
        let raw = RawScoreVector::from_map(&axes, &self.raw_scores, config.raw_score_bound)?;
        Ok((axes, raw))
    }
}

// =============================================================================
// Result
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameSource {
    /// Proposed and accepted on attempt 1 or 2.
    Generated,
    /// Deterministic plain name after two rejected proposals.
    Plain,
    /// Fixed preset taxonomy.
    Preset,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeRecord {
    pub name: String,
    pub description: String,
    /// `[axis A id, axis B id]`.
    pub dominant_axes: Vec<String>,
    pub polarity_tags: Vec<String>,
    pub cell: TypeCell,
    pub source: NameSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCode {
    AxisCount,
    Structural,
    InsufficientTypes,
}

impl FailureCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureCode::AxisCount => "axis_count",
            FailureCode::Structural => "structural",
            FailureCode::InsufficientTypes => "insufficient_types",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationMeta {
    pub run_id: Uuid,
    /// Second proposals issued across all cells.
    pub retry_count: usize,
    pub fallback_used: bool,
    /// Population variance of the normalized scores; absent if the run
    /// failed before normalization.
    pub variance: Option<f64>,
    pub threshold_used: Option<ThresholdPair>,
    /// Every rejected proposal and plain name, in rejection order.
    pub discarded_names: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_code: Option<FailureCode>,
    pub generation_time_ms: u64,
    pub type_count: usize,
    pub neutral_variant_included: bool,
    pub plain_name_count: usize,
    /// blake3 fingerprint of axes and raw scores.
    pub input_hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationResult {
    pub algorithm_version: String,
    pub session_id: String,
    pub run_id: Uuid,
    /// `[axis A id, axis B id]`; empty when the input never got that far.
    pub primary_axes: Vec<String>,
    pub threshold: Option<ThresholdPair>,
    pub normalized_scores: BTreeMap<String, f64>,
    pub polarity: Option<PolarityPair>,
    pub types: Vec<TypeRecord>,
    /// Name of the record the user falls into.
    pub assigned_type: Option<String>,
    pub generation_meta: GenerationMeta,
}

impl ClassificationResult {
    pub fn assigned_record(&self) -> Option<&TypeRecord> {
        let name = self.assigned_type.as_deref()?;
        self.types.iter().find(|t| t.name == name)
    }
}
