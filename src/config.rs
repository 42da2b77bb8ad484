//! Engine configuration: numeric policy for every stage plus naming limits.
//!
//! Defaults are the production constants. A JSON file may override any subset of
//! fields; unspecified fields keep their defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Lowest threshold floor a config may request.
pub const MIN_THRESHOLD_FLOOR: f64 = 5.0;
/// Hard upper bound on generated name length (spaces excluded).
pub const MAX_NAME_CHARS: usize = 14;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    // -- Scoring -------------------------------------------------------------

    /// Scenes a session may answer before the accumulator refuses more choices.
    pub max_scenes: usize,
    /// Raw scores are clamped to [-bound, bound] after every add.
    pub raw_score_bound: f64,

    // -- Dispersion ranking --------------------------------------------------

    /// Weight of the normalized absolute deviation from the cross-axis mean.
    pub deviation_weight: f64,
    /// Weight of the axis's share of the cross-axis range.
    pub range_weight: f64,

    // -- Threshold -----------------------------------------------------------

    /// `thr = max(floor, scale * sqrt(variance / 100))`.
    pub threshold_floor: f64,
    pub threshold_scale: f64,

    // -- Type-count heuristic -----------------------------------------------

    /// Add a Neutral-variant cell when the expected double-Neutral rate exceeds this.
    pub neutral_rate_trigger: f64,
    /// Add an edge-variant cell when the min/max cell population ratio falls below this.
    pub imbalance_ratio_trigger: f64,
    /// Spread difference between the primaries above which extra cells lean to one axis.
    pub spread_bias_trigger: f64,

    // -- Naming --------------------------------------------------------------

    /// Max characters per generated name, spaces excluded.
    pub max_name_chars: usize,
    /// Proposer calls in flight per run.
    pub name_concurrency: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_scenes: 4,
            raw_score_bound: 5.0,
            deviation_weight: 0.5,
            range_weight: 0.5,
            threshold_floor: MIN_THRESHOLD_FLOOR,
            threshold_scale: 10.0,
            neutral_rate_trigger: 0.30,
            imbalance_ratio_trigger: 0.35,
            spread_bias_trigger: 8.0,
            max_name_chars: MAX_NAME_CHARS,
            name_concurrency: 4,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read engine config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse engine config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid engine config: {0}")]
    Invalid(String),
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_scenes == 0 {
            return Err(ConfigError::Invalid("max_scenes must be >= 1".into()));
        }
        if !(self.raw_score_bound.is_finite() && self.raw_score_bound > 0.0) {
            return Err(ConfigError::Invalid("raw_score_bound must be > 0".into()));
        }
        if self.deviation_weight < 0.0 || self.range_weight < 0.0 {
            return Err(ConfigError::Invalid(
                "dispersion weights must be >= 0".into(),
            ));
        }
        if self.deviation_weight + self.range_weight <= 0.0 {
            return Err(ConfigError::Invalid(
                "at least one dispersion weight must be positive".into(),
            ));
        }
        if self.threshold_floor.is_nan() || self.threshold_floor < MIN_THRESHOLD_FLOOR {
            return Err(ConfigError::Invalid(format!(
                "threshold_floor must be >= {MIN_THRESHOLD_FLOOR}"
            )));
        }
        if !(self.threshold_scale.is_finite() && self.threshold_scale > 0.0) {
            return Err(ConfigError::Invalid("threshold_scale must be > 0".into()));
        }
        for (name, value) in [
            ("neutral_rate_trigger", self.neutral_rate_trigger),
            ("imbalance_ratio_trigger", self.imbalance_ratio_trigger),
        ] {
            if !(value > 0.0 && value < 1.0) {
                return Err(ConfigError::Invalid(format!("{name} must be in (0, 1)")));
            }
        }
        if self.spread_bias_trigger.is_nan() || self.spread_bias_trigger < 0.0 {
            return Err(ConfigError::Invalid(
                "spread_bias_trigger must be >= 0".into(),
            ));
        }
        if !(1..=MAX_NAME_CHARS).contains(&self.max_name_chars) {
            return Err(ConfigError::Invalid(format!(
                "max_name_chars must be in [1, {MAX_NAME_CHARS}]"
            )));
        }
        if self.name_concurrency == 0 {
            return Err(ConfigError::Invalid("name_concurrency must be >= 1".into()));
        }
        Ok(())
    }
}

/// Load and validate a JSON engine config.
pub fn load_config_from_path(path: impl AsRef<Path>) -> Result<EngineConfig, ConfigError> {
    let raw = std::fs::read_to_string(path.as_ref())?;
    let config: EngineConfig = serde_json::from_str(&raw)?;
    config.validate()?;
    Ok(config)
}
