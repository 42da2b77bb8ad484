#![forbid(unsafe_code)]

//! # archetype-engine
//!
//! Adaptive scoring and type classification for branching-narrative quizzes.
//!
//! A session answers a handful of scenes; every chosen option carries a weight per
//! evaluation axis. The engine folds those weights into raw scores, rescales them,
//! picks the two axes that separate this user most clearly, buckets them into
//! High / Low / Neutral against a variance-driven threshold, decides how many type
//! cells (4–6) the result should have, and names each cell through an injected
//! proposer with local validation. Anything that cannot complete lands on a fixed
//! preset taxonomy, so callers always get a usable type set back.
//!
//! Pipeline stages, leaves first:
//! - [`scoring`]: accumulation and normalization
//! - [`classify`]: dispersion ranking, threshold, polarity
//! - [`cells`]: type-count heuristic and cell expansion
//! - [`naming`]: proposal, validation, retry, plain-name fallback
//! - [`engine`]: run orchestration and preset fallback

pub mod axes;
pub mod cells;
pub mod classify;
pub mod config;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod naming;
pub mod preset;
pub mod prompts;
pub mod scoring;
pub mod trace;
pub mod types;

pub use axes::{AxisDefinition, AxisSet};
pub use cells::{CellKind, CellPlan, TypeCell};
pub use classify::{Polarity, PolarityPair, PrimaryAxisPair, ScoreAnalysis, ThresholdPair};
pub use config::{load_config_from_path, ConfigError, EngineConfig};
pub use engine::{ClassificationEngine, RunStage};
pub use error::EngineError;
pub use gateway::{Attribution, ChatGateway, ProviderGateway, UsageSink};
pub use naming::{LlmNameProposer, NameProposal, NameProposer, NameRequest, ProposerError};
pub use scoring::{ChoiceWeightVector, NormalizedScoreVector, RawScoreVector, Scene, ScoreAccumulator};
pub use trace::{JsonlRunTraceSink, RunTrace, RunTraceSink, TraceError, TraceWorker};
pub use types::{
    ClassificationRequest, ClassificationResult, FailureCode, GenerationMeta, NameSource,
    TypeRecord, ALGORITHM_VERSION,
};
