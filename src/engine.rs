//! Classification run orchestration.
//!
//! A run walks
//!
//! ```text
//! SCORING → NORMALIZED → AXES_SELECTED → THRESHOLDED → CLASSIFIED
//!         → {GENERATING → VALIDATED}* → COMPLETE | PRESET_FALLBACK
//! ```
//!
//! and always ends with a usable type set. Structural input errors and runs that
//! name fewer than four cells land on the preset taxonomy; nothing is retried
//! after that.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::axes::{AxisDefinition, AxisSet};
use crate::cells::{expand_cells, plan_cells, CellKind, CellPlan, TypeCell, BASE_CELL_COUNT};
use crate::classify::{analyze_with, AnalysisStep, Polarity, ScoreAnalysis};
use crate::config::{ConfigError, EngineConfig};
use crate::error::EngineError;
use crate::naming::{
    describe_cell, plain_name, polarity_tags, CellNaming, Discard, NameProposer, NameRegistry,
    NameRequest, MAX_PROPOSAL_ATTEMPTS,
};
use crate::preset::preset_records;
use crate::scoring::normalize;
use crate::trace::{RunTrace, RunTraceSink};
use crate::types::{
    ClassificationRequest, ClassificationResult, FailureCode, GenerationMeta, TypeRecord,
    ALGORITHM_VERSION,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStage {
    Scoring,
    Normalized,
    AxesSelected,
    Thresholded,
    Classified,
    Generating,
    Validated,
    Complete,
    PresetFallback,
}

impl From<AnalysisStep> for RunStage {
    fn from(step: AnalysisStep) -> Self {
        match step {
            AnalysisStep::AxesSelected => RunStage::AxesSelected,
            AnalysisStep::Thresholded => RunStage::Thresholded,
            AnalysisStep::Classified => RunStage::Classified,
        }
    }
}

// =============================================================================
// Run context
// =============================================================================

/// Everything one run owns. Nothing here outlives [`ClassificationEngine::classify`].
struct RunContext {
    run_id: Uuid,
    session_id: String,
    started: Instant,
    stage: RunStage,
    trail: Vec<RunStage>,
    axes: Option<AxisSet>,
    analysis: Option<ScoreAnalysis>,
    plan: Option<CellPlan>,
    registry: NameRegistry,
    retry_count: usize,
    plain_name_count: usize,
    discarded: Vec<String>,
}

impl RunContext {
    fn new(session_id: &str) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            session_id: session_id.to_string(),
            started: Instant::now(),
            stage: RunStage::Scoring,
            trail: vec![RunStage::Scoring],
            axes: None,
            analysis: None,
            plan: None,
            registry: NameRegistry::new(),
            retry_count: 0,
            plain_name_count: 0,
            discarded: Vec::new(),
        }
    }

    fn advance(&mut self, next: RunStage) {
        debug!(run_id = %self.run_id, from = ?self.stage, to = ?next, "run stage");
        self.stage = next;
        self.trail.push(next);
    }

    fn discard(&mut self, discard: Discard) {
        debug!(
            run_id = %self.run_id,
            name = %discard.name,
            reason = discard.rejection.code(),
            "name rejected"
        );
        self.discarded.push(discard.name);
    }

    fn primary_axis_ids(&self) -> Vec<String> {
        match (&self.axes, &self.analysis) {
            (Some(axes), Some(analysis)) => [analysis.primary.axis_a, analysis.primary.axis_b]
                .iter()
                .filter_map(|&i| axes.get(i).map(|a| a.id.clone()))
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Why a run ended on the preset taxonomy.
#[derive(Debug)]
struct RunFailure {
    code: FailureCode,
    reason: String,
}

impl From<EngineError> for RunFailure {
    fn from(err: EngineError) -> Self {
        Self {
            code: err.failure_code(),
            reason: err.to_string(),
        }
    }
}

// =============================================================================
// Engine
// =============================================================================

/// Shareable across tasks; every call to [`classify`](Self::classify) is an
/// independent run.
pub struct ClassificationEngine {
    config: EngineConfig,
    proposer: Option<Arc<dyn NameProposer>>,
    trace_sink: Option<Arc<dyn RunTraceSink>>,
}

impl ClassificationEngine {
    /// Rejects configs that fail [`EngineConfig::validate`]. Without a proposer
    /// every cell gets its plain name.
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            proposer: None,
            trace_sink: None,
        })
    }

    pub fn with_proposer(mut self, proposer: Arc<dyn NameProposer>) -> Self {
        self.proposer = Some(proposer);
        self
    }

    pub fn with_trace_sink(mut self, sink: Arc<dyn RunTraceSink>) -> Self {
        self.trace_sink = Some(sink);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run the full pipeline. Never fails: unrecoverable runs return the preset set.
    pub async fn classify(&self, request: &ClassificationRequest) -> ClassificationResult {
        let mut ctx = RunContext::new(&request.session_id);
        let input_hash = input_fingerprint(request);

        let (types, failure_code) = match self.run(request, &mut ctx).await {
            Ok(records) => {
                ctx.advance(RunStage::Complete);
                (records, None)
            }
            Err(failure) => {
                warn!(
                    session_id = %ctx.session_id,
                    run_id = %ctx.run_id,
                    failure_code = failure.code.as_str(),
                    reason = %failure.reason,
                    "classification fell back to preset taxonomy"
                );
                ctx.advance(RunStage::PresetFallback);
                (preset_records(&ctx.primary_axis_ids()), Some(failure.code))
            }
        };

        let assigned_type = ctx
            .analysis
            .as_ref()
            .and_then(|analysis| assign_type(&types, analysis))
            .map(|idx| types[idx].name.clone());

        let result = self.assemble(&ctx, types, assigned_type, failure_code, input_hash);
        self.emit(&ctx, &result);
        result
    }

    async fn run(
        &self,
        request: &ClassificationRequest,
        ctx: &mut RunContext,
    ) -> Result<Vec<TypeRecord>, RunFailure> {
        let (axes, raw) = request.validate(&self.config)?;
        ctx.axes = Some(axes.clone());

        let scores = normalize(&raw);
        ctx.advance(RunStage::Normalized);

        let analysis = analyze_with(&scores, &self.config, |step| ctx.advance(step.into()))?;
        let primary = analysis.primary;
        ctx.analysis = Some(analysis.clone());

        let plan = plan_cells(&analysis, &self.config);
        let cells = expand_cells(&plan, &analysis);
        ctx.plan = Some(plan);

        let (axis_a, axis_b) = match (axes.get(primary.axis_a), axes.get(primary.axis_b)) {
            (Some(a), Some(b)) => (a.clone(), b.clone()),
            _ => return Err(EngineError::structural("primary axis index out of range").into()),
        };

        let namings = self.name_cells(&cells, &axis_a, &axis_b, ctx).await;

        let records: Vec<TypeRecord> = namings
            .into_iter()
            .filter_map(CellNaming::into_accepted)
            .map(|(cell, accepted)| TypeRecord {
                description: accepted
                    .description
                    .unwrap_or_else(|| describe_cell(&cell, &axis_a, &axis_b)),
                name: accepted.name,
                dominant_axes: vec![axis_a.id.clone(), axis_b.id.clone()],
                polarity_tags: polarity_tags(&cell, &axis_a, &axis_b),
                cell,
                source: accepted.source,
            })
            .collect();

        if records.len() < BASE_CELL_COUNT {
            return Err(RunFailure {
                code: FailureCode::InsufficientTypes,
                reason: format!(
                    "{} of {} cells named, need at least {BASE_CELL_COUNT}",
                    records.len(),
                    cells.len()
                ),
            });
        }
        Ok(records)
    }

    /// Proposal rounds, then the plain-name round.
    ///
    /// Proposals within a round run concurrently; validation runs in cell order
    /// so the accepted-name registry sees a deterministic sequence.
    async fn name_cells(
        &self,
        cells: &[TypeCell],
        axis_a: &AxisDefinition,
        axis_b: &AxisDefinition,
        ctx: &mut RunContext,
    ) -> Vec<CellNaming> {
        let max_chars = self.config.max_name_chars;
        let mut namings: Vec<CellNaming> = cells.iter().copied().map(CellNaming::new).collect();

        match &self.proposer {
            Some(proposer) => {
                for _ in 0..MAX_PROPOSAL_ATTEMPTS {
                    let requests: Vec<(usize, NameRequest)> = namings
                        .iter()
                        .enumerate()
                        .filter_map(|(idx, naming)| {
                            let (attempt, previous_rejection) = naming.pending_attempt()?;
                            Some((
                                idx,
                                NameRequest {
                                    session_id: ctx.session_id.clone(),
                                    run_id: ctx.run_id,
                                    cell: *naming.cell(),
                                    axis_a: axis_a.clone(),
                                    axis_b: axis_b.clone(),
                                    attempt,
                                    previous_rejection,
                                    max_chars,
                                },
                            ))
                        })
                        .collect();
                    if requests.is_empty() {
                        break;
                    }
                    ctx.retry_count += requests.iter().filter(|(_, r)| r.attempt > 1).count();
                    ctx.advance(RunStage::Generating);

                    let mut results: Vec<_> = stream::iter(requests.into_iter().map(|(idx, req)| {
                        let proposer = Arc::clone(proposer);
                        async move {
                            let result = proposer.propose_name(&req).await;
                            (idx, result)
                        }
                    }))
                    .buffer_unordered(self.config.name_concurrency.max(1))
                    .collect()
                    .await;
                    results.sort_by_key(|(idx, _)| *idx);

                    for (idx, result) in results {
                        if let Err(err) = &result {
                            warn!(
                                run_id = %ctx.run_id,
                                cell = %namings[idx].cell().code(),
                                error = %err,
                                "name proposal failed"
                            );
                        }
                        namings[idx].receive(result);
                    }

                    ctx.advance(RunStage::Validated);
                    for naming in namings.iter_mut() {
                        if let Some(discard) = naming.validate(&mut ctx.registry, max_chars) {
                            ctx.discard(discard);
                        }
                    }
                }
            }
            None => namings.iter_mut().for_each(CellNaming::skip_to_plain),
        }

        if namings.iter().any(CellNaming::needs_plain_name) {
            ctx.advance(RunStage::Validated);
        }
        for naming in namings.iter_mut().filter(|n| n.needs_plain_name()) {
            let plain = plain_name(naming.cell(), axis_a, axis_b, max_chars);
            match naming.apply_plain(&plain, &mut ctx.registry, max_chars) {
                Some(discard) => ctx.discard(discard),
                None => ctx.plain_name_count += 1,
            }
        }

        namings
    }

    fn assemble(
        &self,
        ctx: &RunContext,
        types: Vec<TypeRecord>,
        assigned_type: Option<String>,
        failure_code: Option<FailureCode>,
        input_hash: String,
    ) -> ClassificationResult {
        let normalized_scores: BTreeMap<String, f64> = match (&ctx.axes, &ctx.analysis) {
            (Some(axes), Some(analysis)) => axes
                .iter()
                .zip(analysis.scores.values())
                .map(|(axis, score)| (axis.id.clone(), *score))
                .collect(),
            _ => BTreeMap::new(),
        };

        let generation_meta = GenerationMeta {
            run_id: ctx.run_id,
            retry_count: ctx.retry_count,
            fallback_used: failure_code.is_some(),
            variance: ctx.analysis.as_ref().map(|a| a.variance),
            threshold_used: ctx.analysis.as_ref().map(ScoreAnalysis::thresholds),
            discarded_names: ctx.discarded.clone(),
            failure_code,
            generation_time_ms: ctx.started.elapsed().as_millis() as u64,
            type_count: types.len(),
            neutral_variant_included: types
                .iter()
                .any(|t| t.cell.kind == CellKind::NeutralVariant),
            plain_name_count: if failure_code.is_some() {
                0
            } else {
                ctx.plain_name_count
            },
            input_hash,
        };

        ClassificationResult {
            algorithm_version: ALGORITHM_VERSION.to_string(),
            session_id: ctx.session_id.clone(),
            run_id: ctx.run_id,
            primary_axes: ctx.primary_axis_ids(),
            threshold: generation_meta.threshold_used,
            normalized_scores,
            polarity: ctx.analysis.as_ref().map(|a| a.polarity),
            types,
            assigned_type,
            generation_meta,
        }
    }

    fn emit(&self, ctx: &RunContext, result: &ClassificationResult) {
        let meta = &result.generation_meta;
        info!(
            session_id = %result.session_id,
            run_id = %result.run_id,
            algorithm_version = ALGORITHM_VERSION,
            generation_time_ms = meta.generation_time_ms,
            retry_count = meta.retry_count,
            fallback_used = meta.fallback_used,
            variance = meta.variance.unwrap_or(f64::NAN),
            threshold_used.axis_a = meta.threshold_used.map(|t| t.axis_a).unwrap_or(f64::NAN),
            threshold_used.axis_b = meta.threshold_used.map(|t| t.axis_b).unwrap_or(f64::NAN),
            discarded_names = ?meta.discarded_names,
            type_count = meta.type_count,
            neutral_variant_included = meta.neutral_variant_included,
            plain_name_count = meta.plain_name_count,
            failure_code = meta.failure_code.map(|c| c.as_str()).unwrap_or(""),
            input_hash = %meta.input_hash,
            neutral_rate = ctx.plan.as_ref().map(|p| p.neutral_rate).unwrap_or(f64::NAN),
            imbalance_ratio = ctx.plan.as_ref().map(|p| p.imbalance_ratio).unwrap_or(f64::NAN),
            "classification run complete"
        );

        let Some(sink) = &self.trace_sink else {
            return;
        };
        let trace = RunTrace {
            timestamp: Utc::now(),
            session_id: result.session_id.clone(),
            run_id: result.run_id,
            algorithm_version: result.algorithm_version.clone(),
            input_hash: meta.input_hash.clone(),
            stage_trail: ctx.trail.clone(),
            generation_time_ms: meta.generation_time_ms,
            retry_count: meta.retry_count,
            fallback_used: meta.fallback_used,
            variance: meta.variance,
            threshold_used: meta.threshold_used,
            discarded_names: meta.discarded_names.clone(),
            type_count: meta.type_count,
            neutral_variant_included: meta.neutral_variant_included,
            plain_name_count: meta.plain_name_count,
            failure_code: meta.failure_code,
            type_names: result.types.iter().map(|t| t.name.clone()).collect(),
        };
        if let Err(err) = sink.record(trace) {
            warn!(error = %err, run_id = %result.run_id, "failed to record run trace");
        }
    }
}

// =============================================================================
// Assignment & fingerprint
// =============================================================================

/// Index of the record the user belongs to.
///
/// Exact polarity match first. A user with a Neutral primary then goes to the
/// first derived cell compatible with their poles, where the Neutral side is
/// matched by deviation sign. Otherwise the base cell picked by deviation signs,
/// and failing that the first record.
fn assign_type(types: &[TypeRecord], analysis: &ScoreAnalysis) -> Option<usize> {
    let user = analysis.polarity;
    if let Some(idx) = types.iter().position(|t| t.cell.matches(&user)) {
        return Some(idx);
    }

    let sign_a = Polarity::from_sign(analysis.deviation_a());
    let sign_b = Polarity::from_sign(analysis.deviation_b());

    if user.axis_a == Polarity::Neutral || user.axis_b == Polarity::Neutral {
        let compatible = |cell: Polarity, user: Polarity, sign: Polarity| {
            cell == Polarity::Neutral || cell == user || (user == Polarity::Neutral && cell == sign)
        };
        if let Some(idx) = types.iter().position(|t| {
            t.cell.kind != CellKind::Base
                && compatible(t.cell.polarity_a, user.axis_a, sign_a)
                && compatible(t.cell.polarity_b, user.axis_b, sign_b)
        }) {
            return Some(idx);
        }
    }

    types
        .iter()
        .position(|t| t.cell.polarity_a == sign_a && t.cell.polarity_b == sign_b)
        .or_else(|| (!types.is_empty()).then_some(0))
}

#[derive(Serialize)]
struct FingerprintInput<'a> {
    axes: Vec<&'a str>,
    raw_scores: BTreeMap<&'a str, f64>,
}

/// Stable across HashMap iteration order.
fn input_fingerprint(request: &ClassificationRequest) -> String {
    let input = FingerprintInput {
        axes: request.axes.iter().map(|a| a.id.as_str()).collect(),
        raw_scores: request
            .raw_scores
            .iter()
            .map(|(k, v)| (k.as_str(), *v))
            .collect(),
    };
    let bytes = serde_json::to_vec(&input).unwrap_or_default();
    blake3::hash(&bytes).to_hex().to_string()
}
