use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use archetype_engine::preset::PRESET_TAXONOMY;
use archetype_engine::{
    AxisDefinition, CellKind, ClassificationEngine, ClassificationRequest, EngineConfig,
    FailureCode, JsonlRunTraceSink, NameProposal, NameProposer, NameRequest, NameSource, Polarity,
    ProposerError, RunTraceSink,
};
use async_trait::async_trait;
use tempfile::tempdir;

// =============================================================================
// Fixtures
// =============================================================================

type Script = dyn Fn(&NameRequest) -> Result<NameProposal, ProposerError> + Send + Sync;

/// Answers from a closure and records every request it saw.
struct ScriptedProposer {
    script: Box<Script>,
    calls: Mutex<Vec<NameRequest>>,
}

impl ScriptedProposer {
    fn new(
        script: impl Fn(&NameRequest) -> Result<NameProposal, ProposerError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            script: Box::new(script),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<NameRequest> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl NameProposer for ScriptedProposer {
    async fn propose_name(&self, request: &NameRequest) -> Result<NameProposal, ProposerError> {
        self.calls.lock().unwrap().push(request.clone());
        (self.script)(request)
    }
}

fn name_for(code: &str) -> &'static str {
    match code {
        "HH" => "Vanguard",
        "HL" => "Anchor",
        "LH" => "Wanderer",
        "LL" => "Hermit",
        "NN" => "Drifter",
        "HN" => "Maverick",
        "LN" => "Skeptic",
        _ => "Nomad",
    }
}

fn axis_defs(ids: &[(&str, &str)]) -> Vec<AxisDefinition> {
    ids.iter()
        .map(|(id, name)| AxisDefinition::new(*id, *name))
        .collect()
}

fn request(session_id: &str, axes: &[(&str, &str)], raw: &[f64]) -> ClassificationRequest {
    let raw_scores: HashMap<String, f64> = axes
        .iter()
        .zip(raw)
        .map(|((id, _), v)| (id.to_string(), *v))
        .collect();
    ClassificationRequest::new(session_id, axis_defs(axes), raw_scores)
}

const FOUR_AXES: [(&str, &str); 4] = [
    ("exploration", "Exploration"),
    ("risk", "Risk"),
    ("harmony", "Harmony"),
    ("convergence", "Convergence"),
];

/// Normalizes to 100 / 79.4 / 50 / 0: convergence Low, exploration High, five cells.
fn documented_request() -> ClassificationRequest {
    request("session-1", &FOUR_AXES, &[3.4, 2.7, 1.7, 0.0])
}

/// Normalizes to 100 / 0: the widest split two axes allow, four cells.
fn four_cell_request() -> ClassificationRequest {
    request(
        "session-4",
        &[("exploration", "Exploration"), ("risk", "Risk")],
        &[1.0, -1.0],
    )
}

fn default_engine() -> ClassificationEngine {
    ClassificationEngine::new(EngineConfig::default()).unwrap()
}

fn names(result: &archetype_engine::ClassificationResult) -> Vec<&str> {
    result.types.iter().map(|t| t.name.as_str()).collect()
}

// =============================================================================
// Naming paths
// =============================================================================

#[tokio::test]
async fn generated_names_are_accepted_in_cell_order() {
    let proposer = ScriptedProposer::new(|req| Ok(NameProposal::new(name_for(&req.cell.code()))));
    let engine = default_engine().with_proposer(proposer.clone());

    let result = engine.classify(&documented_request()).await;

    assert!(!result.generation_meta.fallback_used);
    assert_eq!(result.primary_axes, vec!["convergence", "exploration"]);
    assert_eq!(
        names(&result),
        vec!["Vanguard", "Anchor", "Wanderer", "Hermit", "Drifter"]
    );
    assert!(result.types.iter().all(|t| t.source == NameSource::Generated));
    assert_eq!(
        result.types[0].description,
        "Combines high convergence with high exploration."
    );
    assert_eq!(
        result.types[1].polarity_tags,
        vec!["convergence:high", "exploration:low"]
    );
    assert_eq!(result.assigned_type.as_deref(), Some("Wanderer"));

    let meta = &result.generation_meta;
    assert_eq!(meta.retry_count, 0);
    assert_eq!(meta.plain_name_count, 0);
    assert!(meta.discarded_names.is_empty());
    assert_eq!(meta.type_count, 5);
    assert!(meta.neutral_variant_included);

    let calls = proposer.calls();
    assert_eq!(calls.len(), 5);
    assert!(calls.iter().all(|c| c.attempt == 1 && c.previous_rejection.is_none()));
    assert!(calls.iter().all(|c| c.session_id == "session-1"));
    assert!(calls.iter().all(|c| c.run_id == result.run_id));
    assert!(calls.iter().all(|c| c.axis_a.id == "convergence" && c.max_chars == 14));
}

#[tokio::test]
async fn proposer_description_is_kept() {
    let proposer = ScriptedProposer::new(|req| {
        Ok(NameProposal::new(name_for(&req.cell.code())).with_description("Written by hand."))
    });
    let engine = default_engine().with_proposer(proposer);

    let result = engine.classify(&documented_request()).await;
    assert!(result.types.iter().all(|t| t.description == "Written by hand."));
}

#[tokio::test]
async fn rejected_proposals_are_retried_with_the_reason() {
    let proposer = ScriptedProposer::new(|req| {
        let code = req.cell.code();
        match (code.as_str(), req.attempt) {
            ("HH", _) => Ok(NameProposal::new("Explorer")),
            // Shares the stem "explor" with HH.
            ("LH", 1) => Ok(NameProposal::new("Explorers")),
            ("LL", 1) => Ok(NameProposal::new("Hermit").unsafe_flagged()),
            _ => Ok(NameProposal::new(name_for(&code))),
        }
    });
    let engine = default_engine().with_proposer(proposer.clone());

    let result = engine.classify(&documented_request()).await;

    assert_eq!(
        names(&result),
        vec!["Explorer", "Anchor", "Wanderer", "Hermit", "Drifter"]
    );
    assert!(result.types.iter().all(|t| t.source == NameSource::Generated));
    let meta = &result.generation_meta;
    assert_eq!(meta.retry_count, 2);
    assert_eq!(meta.discarded_names, vec!["Explorers", "Hermit"]);
    assert!(!meta.fallback_used);

    let retries: Vec<NameRequest> = proposer
        .calls()
        .into_iter()
        .filter(|c| c.attempt == 2)
        .collect();
    assert_eq!(retries.len(), 2);
    assert_eq!(retries[0].cell.code(), "LH");
    assert!(retries[0]
        .previous_rejection
        .as_deref()
        .is_some_and(|r| r.contains("stem")));
    assert!(retries[1]
        .previous_rejection
        .as_deref()
        .is_some_and(|r| r.contains("unsafe")));
}

#[tokio::test]
async fn proposer_errors_fall_back_to_plain_names() {
    let proposer =
        ScriptedProposer::new(|_| Err(ProposerError::Parse("no json in reply".to_string())));
    let engine = default_engine().with_proposer(proposer.clone());

    let result = engine.classify(&documented_request()).await;

    assert!(!result.generation_meta.fallback_used);
    assert_eq!(
        names(&result),
        vec![
            "HiCon HiExp",
            "HiCon LoExp",
            "LoCon HiExp",
            "LoCon LoExp",
            "MidCon MidExp"
        ]
    );
    assert!(result.types.iter().all(|t| t.source == NameSource::Plain));
    assert_eq!(result.generation_meta.retry_count, 5);
    assert_eq!(result.generation_meta.plain_name_count, 5);
    // Two proposals per cell, never a third.
    assert_eq!(proposer.calls().len(), 10);
}

#[tokio::test]
async fn too_few_named_cells_fall_back_to_presets() {
    // Every cell is offered the HL cell's plain name. HH takes it; HL then loses
    // its own plain name to the duplicate check and yields no record.
    let proposer = ScriptedProposer::new(|_| Ok(NameProposal::new("HiExp LoRis")));
    let engine = default_engine().with_proposer(proposer);

    let result = engine.classify(&four_cell_request()).await;

    let meta = &result.generation_meta;
    assert!(meta.fallback_used);
    assert_eq!(meta.failure_code, Some(FailureCode::InsufficientTypes));
    assert_eq!(meta.plain_name_count, 0);
    assert_eq!(meta.discarded_names.len(), 7);
    assert!(meta.discarded_names.iter().all(|n| n == "HiExp LoRis"));
    assert!(meta.variance.is_some());

    let preset_names: Vec<&str> = PRESET_TAXONOMY.iter().map(|p| p.name).collect();
    assert_eq!(names(&result), preset_names);
    assert!(result.types.iter().all(|t| t.source == NameSource::Preset));
    assert_eq!(result.primary_axes, vec!["exploration", "risk"]);
    assert_eq!(
        result.types[0].polarity_tags,
        vec!["exploration:high", "risk:high"]
    );
    // User is High exploration / Low risk.
    assert_eq!(result.assigned_type.as_deref(), Some("Strategist"));
}

// =============================================================================
// Structural fallbacks
// =============================================================================

#[tokio::test]
async fn axis_count_outside_bounds_returns_presets() {
    let engine = default_engine();

    let one = request("s-one", &[("exploration", "Exploration")], &[1.0]);
    let seven_axes: Vec<(String, String)> = (0..7)
        .map(|i| (format!("axis{i}"), format!("Axis {i}")))
        .collect();
    let seven_refs: Vec<(&str, &str)> = seven_axes
        .iter()
        .map(|(id, name)| (id.as_str(), name.as_str()))
        .collect();
    let seven = request("s-seven", &seven_refs, &[1.0, 2.0, 3.0, 4.0, 0.0, -1.0, -2.0]);

    for req in [one, seven] {
        let result = engine.classify(&req).await;
        assert_eq!(
            result.generation_meta.failure_code,
            Some(FailureCode::AxisCount)
        );
        assert!(result.generation_meta.fallback_used);
        assert_eq!(result.types.len(), 6);
        assert!(result.primary_axes.is_empty());
        assert!(result.normalized_scores.is_empty());
        assert_eq!(result.polarity, None);
        assert_eq!(result.threshold, None);
        assert_eq!(result.assigned_type, None);
        assert_eq!(result.types[0].polarity_tags[0], "axisA:high");
    }
}

#[tokio::test]
async fn failure_code_is_serialized_only_on_fallback() {
    let engine = default_engine();

    let ok = serde_json::to_value(engine.classify(&documented_request()).await).unwrap();
    assert!(ok["generationMeta"].get("failureCode").is_none());

    let bad = request("s-one", &[("exploration", "Exploration")], &[1.0]);
    let failed = serde_json::to_value(engine.classify(&bad).await).unwrap();
    assert_eq!(failed["generationMeta"]["failureCode"], "axis_count");
    assert_eq!(failed["generationMeta"]["fallbackUsed"], true);
}

// =============================================================================
// Cell counts
// =============================================================================

#[tokio::test]
async fn lopsided_profile_yields_six_biased_cells() {
    // Normalizes to 100 / 28.6 / 14.3 / 0; exploration High, convergence Neutral.
    let engine = default_engine();
    let result = engine
        .classify(&request("s-6", &FOUR_AXES, &[3.5, 1.0, 0.5, 0.0]))
        .await;

    assert!(!result.generation_meta.fallback_used);
    assert_eq!(result.primary_axes, vec!["exploration", "convergence"]);
    assert_eq!(result.types.len(), 6);

    let polarity = result.polarity.unwrap();
    assert_eq!(polarity.axis_a, Polarity::High);
    assert_eq!(polarity.axis_b, Polarity::Neutral);

    let neutral = &result.types[4];
    assert_eq!(neutral.cell.kind, CellKind::NeutralVariant);
    assert_eq!(neutral.cell.code(), "HN");
    assert_eq!(neutral.name, "HiExp MidCon");

    let edge = &result.types[5];
    assert_eq!(edge.cell.kind, CellKind::EdgeVariant);
    assert_eq!(edge.cell.code(), "LN");
    assert!(edge.cell.is_neutral_variant);

    assert_eq!(result.assigned_type.as_deref(), Some("HiExp MidCon"));
}

#[tokio::test]
async fn skewed_population_adds_edge_variant_only() {
    // Normalizes to 100 / 42.9 / 42.9 / 0: one axis above the mean, none near
    // enough to the band to expect a Neutral primary.
    let engine = default_engine();
    let result = engine
        .classify(&request("s-5", &FOUR_AXES, &[3.5, 1.5, 1.5, 0.0]))
        .await;

    assert_eq!(result.primary_axes, vec!["exploration", "convergence"]);
    assert_eq!(result.types.len(), 5);
    assert!(!result.generation_meta.neutral_variant_included);
    assert_eq!(result.types[4].cell.kind, CellKind::EdgeVariant);
    assert_eq!(result.types[4].cell.code(), "HN");
    // The user is High / Low, so the base cell wins over the variant.
    assert_eq!(result.assigned_type.as_deref(), Some("HiExp LoCon"));
}

#[tokio::test]
async fn identical_scores_take_the_neutral_path() {
    let engine = default_engine();
    let result = engine
        .classify(&request("s-flat", &FOUR_AXES, &[2.0, 2.0, 2.0, 2.0]))
        .await;

    assert!(result.normalized_scores.values().all(|v| *v == 50.0));
    assert_eq!(result.primary_axes, vec!["exploration", "risk"]);
    assert!(result.polarity.unwrap().both_neutral());
    assert_eq!(result.types.len(), 5);
    assert_eq!(result.types[4].name, "MidExp MidRis");
    assert_eq!(result.assigned_type.as_deref(), Some("MidExp MidRis"));
    assert_eq!(result.threshold.map(|t| t.axis_a), Some(5.0));
}

#[tokio::test]
async fn clean_split_stays_at_four_cells() {
    let engine = default_engine();
    let result = engine.classify(&four_cell_request()).await;

    let polarity = result.polarity.unwrap();
    assert_eq!(polarity.axis_a, Polarity::High);
    assert_eq!(polarity.axis_b, Polarity::Low);
    assert_eq!(result.types.len(), 4);
    assert!(result.types.iter().all(|t| t.cell.kind == CellKind::Base));
    assert!(!result.generation_meta.neutral_variant_included);
    assert_eq!(result.assigned_type.as_deref(), Some("HiExp LoRis"));
}

#[tokio::test]
async fn four_axis_split_stays_at_four_cells() {
    // Normalizes to 40 / 100 / 0 / 60; risk and harmony tie on dispersion.
    let engine = default_engine();
    let result = engine
        .classify(&request("s-4x", &FOUR_AXES, &[2.0, 5.0, 0.0, 3.0]))
        .await;

    assert_eq!(result.primary_axes, vec!["risk", "harmony"]);
    assert_eq!(result.types.len(), 4);
    assert!(result.types.iter().all(|t| t.cell.kind == CellKind::Base));
    assert_eq!(result.assigned_type.as_deref(), Some("HiRis LoHar"));
}

// =============================================================================
// Determinism & tracing
// =============================================================================

#[tokio::test]
async fn identical_inputs_produce_identical_results() {
    let proposer = ScriptedProposer::new(|req| Ok(NameProposal::new(name_for(&req.cell.code()))));
    let engine = default_engine().with_proposer(proposer);

    let a = engine.classify(&documented_request()).await;
    let b = engine.classify(&documented_request()).await;

    assert_ne!(a.run_id, b.run_id);
    assert_eq!(a.types, b.types);
    assert_eq!(a.assigned_type, b.assigned_type);
    assert_eq!(a.normalized_scores, b.normalized_scores);
    assert_eq!(a.threshold, b.threshold);
    assert_eq!(a.polarity, b.polarity);
    assert_eq!(a.generation_meta.input_hash, b.generation_meta.input_hash);
}

#[tokio::test]
async fn serial_naming_matches_concurrent_naming() {
    let script = |req: &NameRequest| -> Result<NameProposal, ProposerError> {
        Ok(NameProposal::new(name_for(&req.cell.code())))
    };
    let concurrent = default_engine().with_proposer(ScriptedProposer::new(script));
    let serial = ClassificationEngine::new(EngineConfig {
        name_concurrency: 1,
        ..EngineConfig::default()
    })
    .unwrap()
    .with_proposer(ScriptedProposer::new(script));

    let a = concurrent.classify(&documented_request()).await;
    let b = serial.classify(&documented_request()).await;
    assert_eq!(names(&a), names(&b));
}

#[tokio::test]
async fn run_trace_records_stage_trail() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("runs.jsonl");
    let (sink, worker) = JsonlRunTraceSink::new(&path).unwrap();
    let sink: Arc<dyn RunTraceSink> = Arc::new(sink);

    let engine = default_engine().with_trace_sink(sink);
    let result = engine.classify(&documented_request()).await;
    drop(engine);
    assert_eq!(worker.join().unwrap(), 1);

    let raw = std::fs::read_to_string(&path).unwrap();
    let row: serde_json::Value = serde_json::from_str(raw.lines().next().unwrap()).unwrap();
    assert_eq!(row["run_id"], result.run_id.to_string());
    assert_eq!(row["input_hash"], result.generation_meta.input_hash);
    assert_eq!(
        row["stage_trail"],
        serde_json::json!([
            "SCORING",
            "NORMALIZED",
            "AXES_SELECTED",
            "THRESHOLDED",
            "CLASSIFIED",
            "VALIDATED",
            "COMPLETE"
        ])
    );
    assert_eq!(row["type_names"].as_array().unwrap().len(), 5);
}
