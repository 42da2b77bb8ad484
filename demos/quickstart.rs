//! Minimal end-to-end example for `archetype-engine`.
//!
//! Folds four scene choices into scores, classifies them and prints the type set
//! with the user's assigned type.
//!
//! To run:
//! - Optionally set `OPENROUTER_API_KEY` to name types with a model
//! - `cargo run --example quickstart`

use std::sync::Arc;

use archetype_engine::gateway::TracingUsageSink;
use archetype_engine::{
    AxisDefinition, AxisSet, ChoiceWeightVector, ClassificationEngine, ClassificationRequest,
    EngineConfig, LlmNameProposer, ProviderGateway,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // -- Axes and answers ----------------------------------------------------

    let config = EngineConfig::default();

    // Axis ids are what choice weights and raw scores are keyed by; names and
    // direction labels only feed prompts and descriptions.
    let axes = AxisSet::new(vec![
        AxisDefinition::new("exploration", "Exploration")
            .with_direction_label("curious vs cautious"),
        AxisDefinition::new("risk", "Risk"),
        AxisDefinition::new("harmony", "Harmony"),
        AxisDefinition::new("convergence", "Convergence")
            .with_description("Prefers to narrow options down quickly"),
    ])?;

    // One chosen option per scene. Weights lie in [-1, 1]; missing axes count as 0.
    let choices = vec![
        ChoiceWeightVector::new()
            .weight("exploration", 1.0)
            .weight("risk", 0.9)
            .weight("harmony", 0.5),
        ChoiceWeightVector::new()
            .weight("exploration", 1.0)
            .weight("risk", 0.8)
            .weight("harmony", 0.4),
        ChoiceWeightVector::new()
            .weight("exploration", 0.8)
            .weight("risk", 0.5)
            .weight("harmony", 0.4),
        ChoiceWeightVector::new()
            .weight("exploration", 0.6)
            .weight("risk", 0.5)
            .weight("harmony", 0.4),
    ];

    let request = ClassificationRequest::from_choices("quickstart", axes, &choices, &config)?;

    // -- Engine --------------------------------------------------------------

    // Without a proposer every cell gets a deterministic plain name.
    let mut engine = ClassificationEngine::new(config)?;
    if std::env::var("OPENROUTER_API_KEY").is_ok() {
        let gateway = ProviderGateway::from_env(Arc::new(TracingUsageSink))?;
        let proposer = LlmNameProposer::new(Arc::new(gateway), "openai/gpt-5-mini");
        engine = engine.with_proposer(Arc::new(proposer));
    }

    let result = engine.classify(&request).await;

    // -- Interpret results ---------------------------------------------------

    println!("primary axes: {:?}", result.primary_axes);
    println!("normalized:   {:?}", result.normalized_scores);
    if let Some(threshold) = result.threshold {
        println!("threshold:    {:.1}", threshold.axis_a);
    }
    println!("fallback:     {}", result.generation_meta.fallback_used);
    println!();

    for record in &result.types {
        let marker = if result.assigned_type.as_deref() == Some(record.name.as_str()) {
            "*"
        } else {
            " "
        };
        println!(
            "{marker} {:<14} [{}] {:?}: {}",
            record.name,
            record.cell.code(),
            record.source,
            record.description
        );
    }

    Ok(())
}
