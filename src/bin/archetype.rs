#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, EnvFilter};

use archetype_engine::gateway::{ProviderGateway, TracingUsageSink};
use archetype_engine::preset::preset_records;
use archetype_engine::scoring::normalize;
use archetype_engine::{
    load_config_from_path, AxisDefinition, AxisSet, ChoiceWeightVector, ClassificationEngine,
    ClassificationRequest, EngineConfig, JsonlRunTraceSink, LlmNameProposer, RunTraceSink,
};

#[derive(Parser)]
#[command(name = "archetype", version, about = "Adaptive scoring and type classification")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Accumulate a session's chosen options into raw and normalized scores
    Score {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Classify a request JSON into a type set
    Classify {
        #[arg(long)]
        request: PathBuf,
        #[arg(long)]
        out: Option<PathBuf>,
        /// OpenRouter model for name proposals; plain names only when omitted
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        config: Option<PathBuf>,
        /// Append a JSONL run trace to this file
        #[arg(long)]
        trace: Option<PathBuf>,
    },
    /// Print the fixed preset taxonomy
    Preset {
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScoreInput {
    session_id: String,
    axes: Vec<AxisDefinition>,
    choices: Vec<ChoiceWeightVector>,
}

/// Doubles as a classification request.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ScoreOutput {
    session_id: String,
    axes: Vec<AxisDefinition>,
    raw_scores: BTreeMap<String, f64>,
    normalized_scores: BTreeMap<String, f64>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("RUST_LOG")
        .or_else(|_| EnvFilter::try_from_env("LOG_LEVEL"))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig, Box<dyn std::error::Error>> {
    match path {
        Some(path) => Ok(load_config_from_path(path)?),
        None => Ok(EngineConfig::default()),
    }
}

fn write_json<T: Serialize>(value: &T, out: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let json = serde_json::to_string_pretty(value)?;
    match out {
        Some(path) => {
            let mut file = File::create(path)?;
            writeln!(file, "{json}")?;
        }
        None => {
            let mut stdout = io::stdout().lock();
            writeln!(stdout, "{json}")?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Score { input, out, config } => {
            let config = load_config(config.as_deref())?;
            let input: ScoreInput = serde_json::from_str(&std::fs::read_to_string(input)?)?;
            let axes = AxisSet::new(input.axes)?;
            let request =
                ClassificationRequest::from_choices(input.session_id, axes, &input.choices, &config)?;
            let (axes, raw) = request.validate(&config)?;
            let normalized = normalize(&raw);

            let output = ScoreOutput {
                session_id: request.session_id,
                axes: axes.as_slice().to_vec(),
                raw_scores: raw.to_map(&axes),
                normalized_scores: axes
                    .iter()
                    .zip(normalized.values())
                    .map(|(axis, v)| (axis.id.clone(), *v))
                    .collect(),
            };
            write_json(&output, out.as_deref())?;
        }
        Commands::Classify {
            request,
            out,
            model,
            config,
            trace,
        } => {
            let config = load_config(config.as_deref())?;
            let request: ClassificationRequest =
                serde_json::from_str(&std::fs::read_to_string(request)?)?;

            let mut engine = ClassificationEngine::new(config)?;
            if let Some(model) = model {
                let gateway = Arc::new(ProviderGateway::from_env(Arc::new(TracingUsageSink))?);
                engine = engine.with_proposer(Arc::new(LlmNameProposer::new(gateway, model)));
            }

            let worker = match trace {
                Some(path) => {
                    let (sink, worker) = JsonlRunTraceSink::new(path)?;
                    let sink: Arc<dyn RunTraceSink> = Arc::new(sink);
                    engine = engine.with_trace_sink(sink);
                    Some(worker)
                }
                None => None,
            };

            let result = engine.classify(&request).await;
            // Drop the engine so the trace sender closes before joining.
            drop(engine);
            if let Some(worker) = worker {
                worker.join()?;
            }

            write_json(&result, out.as_deref())?;
        }
        Commands::Preset { out } => {
            write_json(&preset_records(&[]), out.as_deref())?;
        }
    }

    Ok(())
}
