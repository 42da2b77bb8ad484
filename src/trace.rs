//! Per-run trace capture.
//!
//! One [`RunTrace`] per classification run carrying the logged run fields.
//! [`JsonlRunTraceSink`] writes them as JSON lines from a background thread so
//! the async run never blocks on file IO.

use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::mpsc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::classify::ThresholdPair;
use crate::engine::RunStage;
use crate::types::FailureCode;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunTrace {
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
    pub run_id: Uuid,
    pub algorithm_version: String,
    pub input_hash: String,
    pub stage_trail: Vec<RunStage>,
    pub generation_time_ms: u64,
    pub retry_count: usize,
    pub fallback_used: bool,
    pub variance: Option<f64>,
    pub threshold_used: Option<ThresholdPair>,
    pub discarded_names: Vec<String>,
    pub type_count: usize,
    pub neutral_variant_included: bool,
    pub plain_name_count: usize,
    pub failure_code: Option<FailureCode>,
    pub type_names: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(String),
    #[error("trace channel closed")]
    Closed,
    #[error("trace worker failed: {0}")]
    Join(String),
}

pub trait RunTraceSink: Send + Sync {
    fn record(&self, trace: RunTrace) -> Result<(), TraceError>;
}

/// Appends one JSON object per run to a file.
///
/// The file is written by the paired [`TraceWorker`]; join it after the last
/// sink clone is dropped to flush.
#[derive(Clone)]
pub struct JsonlRunTraceSink {
    sender: mpsc::Sender<RunTrace>,
}

pub struct TraceWorker {
    handle: Option<std::thread::JoinHandle<Result<usize, TraceError>>>,
}

impl TraceWorker {
    /// Wait for the writer to drain. Returns the number of traces written.
    pub fn join(mut self) -> Result<usize, TraceError> {
        match self.handle.take() {
            Some(handle) => match handle.join() {
                Ok(result) => result,
                Err(_) => Err(TraceError::Join("trace worker panicked".to_string())),
            },
            None => Ok(0),
        }
    }
}

impl JsonlRunTraceSink {
    pub fn new(path: impl AsRef<Path>) -> Result<(Self, TraceWorker), TraceError> {
        let file = std::fs::File::create(path)?;
        let (sender, receiver) = mpsc::channel::<RunTrace>();
        let handle = std::thread::spawn(move || write_trace_loop(file, receiver));
        Ok((
            Self { sender },
            TraceWorker {
                handle: Some(handle),
            },
        ))
    }
}

impl RunTraceSink for JsonlRunTraceSink {
    fn record(&self, trace: RunTrace) -> Result<(), TraceError> {
        self.sender.send(trace).map_err(|_| TraceError::Closed)
    }
}

fn write_trace_loop(
    file: std::fs::File,
    receiver: mpsc::Receiver<RunTrace>,
) -> Result<usize, TraceError> {
    let mut writer = BufWriter::new(file);
    let mut written = 0;
    for trace in receiver {
        let line = serde_json::to_string(&trace).map_err(|e| TraceError::Serde(e.to_string()))?;
        writeln!(writer, "{line}")?;
        written += 1;
    }
    writer.flush()?;
    Ok(written)
}
