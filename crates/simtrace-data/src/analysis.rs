//! Single-file analysis pipeline.
//!
//! Composes extraction, identity resolution and aggregation, returning a
//! [`RunAnalysis`] ready for the rendering layer.

use std::path::Path;

use chrono::Utc;
use simtrace_core::models::{EpisodeSummary, RunIdentity, RunMetadata, StepRecord};
use simtrace_core::Result;
use tracing::info;

use crate::aggregator;
use crate::extractor::{self, MalformedPolicy};

// ── Public types ──────────────────────────────────────────────────────────────

/// Diagnostics produced alongside the analysis result.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RunReport {
    /// ISO-8601 timestamp when this result was generated.
    pub generated_at: String,
    /// Total lines scanned in the log file.
    pub lines_scanned: usize,
    /// Step records successfully parsed.
    pub records_parsed: usize,
    /// Step records rejected under the skip policy.
    pub records_rejected: usize,
    /// Number of episodes summarized.
    pub episodes: usize,
    /// Wall-clock seconds spent reading and extracting the log file.
    pub load_time_seconds: f64,
}

/// The complete output of [`analyze_file`].
#[derive(Debug, Clone)]
pub struct RunAnalysis {
    /// Step records in log order.
    pub steps: Vec<StepRecord>,
    /// The raw metadata mapping.
    pub metadata: RunMetadata,
    /// World and model naming derived from the metadata.
    pub identity: RunIdentity,
    /// Per-episode summaries, ordered by episode id.
    pub summaries: Vec<EpisodeSummary>,
    /// Diagnostics about this run.
    pub report: RunReport,
}

// ── Public function ───────────────────────────────────────────────────────────

/// Run the full single-file pipeline.
///
/// 1. Extract step records and metadata from the log at `path`.
/// 2. Resolve the run identity (world and model names).
/// 3. Aggregate steps into per-episode summaries.
///
/// Failures are file-scoped; the caller decides whether a batch continues.
pub fn analyze_file(path: &Path, policy: MalformedPolicy) -> Result<RunAnalysis> {
    let load_start = std::time::Instant::now();
    let extraction = extractor::extract_file(path, policy)?;
    let load_time = load_start.elapsed().as_secs_f64();

    let identity = extraction.metadata.identity()?;
    info!(
        "WorldName:{} ModelName:{}",
        identity.world_name, identity.model_name
    );

    let summaries = aggregator::aggregate(&extraction.steps)?;

    let report = RunReport {
        generated_at: Utc::now().to_rfc3339(),
        lines_scanned: extraction.lines_scanned,
        records_parsed: extraction.steps.len(),
        records_rejected: extraction.records_rejected,
        episodes: summaries.len(),
        load_time_seconds: load_time,
    };

    Ok(RunAnalysis {
        steps: extraction.steps,
        metadata: extraction.metadata,
        identity,
        summaries,
        report,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
