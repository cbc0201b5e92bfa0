mod batch;
mod bootstrap;

use std::path::Path;

use anyhow::Result;
use simtrace_core::models::EpisodeSummary;
use simtrace_core::settings::Settings;
use simtrace_data::aggregator;
use simtrace_data::analysis::{self, RunAnalysis};
use simtrace_data::extractor::MalformedPolicy;
use simtrace_render::figure;
use simtrace_render::track::Track;

fn main() -> Result<()> {
    let settings = Settings::load_with_last_used();

    bootstrap::setup_logging(&settings.log_level, settings.log_file.as_ref())?;
    bootstrap::ensure_directories(&settings)?;

    tracing::info!("simtrace v{} starting", env!("CARGO_PKG_VERSION"));

    let policy = if settings.abort_on_malformed() {
        MalformedPolicy::Abort
    } else {
        MalformedPolicy::Skip
    };

    match &settings.input {
        Some(path) => {
            if !path.is_file() {
                anyhow::bail!("log file does not exist: {}", path.display());
            }
            process_file(path, policy, &settings)?;
        }
        None => run_batch(policy, &settings)?,
    }

    Ok(())
}

// ── Single-file processing ────────────────────────────────────────────────────

/// Analyze one log file and render its figures.
fn process_file(
    path: &Path,
    policy: MalformedPolicy,
    settings: &Settings,
) -> simtrace_core::Result<()> {
    let analysis = analysis::analyze_file(path, policy)?;
    let track = Track::lookup(&settings.tracks_dir, &analysis.identity.world_name)?;

    let top = aggregator::select_top(&analysis.summaries, settings.top as usize);
    figure::render_top_figure(
        &settings.img_dir,
        &analysis.identity,
        &top,
        &analysis.steps,
        track.as_ref(),
    )?;

    // A separate single-best figure, useful for picking the submission lap.
    let best = aggregator::select_top(&analysis.summaries, 1);
    figure::render_top_figure(
        &settings.img_dir,
        &analysis.identity,
        &best,
        &analysis.steps,
        track.as_ref(),
    )?;

    figure::render_reward_summary(
        &settings.img_dir,
        &analysis.identity,
        &analysis.steps,
        track.as_ref(),
    )?;

    print_summary(&analysis, &top);
    Ok(())
}

/// Print the run identity and the ranked summary table.
fn print_summary(analysis: &RunAnalysis, top: &[EpisodeSummary]) {
    println!("WorldName:{}", analysis.identity.world_name);
    println!("ModelName:{}", analysis.identity.model_name);
    println!(
        "{:>7} {:>6} {:>10} {:>9} {:>8}  {}",
        "episode", "steps", "rewards", "completed", "laptime", "status"
    );
    for row in top {
        println!(
            "{:>7} {:>6} {:>10.3} {:>9.2} {:>8.3}  {}",
            row.episode, row.steps, row.rewards, row.completed, row.laptime, row.status
        );
    }
    println!(
        "{} episodes, {} records ({} rejected)",
        analysis.report.episodes, analysis.report.records_parsed, analysis.report.records_rejected
    );
}

// ── Batch processing ──────────────────────────────────────────────────────────

/// Process every simulator log under the logs directory, then archive the
/// ones that succeeded. One file's failure never aborts the batch.
fn run_batch(policy: MalformedPolicy, settings: &Settings) -> Result<()> {
    let files = batch::find_log_files(&settings.logs_dir, &settings.pattern);
    if files.is_empty() {
        println!(
            "no '{}' logs under {}",
            settings.pattern,
            settings.logs_dir.display()
        );
        return Ok(());
    }

    for file in &files {
        println!("{}", file.display());
    }

    if !settings.yes {
        let prompt = format!("process all {} file(s)? (Y/N)", files.len());
        if !confirm(&prompt)? {
            println!("bye");
            return Ok(());
        }
    }

    let mut failures = 0usize;
    for file in &files {
        if let Err(err) = process_file(file, policy, settings) {
            failures += 1;
            tracing::error!("failed to process {}: {}", file.display(), err);
            continue;
        }

        if !settings.keep {
            match batch::archive_file(file, &settings.logs_dir) {
                Ok(dest) => tracing::debug!("archived {} -> {}", file.display(), dest.display()),
                Err(err) => tracing::warn!("could not archive {}: {}", file.display(), err),
            }
        }
    }

    if failures > 0 {
        println!("{} of {} file(s) failed", failures, files.len());
    }

    Ok(())
}

/// Ask for confirmation on stdin; only a literal `Y` proceeds.
fn confirm(prompt: &str) -> std::io::Result<bool> {
    println!("{prompt}");
    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    Ok(answer.trim() == "Y")
}
