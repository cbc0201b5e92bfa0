//! Diagnostic figure rendering.
//!
//! Two figures per run, mirroring what the simulator operators look at:
//! a 2×2 panel of top-episode trajectories colored by speed / steering /
//! reward with a summary table, and a whole-run reward scatter.

use std::path::{Path, PathBuf};

use plotters::coord::cartesian::Cartesian2d;
use plotters::coord::types::RangedCoordf64;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::{FontDesc, FontFamily, FontStyle};

use simtrace_core::models::{EpisodeSummary, RunIdentity, StepRecord};
use simtrace_core::{AnalyzerError, Result};

use crate::colormap::Scale;
use crate::track::Track;

const FIGURE_SIZE: (u32, u32) = (1600, 1600);
const SUMMARY_SIZE: (u32, u32) = (1200, 1200);
const DOT_RADIUS: i32 = 3;

const TRACK_GREY: RGBColor = RGBColor(128, 128, 128);
const BORDER_BROWN: RGBColor = RGBColor(165, 42, 42);

fn render_err(err: impl std::fmt::Display) -> AnalyzerError {
    AnalyzerError::Render(err.to_string())
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Render the top-episode figure: speed, steering-angle and reward
/// trajectory panels plus a summary table, titled
/// `<model> Top <n> Episode`. Returns the written path
/// `<img_dir>/<model>_top<n>.png`.
pub fn render_top_figure(
    img_dir: &Path,
    identity: &RunIdentity,
    top: &[EpisodeSummary],
    steps: &[StepRecord],
    track: Option<&Track>,
) -> Result<PathBuf> {
    let out = top_figure_path(img_dir, &identity.model_name, top.len());
    let out_path = out.clone();

    let root = BitMapBackend::new(&out_path, FIGURE_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(render_err)?;

    let title = format!("{} Top {} Episode", identity.model_name, top.len());
    let root = root
        .titled(
            &title,
            FontDesc::new(FontFamily::SansSerif, 42.0, FontStyle::Bold),
        )
        .map_err(render_err)?;

    let panels = root.split_evenly((2, 2));

    let top_steps: Vec<&StepRecord> = top
        .iter()
        .flat_map(|summary| steps.iter().filter(move |s| s.episode == summary.episode))
        .collect();
    let bounds = plot_bounds(top_steps.iter().copied(), track);

    draw_trajectory_panel(&panels[0], "Speed", |s| s.speed, top, steps, track, bounds)?;
    draw_trajectory_panel(
        &panels[1],
        "Steering Angle",
        |s| s.steering_angle,
        top,
        steps,
        track,
        bounds,
    )?;
    draw_trajectory_panel(&panels[2], "Reward", |s| s.reward, top, steps, track, bounds)?;
    draw_summary_table(&panels[3], top)?;

    root.present().map_err(render_err)?;
    Ok(out)
}

/// Render the whole-run reward scatter, titled `<model> Summary`.
/// Returns the written path `<img_dir>/<model>_summary.png`.
pub fn render_reward_summary(
    img_dir: &Path,
    identity: &RunIdentity,
    steps: &[StepRecord],
    track: Option<&Track>,
) -> Result<PathBuf> {
    let out = summary_figure_path(img_dir, &identity.model_name);
    let out_path = out.clone();

    let root = BitMapBackend::new(&out_path, SUMMARY_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(render_err)?;

    // Low-reward points first so the high-reward line stays visible on top.
    let mut ordered: Vec<&StepRecord> = steps.iter().collect();
    ordered.sort_by(|a, b| a.reward.total_cmp(&b.reward));

    let bounds = plot_bounds(ordered.iter().copied(), track);
    let (min_x, min_y, max_x, max_y) = bounds;

    let title = format!("{} Summary", identity.model_name);
    let mut chart = ChartBuilder::on(&root)
        .margin(30)
        .caption(
            &title,
            FontDesc::new(FontFamily::SansSerif, 36.0, FontStyle::Bold),
        )
        .set_label_area_size(LabelAreaPosition::Left, 60)
        .set_label_area_size(LabelAreaPosition::Bottom, 50)
        .build_cartesian_2d(min_x..max_x, min_y..max_y)
        .map_err(render_err)?;

    configure_axes(&mut chart)?;
    draw_track(&mut chart, track)?;

    let scale = Scale::fit(ordered.iter().map(|s| s.reward));
    chart
        .draw_series(
            ordered
                .iter()
                .map(|s| Circle::new((s.x, s.y), DOT_RADIUS, scale.color(s.reward).filled())),
        )
        .map_err(render_err)?;

    root.present().map_err(render_err)?;
    Ok(out)
}

// ── Panel drawing ─────────────────────────────────────────────────────────────

fn draw_trajectory_panel<DB>(
    area: &DrawingArea<DB, Shift>,
    title: &str,
    metric: impl Fn(&StepRecord) -> f64,
    top: &[EpisodeSummary],
    steps: &[StepRecord],
    track: Option<&Track>,
    bounds: (f64, f64, f64, f64),
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let (min_x, min_y, max_x, max_y) = bounds;

    let mut chart = ChartBuilder::on(area)
        .margin(20)
        .caption(title, FontDesc::new(FontFamily::SansSerif, 30.0, FontStyle::Normal))
        .set_label_area_size(LabelAreaPosition::Left, 55)
        .set_label_area_size(LabelAreaPosition::Bottom, 45)
        .build_cartesian_2d(min_x..max_x, min_y..max_y)
        .map_err(render_err)?;

    configure_axes(&mut chart)?;
    draw_track(&mut chart, track)?;

    // Faint full trajectory per ranked episode, in log order.
    for summary in top {
        let line: Vec<(f64, f64)> = steps
            .iter()
            .filter(|s| s.episode == summary.episode)
            .map(|s| (s.x, s.y))
            .collect();
        chart
            .draw_series(LineSeries::new(line, TRACK_GREY.mix(0.3)))
            .map_err(render_err)?;
    }

    // Metric-colored scatter over every step of the ranked episodes.
    let top_steps: Vec<&StepRecord> = top
        .iter()
        .flat_map(|summary| steps.iter().filter(move |s| s.episode == summary.episode))
        .collect();
    let scale = Scale::fit(top_steps.iter().map(|s| metric(s)));
    chart
        .draw_series(
            top_steps
                .iter()
                .map(|s| Circle::new((s.x, s.y), DOT_RADIUS, scale.color(metric(s)).filled())),
        )
        .map_err(render_err)?;

    Ok(())
}

fn draw_summary_table<DB>(area: &DrawingArea<DB, Shift>, top: &[EpisodeSummary]) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let font = FontDesc::new(FontFamily::Monospace, 22.0, FontStyle::Normal);

    let header = format!(
        "{:>7} {:>6} {:>10} {:>9} {:>8}  {}",
        "episode", "steps", "rewards", "completed", "laptime", "status"
    );
    area.draw(&Text::new(header, (60, 80), font.clone().color(&BLACK)))
        .map_err(render_err)?;

    for (i, row) in top.iter().enumerate() {
        let line = format!(
            "{:>7} {:>6} {:>10.3} {:>9.2} {:>8.3}  {}",
            row.episode, row.steps, row.rewards, row.completed, row.laptime, row.status
        );
        area.draw(&Text::new(
            line,
            (60, 120 + 32 * i as i32),
            font.clone().color(&BLACK),
        ))
        .map_err(render_err)?;
    }

    Ok(())
}

// ── Shared helpers ────────────────────────────────────────────────────────────

type PanelChart<'a, DB> = ChartContext<'a, DB, Cartesian2d<RangedCoordf64, RangedCoordf64>>;

fn configure_axes<DB>(chart: &mut PanelChart<'_, DB>) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    chart
        .configure_mesh()
        .disable_mesh()
        .x_label_formatter(&|v| format!("{v:.1}"))
        .y_label_formatter(&|v| format!("{v:.1}"))
        .label_style(FontDesc::new(FontFamily::SansSerif, 16.0, FontStyle::Normal))
        .draw()
        .map_err(render_err)?;
    Ok(())
}

fn draw_track<DB>(chart: &mut PanelChart<'_, DB>, track: Option<&Track>) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let Some(track) = track else {
        return Ok(());
    };

    chart
        .draw_series(LineSeries::new(
            track.center.iter().copied(),
            TRACK_GREY.mix(0.5),
        ))
        .map_err(render_err)?;
    chart
        .draw_series(LineSeries::new(track.inner.iter().copied(), &BORDER_BROWN))
        .map_err(render_err)?;
    chart
        .draw_series(LineSeries::new(track.outer.iter().copied(), &BORDER_BROWN))
        .map_err(render_err)?;

    Ok(())
}

/// Axis bounds covering the given steps and the track, padded 5%.
fn plot_bounds<'a>(
    steps: impl Iterator<Item = &'a StepRecord>,
    track: Option<&Track>,
) -> (f64, f64, f64, f64) {
    let mut min_x = f64::INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut max_y = f64::NEG_INFINITY;

    let mut cover = |x: f64, y: f64| {
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x);
        max_y = max_y.max(y);
    };

    for s in steps {
        cover(s.x, s.y);
    }
    if let Some((tx0, ty0, tx1, ty1)) = track.and_then(Track::bounds) {
        cover(tx0, ty0);
        cover(tx1, ty1);
    }

    if !min_x.is_finite() || !min_y.is_finite() {
        return (0.0, 0.0, 1.0, 1.0);
    }

    let pad = 0.05 * (max_x - min_x).max(max_y - min_y).max(1e-6);
    (min_x - pad, min_y - pad, max_x + pad, max_y + pad)
}

fn top_figure_path(img_dir: &Path, model_name: &str, n: usize) -> PathBuf {
    img_dir.join(format!("{model_name}_top{n}.png"))
}

fn summary_figure_path(img_dir: &Path, model_name: &str) -> PathBuf {
    img_dir.join(format!("{model_name}_summary.png"))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
