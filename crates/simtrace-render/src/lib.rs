//! Figure rendering for the sim-trace analyzer.
//!
//! Turns the step table and episode summaries into PNG diagnostics: per-metric
//! trajectory overlays for the top-ranked episodes and a whole-run reward
//! scatter, optionally drawn over the course geometry.

pub mod colormap;
pub mod figure;
pub mod track;

pub use simtrace_core as core;
