//! Core types for the sim-trace analyzer.
//!
//! Defines the step/episode/metadata data model, the field coercion rules
//! used by the extractor, the shared error taxonomy and the CLI settings.

pub mod error;
pub mod models;
pub mod settings;

pub use error::{AnalyzerError, Result};
