use std::path::PathBuf;
use thiserror::Error;

use crate::models::RecordError;

/// All errors produced by the sim-trace analyzer.
#[derive(Error, Debug)]
pub enum AnalyzerError {
    /// A log or track file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No metadata marker line was found in the log file.
    ///
    /// Without the run metadata there is no world/model identity, so the
    /// file cannot be labeled downstream.
    #[error("No metadata record found in {0}")]
    MissingMetadata(PathBuf),

    /// A sentinel-prefixed step line could not be coerced into a record.
    #[error("Malformed step record at line {line}: {source}")]
    MalformedRecord {
        line: usize,
        #[source]
        source: RecordError,
    },

    /// The aggregator was handed an empty step sequence.
    #[error("No step records to summarize")]
    EmptyInput,

    /// The metadata record is missing a required key.
    #[error("Metadata is missing required key: {0}")]
    MetadataKey(String),

    /// The model name could not be derived from the S3 object key.
    #[error("Cannot derive model name from object key: {0}")]
    ModelName(String),

    /// A track waypoint line does not hold the expected six columns.
    #[error("Malformed track waypoint in {path} at line {line}")]
    TrackFormat { path: PathBuf, line: usize },

    /// An error originating from the figure rendering backend.
    #[error("Render error: {0}")]
    Render(String),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Catch-all for errors from third-party crates via `anyhow`.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convenience alias used throughout the simtrace crates.
pub type Result<T> = std::result::Result<T, AnalyzerError>;
