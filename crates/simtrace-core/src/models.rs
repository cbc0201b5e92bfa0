use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::AnalyzerError;

/// Number of comma-separated fields in a step record line.
pub const STEP_FIELD_COUNT: usize = 16;

// ── RecordError ───────────────────────────────────────────────────────────────

/// Why a single step line was rejected.
///
/// A record is rejected as a whole: the first failing field wins and the
/// record is never partially populated.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordError {
    /// The line did not split into exactly [`STEP_FIELD_COUNT`] fields.
    #[error("expected 16 fields, found {0}")]
    FieldCount(usize),

    /// A field value failed to coerce to its declared type.
    #[error("field `{field}` does not parse as {kind}: {value:?}")]
    Field {
        field: &'static str,
        kind: &'static str,
        value: String,
    },

    /// The progress field is outside the valid 0–100 range.
    #[error("field `progress` out of range [0, 100]: {0}")]
    ProgressRange(f64),
}

// ── Field coercion helpers ────────────────────────────────────────────────────

fn parse_u32(field: &'static str, raw: &str) -> Result<u32, RecordError> {
    raw.trim().parse().map_err(|_| RecordError::Field {
        field,
        kind: "int",
        value: raw.to_string(),
    })
}

fn parse_i32(field: &'static str, raw: &str) -> Result<i32, RecordError> {
    raw.trim().parse().map_err(|_| RecordError::Field {
        field,
        kind: "int",
        value: raw.to_string(),
    })
}

fn parse_f64(field: &'static str, raw: &str) -> Result<f64, RecordError> {
    raw.trim().parse().map_err(|_| RecordError::Field {
        field,
        kind: "float",
        value: raw.to_string(),
    })
}

/// Booleans arrive as the simulator emits them: exactly `True` or `False`.
fn parse_bool(field: &'static str, raw: &str) -> Result<bool, RecordError> {
    match raw.trim() {
        "True" => Ok(true),
        "False" => Ok(false),
        other => Err(RecordError::Field {
            field,
            kind: "bool",
            value: other.to_string(),
        }),
    }
}

// ── StepRecord ────────────────────────────────────────────────────────────────

/// One simulation step parsed from a `SIM_TRACE_LOG:` line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    /// Episode id this step belongs to.
    pub episode: u32,
    /// Step index within the episode.
    pub step: u32,
    /// Car x-coordinate on the track plane.
    pub x: f64,
    /// Car y-coordinate on the track plane.
    pub y: f64,
    /// Heading angle in degrees.
    pub heading: f64,
    /// Commanded steering angle in degrees.
    pub steering_angle: f64,
    /// Commanded speed.
    pub speed: f64,
    /// Index of the action chosen by the policy.
    pub action_taken: i32,
    /// Reward granted for this step.
    pub reward: f64,
    /// Whether the episode's job finished at this step.
    pub job_completed: bool,
    /// Whether all wheels were on the track surface.
    pub all_wheels_on_track: bool,
    /// Percentage of the track completed, 0–100.
    pub progress: f64,
    /// Index of the nearest track waypoint.
    pub closest_waypoint_index: u32,
    /// Total track length.
    pub track_length: f64,
    /// Seconds-since-epoch timestamp, kept in its recorded string form.
    ///
    /// Validated to parse as a decimal at record-parse time; the string is
    /// retained so the recorded precision survives untouched.
    pub timestamp: String,
    /// Episode status reported by the simulator (e.g. `off_track`).
    pub status: String,
}

impl StepRecord {
    /// Coerce the 16 positional fields of a step line into a typed record.
    ///
    /// Field order: episode, step, x, y, heading, steering_angle, speed,
    /// action_taken, reward, job_completed, all_wheels_on_track, progress,
    /// closest_waypoint_index, track_length, timestamp, status.
    ///
    /// Any failing field rejects the whole record.
    pub fn from_fields(fields: &[&str]) -> Result<Self, RecordError> {
        if fields.len() != STEP_FIELD_COUNT {
            return Err(RecordError::FieldCount(fields.len()));
        }

        let progress = parse_f64("progress", fields[11])?;
        if !(0.0..=100.0).contains(&progress) {
            return Err(RecordError::ProgressRange(progress));
        }

        // The timestamp stays a string, but it must hold a decimal value so
        // that laptime arithmetic downstream cannot fail.
        let timestamp = fields[14].trim();
        parse_f64("timestamp", timestamp)?;

        Ok(StepRecord {
            episode: parse_u32("episode", fields[0])?,
            step: parse_u32("step", fields[1])?,
            x: parse_f64("x", fields[2])?,
            y: parse_f64("y", fields[3])?,
            heading: parse_f64("heading", fields[4])?,
            steering_angle: parse_f64("steering_angle", fields[5])?,
            speed: parse_f64("speed", fields[6])?,
            action_taken: parse_i32("action_taken", fields[7])?,
            reward: parse_f64("reward", fields[8])?,
            job_completed: parse_bool("job_completed", fields[9])?,
            all_wheels_on_track: parse_bool("all_wheels_on_track", fields[10])?,
            progress,
            closest_waypoint_index: parse_u32("closest_waypoint_index", fields[12])?,
            track_length: parse_f64("track_length", fields[13])?,
            timestamp: timestamp.to_string(),
            status: fields[15].trim().to_string(),
        })
    }

    /// The timestamp as seconds since epoch.
    ///
    /// `None` only for hand-built records that bypassed [`from_fields`].
    pub fn timestamp_secs(&self) -> Option<f64> {
        self.timestamp.parse().ok()
    }
}

// ── RunMetadata ───────────────────────────────────────────────────────────────

/// The key–value mapping parsed from the single embedded metadata record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    values: HashMap<String, String>,
}

impl RunMetadata {
    pub fn new(values: HashMap<String, String>) -> Self {
        Self { values }
    }

    /// Look up a metadata value by key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The track identifier recorded for this run.
    pub fn world_name(&self) -> crate::error::Result<&str> {
        self.get("WORLD_NAME")
            .ok_or_else(|| AnalyzerError::MetadataKey("WORLD_NAME".to_string()))
    }

    /// The trained-model name, extracted from the S3 object key.
    ///
    /// The key embeds the name as `.../models/<name>/metrics/...`; the name
    /// is the substring between the fixed `models` and `metrics` markers.
    pub fn model_name(&self) -> crate::error::Result<String> {
        let key = self
            .get("METRICS_S3_OBJECT_KEY")
            .ok_or_else(|| AnalyzerError::MetadataKey("METRICS_S3_OBJECT_KEY".to_string()))?;

        let models = key
            .find("models")
            .ok_or_else(|| AnalyzerError::ModelName(key.to_string()))?;
        let metrics = key
            .find("metrics")
            .ok_or_else(|| AnalyzerError::ModelName(key.to_string()))?;

        // Skip "models" plus its path separator; drop the separator before
        // "metrics".
        let start = models + "models".len() + 1;
        if metrics < 1 || start > metrics - 1 {
            return Err(AnalyzerError::ModelName(key.to_string()));
        }

        key.get(start..metrics - 1)
            .map(str::to_string)
            .ok_or_else(|| AnalyzerError::ModelName(key.to_string()))
    }

    /// Resolve the explicit run identity consumed by downstream layers.
    pub fn identity(&self) -> crate::error::Result<RunIdentity> {
        Ok(RunIdentity {
            world_name: self.world_name()?.to_string(),
            model_name: self.model_name()?,
        })
    }
}

/// World and model naming for one run, passed explicitly to the
/// aggregation and presentation layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunIdentity {
    /// Track identifier (`WORLD_NAME`).
    pub world_name: String,
    /// Trained-model name derived from the metrics object key.
    pub model_name: String,
}

// ── EpisodeSummary ────────────────────────────────────────────────────────────

/// Aggregated statistics for one episode.
///
/// Produced once by the aggregator and immutable thereafter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeSummary {
    /// Episode id.
    pub episode: u32,
    /// Maximum step index observed in the episode.
    pub steps: u32,
    /// Sum of step rewards, rounded to 3 decimal places.
    pub rewards: f64,
    /// Maximum progress reached, rounded to 2 decimal places.
    pub completed: f64,
    /// Elapsed seconds between first and last step, rounded to 3 decimals.
    pub laptime: f64,
    /// Status of the episode's last step in log order.
    pub status: String,
}

// ── Tests ─────────────────────────────────────────────────────────────────────
