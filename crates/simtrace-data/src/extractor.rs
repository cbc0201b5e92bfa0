//! Trace-log extraction for the sim-trace analyzer.
//!
//! Scans a raw simulator log line by line and produces typed
//! [`StepRecord`]s plus the single [`RunMetadata`] record embedded in the
//! stream.

use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;

use regex::Regex;
use simtrace_core::models::{RunMetadata, StepRecord};
use simtrace_core::{AnalyzerError, Result};
use tracing::{debug, warn};

/// Prefix marking a step record line; the payload follows the colon.
pub const STEP_SENTINEL: &str = "SIM_TRACE_LOG:";

/// Marker substring identifying the run-metadata line.
pub const METADATA_MARKER: &str = "METRICS_S3_BUCKET";

// ── Policy ────────────────────────────────────────────────────────────────────

/// What to do with a sentinel line that fails to parse into a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MalformedPolicy {
    /// Reject the line, log it with its line number, keep processing.
    #[default]
    Skip,
    /// Fail the whole file on the first bad line.
    Abort,
}

// ── Extraction result ─────────────────────────────────────────────────────────

/// Everything pulled out of one log file.
#[derive(Debug, Clone)]
pub struct Extraction {
    /// Step records in log order (not sorted by episode or step).
    pub steps: Vec<StepRecord>,
    /// The run metadata; when several metadata lines exist, the last wins.
    pub metadata: RunMetadata,
    /// Total lines scanned.
    pub lines_scanned: usize,
    /// Sentinel lines rejected under [`MalformedPolicy::Skip`].
    pub records_rejected: usize,
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Extract step records and run metadata from the log file at `path`.
///
/// A line starting with [`STEP_SENTINEL`] is comma-split into exactly 16
/// positional fields and coerced via [`StepRecord::from_fields`]; any
/// failure rejects the whole record per `policy`. A line containing
/// [`METADATA_MARKER`] carries the metadata payload between its first `{`
/// and last `}`.
///
/// Fails with `FileRead` when the file cannot be opened or read, with
/// `MissingMetadata` when no metadata line exists in the entire file, and
/// with `MalformedRecord` under [`MalformedPolicy::Abort`].
pub fn extract_file(path: &Path, policy: MalformedPolicy) -> Result<Extraction> {
    let file = std::fs::File::open(path).map_err(|source| AnalyzerError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let reader = std::io::BufReader::new(file);

    let mut steps: Vec<StepRecord> = Vec::new();
    let mut metadata: Option<RunMetadata> = None;
    let mut lines_scanned = 0usize;
    let mut records_rejected = 0usize;

    for (index, line_result) in reader.lines().enumerate() {
        let line_no = index + 1;
        let line = line_result.map_err(|source| AnalyzerError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        lines_scanned += 1;

        if let Some(payload) = line.strip_prefix(STEP_SENTINEL) {
            let fields: Vec<&str> = payload.split(',').collect();
            match StepRecord::from_fields(&fields) {
                Ok(record) => steps.push(record),
                Err(source) => match policy {
                    MalformedPolicy::Skip => {
                        records_rejected += 1;
                        warn!(
                            "Rejected step record at {}:{}: {}",
                            path.display(),
                            line_no,
                            source
                        );
                    }
                    MalformedPolicy::Abort => {
                        return Err(AnalyzerError::MalformedRecord {
                            line: line_no,
                            source,
                        });
                    }
                },
            }
            continue;
        }

        if line.contains(METADATA_MARKER) {
            match parse_metadata_payload(&line) {
                Some(values) => {
                    if metadata.is_some() {
                        debug!(
                            "Replacing earlier metadata record with line {} (last wins)",
                            line_no
                        );
                    }
                    metadata = Some(RunMetadata::new(values));
                }
                None => warn!(
                    "Metadata marker without parseable payload at {}:{}",
                    path.display(),
                    line_no
                ),
            }
        }
    }

    debug!(
        "File {}: {} lines scanned, {} records, {} rejected",
        path.display(),
        lines_scanned,
        steps.len(),
        records_rejected,
    );

    let metadata = metadata.ok_or_else(|| AnalyzerError::MissingMetadata(path.to_path_buf()))?;

    Ok(Extraction {
        steps,
        metadata,
        lines_scanned,
        records_rejected,
    })
}

// ── Internal helpers ──────────────────────────────────────────────────────────

/// Parse the Python-literal-style mapping between the first `{` and the
/// last `}` of a metadata line.
///
/// Keys are single-quoted strings; values are single-quoted strings or
/// bare scalars (numbers, `True`/`False`). All values are kept in string
/// form. Returns `None` when the braces or every key–value pair are
/// missing.
fn parse_metadata_payload(line: &str) -> Option<HashMap<String, String>> {
    let start = line.find('{')?;
    let end = line.rfind('}')?;
    if end <= start {
        return None;
    }
    let payload = &line[start + 1..end];

    let re = Regex::new(r"'([^']+)'\s*:\s*(?:'([^']*)'|([^,]+))").expect("regex is valid");

    let mut values: HashMap<String, String> = HashMap::new();
    for caps in re.captures_iter(payload) {
        let key = caps[1].to_string();
        let value = match (caps.get(2), caps.get(3)) {
            (Some(quoted), _) => quoted.as_str().to_string(),
            (None, Some(bare)) => bare.as_str().trim().to_string(),
            (None, None) => continue,
        };
        values.insert(key, value);
    }

    if values.is_empty() {
        None
    } else {
        Some(values)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::TempDir;

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn write_log(dir: &Path, name: &str, lines: &[&str]) -> PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        path
    }

    fn step_line(episode: u32, step: u32, progress: f64, reward: f64, timestamp: &str) -> String {
        format!(
            "SIM_TRACE_LOG:{},{},1.0,2.0,90.0,-5.0,2.5,3,{},False,True,{},10,17.6,{},in_progress",
            episode, step, reward, progress, timestamp
        )
    }

    fn metadata_line() -> String {
        "Passing metrics: {'METRICS_S3_BUCKET': 'sim-bucket', \
         'METRICS_S3_OBJECT_KEY': 'run/models/alpha/metrics/training.json', \
         'WORLD_NAME': 'reinvent_base', 'TARGET_REWARD_SCORE': 'None', \
         'NUMBER_OF_EPISODES': 40}"
            .to_string()
    }

    // ── extract_file ──────────────────────────────────────────────────────────

    #[test]
    fn test_extract_basic() {
        let dir = TempDir::new().unwrap();
        let meta = metadata_line();
        let path = write_log(
            dir.path(),
            "run-robomaker.log",
            &[
                "some unrelated preamble",
                &step_line(0, 0, 10.0, 1.0, "100.0"),
                &meta,
                &step_line(0, 1, 20.0, 2.0, "100.5"),
            ],
        );

        let extraction = extract_file(&path, MalformedPolicy::Skip).unwrap();
        assert_eq!(extraction.steps.len(), 2);
        assert_eq!(extraction.lines_scanned, 4);
        assert_eq!(extraction.records_rejected, 0);
        // Log order is preserved.
        assert_eq!(extraction.steps[0].step, 0);
        assert_eq!(extraction.steps[1].step, 1);
        assert_eq!(extraction.metadata.get("WORLD_NAME"), Some("reinvent_base"));
        assert_eq!(extraction.metadata.get("METRICS_S3_BUCKET"), Some("sim-bucket"));
    }

    #[test]
    fn test_extract_bare_scalar_metadata_values() {
        let dir = TempDir::new().unwrap();
        let meta = metadata_line();
        let path = write_log(dir.path(), "a.log", &[&meta, &step_line(0, 0, 1.0, 0.1, "1.0")]);

        let extraction = extract_file(&path, MalformedPolicy::Skip).unwrap();
        assert_eq!(extraction.metadata.get("NUMBER_OF_EPISODES"), Some("40"));
        assert_eq!(extraction.metadata.get("TARGET_REWARD_SCORE"), Some("None"));
    }

    #[test]
    fn test_extract_missing_metadata() {
        let dir = TempDir::new().unwrap();
        let path = write_log(dir.path(), "a.log", &[&step_line(0, 0, 1.0, 0.1, "1.0")]);

        let err = extract_file(&path, MalformedPolicy::Skip).unwrap_err();
        assert!(matches!(err, AnalyzerError::MissingMetadata(_)));
    }

    #[test]
    fn test_extract_last_metadata_wins() {
        let dir = TempDir::new().unwrap();
        let first = "x {'METRICS_S3_BUCKET': 'old-bucket', 'WORLD_NAME': 'old_world'}";
        let second = "x {'METRICS_S3_BUCKET': 'new-bucket', 'WORLD_NAME': 'new_world'}";
        let path = write_log(
            dir.path(),
            "a.log",
            &[first, &step_line(0, 0, 1.0, 0.1, "1.0"), second],
        );

        let extraction = extract_file(&path, MalformedPolicy::Skip).unwrap();
        assert_eq!(extraction.metadata.get("WORLD_NAME"), Some("new_world"));
    }

    #[test]
    fn test_extract_short_line_skipped_under_skip_policy() {
        let dir = TempDir::new().unwrap();
        let meta = metadata_line();
        // 15 fields only.
        let bad = "SIM_TRACE_LOG:0,1,1.0,2.0,90.0,-5.0,2.5,3,1.0,False,True,20.0,10,17.6,100.0";
        let path = write_log(
            dir.path(),
            "a.log",
            &[&meta, bad, &step_line(0, 1, 55.0, 2.5, "100.5")],
        );

        let extraction = extract_file(&path, MalformedPolicy::Skip).unwrap();
        assert_eq!(extraction.steps.len(), 1);
        assert_eq!(extraction.records_rejected, 1);
        assert!((extraction.steps[0].progress - 55.0).abs() < 1e-12);
    }

    #[test]
    fn test_extract_bad_field_aborts_under_abort_policy() {
        let dir = TempDir::new().unwrap();
        let meta = metadata_line();
        let bad =
            "SIM_TRACE_LOG:0,one,1.0,2.0,90.0,-5.0,2.5,3,1.0,False,True,20.0,10,17.6,100.0,ok";
        let path = write_log(dir.path(), "a.log", &[&meta, bad]);

        let err = extract_file(&path, MalformedPolicy::Abort).unwrap_err();
        match err {
            AnalyzerError::MalformedRecord { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_extract_nonexistent_file() {
        let err = extract_file(
            Path::new("/tmp/does-not-exist-simtrace-test.log"),
            MalformedPolicy::Skip,
        )
        .unwrap_err();
        assert!(matches!(err, AnalyzerError::FileRead { .. }));
    }

    #[test]
    fn test_extract_ignores_non_sentinel_lines() {
        let dir = TempDir::new().unwrap();
        let meta = metadata_line();
        let path = write_log(
            dir.path(),
            "a.log",
            &[
                "INFO ros bridge started",
                &meta,
                "0,1,2,3 looks like fields but has no sentinel",
                &step_line(2, 0, 5.0, 0.5, "7.0"),
            ],
        );

        let extraction = extract_file(&path, MalformedPolicy::Skip).unwrap();
        assert_eq!(extraction.steps.len(), 1);
        assert_eq!(extraction.steps[0].episode, 2);
        assert_eq!(extraction.records_rejected, 0);
    }

    // ── parse_metadata_payload ────────────────────────────────────────────────

    #[test]
    fn test_parse_metadata_payload_quoted_and_bare() {
        let values =
            parse_metadata_payload("x {'A': 'hello world', 'B': 3.5, 'C': True} trailing")
                .unwrap();
        assert_eq!(values.get("A").map(String::as_str), Some("hello world"));
        assert_eq!(values.get("B").map(String::as_str), Some("3.5"));
        assert_eq!(values.get("C").map(String::as_str), Some("True"));
    }

    #[test]
    fn test_parse_metadata_payload_quoted_value_with_comma() {
        let values = parse_metadata_payload("{'A': 'one, two', 'B': 'three'}").unwrap();
        assert_eq!(values.get("A").map(String::as_str), Some("one, two"));
        assert_eq!(values.get("B").map(String::as_str), Some("three"));
    }

    #[test]
    fn test_parse_metadata_payload_no_braces() {
        assert!(parse_metadata_payload("METRICS_S3_BUCKET mentioned, no dict").is_none());
    }

    #[test]
    fn test_parse_metadata_payload_empty_braces() {
        assert!(parse_metadata_payload("marker {}").is_none());
    }
}
