use clap::{CommandFactory, Parser};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Episode analysis and figure rendering for racing-simulator trace logs
#[derive(Parser, Debug, Clone)]
#[command(
    name = "simtrace",
    about = "Episode analysis and figure rendering for racing-simulator trace logs",
    version
)]
pub struct Settings {
    /// Trace log file to analyze; omit to batch-process the logs directory
    #[arg(value_name = "LOG_FILE")]
    pub input: Option<PathBuf>,

    /// How many top-ranked episodes to overlay in the figure
    #[arg(long, default_value = "8", value_parser = clap::value_parser!(u32).range(1..=50))]
    pub top: u32,

    /// Directory scanned for simulator logs in batch mode
    #[arg(long, default_value = "logs")]
    pub logs_dir: PathBuf,

    /// Directory holding per-world track waypoint files
    #[arg(long, default_value = "tracks")]
    pub tracks_dir: PathBuf,

    /// Directory figures are written to
    #[arg(long, default_value = "img")]
    pub img_dir: PathBuf,

    /// Filename substring that marks a simulator log in batch mode
    #[arg(long, default_value = "robomaker")]
    pub pattern: String,

    /// Policy for step lines that fail to parse
    #[arg(long, default_value = "skip", value_parser = ["skip", "abort"])]
    pub on_malformed: String,

    /// Keep processed logs in place instead of moving them to archives
    #[arg(long)]
    pub keep: bool,

    /// Skip the batch confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"])]
    pub log_level: String,

    /// Log file path
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Clear saved configuration
    #[arg(long)]
    pub clear: bool,
}

// ── LastUsedParams ─────────────────────────────────────────────────────────────

/// Persisted last-used parameters saved to `~/.simtrace/last_used.json`.
///
/// Only presentation preferences are persisted; the input path and the
/// malformed-record policy are always taken from the command line.
#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct LastUsedParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logs_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracks_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub img_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

impl LastUsedParams {
    /// Return the default path to the persisted config file.
    /// Uses `~/.simtrace/last_used.json`.
    pub fn config_path() -> PathBuf {
        Self::config_path_in(&dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
    }

    /// Return the config path rooted at `base_dir` (used for testing).
    pub fn config_path_in(base_dir: &std::path::Path) -> PathBuf {
        base_dir.join(".simtrace").join("last_used.json")
    }

    /// Load persisted params from an explicit path.
    /// Returns `Default` when the file is absent or cannot be parsed.
    pub fn load_from(path: &std::path::Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        serde_json::from_str(&content).unwrap_or_default()
    }

    /// Atomically write params to an explicit path, creating parent
    /// directories if needed.
    pub fn save_to(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;

        // Write to a temp file then rename for atomicity.
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, path)?;

        Ok(())
    }

    /// Delete the config file at an explicit path if it exists.
    pub fn clear_at(path: &std::path::Path) -> Result<(), std::io::Error> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

impl From<&Settings> for LastUsedParams {
    fn from(settings: &Settings) -> Self {
        LastUsedParams {
            top: Some(settings.top),
            logs_dir: Some(settings.logs_dir.clone()),
            tracks_dir: Some(settings.tracks_dir.clone()),
            img_dir: Some(settings.img_dir.clone()),
            pattern: Some(settings.pattern.clone()),
        }
    }
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse CLI arguments, merge with last-used params where no explicit CLI
    /// value was provided, and persist the result.
    pub fn load_with_last_used() -> Self {
        Self::load_with_last_used_impl(
            std::env::args_os().collect(),
            &LastUsedParams::config_path(),
        )
    }

    /// Full implementation – accepts args and an explicit config path so that
    /// tests can redirect to a temporary directory.
    pub fn load_with_last_used_impl(
        args: Vec<std::ffi::OsString>,
        config_path: &std::path::Path,
    ) -> Self {
        // Build raw ArgMatches so we can query ValueSource.
        let matches = Settings::command().get_matches_from(args.clone());

        // Parse into the typed struct using the same args.
        let mut settings = Settings::parse_from(args);

        if settings.clear {
            let _ = LastUsedParams::clear_at(config_path);
            return Self::apply_debug(settings);
        }

        let last = LastUsedParams::load_from(config_path);

        // Merge last-used values for fields that were NOT explicitly set on
        // the command line (CLI always wins).
        if !is_arg_explicitly_set(&matches, "top") {
            if let Some(v) = last.top {
                settings.top = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "logs_dir") {
            if let Some(v) = last.logs_dir {
                settings.logs_dir = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "tracks_dir") {
            if let Some(v) = last.tracks_dir {
                settings.tracks_dir = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "img_dir") {
            if let Some(v) = last.img_dir {
                settings.img_dir = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "pattern") {
            if let Some(v) = last.pattern {
                settings.pattern = v;
            }
        }

        settings = Self::apply_debug(settings);

        // Persist current settings for next run.
        let params = LastUsedParams::from(&settings);
        let _ = params.save_to(config_path);

        settings
    }

    /// `--debug` overrides the log level.
    fn apply_debug(mut settings: Settings) -> Settings {
        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }
        settings
    }

    /// The configured malformed-record policy as a typed flag.
    pub fn abort_on_malformed(&self) -> bool {
        self.on_malformed == "abort"
    }
}

/// Whether the user supplied `id` on the command line (as opposed to the
/// value coming from a default).
///
/// NOTE: clap stores the arg id using the *field name* (underscores), not
/// the long-flag spelling (hyphens).
fn is_arg_explicitly_set(matches: &clap::ArgMatches, id: &str) -> bool {
    matches
        .value_source(id)
        .map(|source| source == clap::parser::ValueSource::CommandLine)
        .unwrap_or(false)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
