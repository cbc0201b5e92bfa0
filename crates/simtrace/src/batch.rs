//! Batch-mode helpers: simulator log discovery and archiving.

use std::path::{Path, PathBuf};

use simtrace_core::Result;
use tracing::warn;

/// Files directly under `logs_dir` whose names contain `pattern`, sorted
/// by path.
///
/// Only the top level is scanned: the `archives/` subdirectory holds
/// already-processed logs and must not be picked up again.
pub fn find_log_files(logs_dir: &Path, pattern: &str) -> Vec<PathBuf> {
    if !logs_dir.exists() {
        warn!("Logs directory does not exist: {}", logs_dir.display());
        return Vec::new();
    }

    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(logs_dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry.file_type().is_file()
                && entry.file_name().to_string_lossy().contains(pattern)
        })
        .map(|entry| entry.into_path())
        .collect();

    files.sort();
    files
}

/// Move a processed log into `<logs_dir>/archives/`, creating the archive
/// directory if needed. Returns the destination path.
pub fn archive_file(path: &Path, logs_dir: &Path) -> Result<PathBuf> {
    let archive_dir = logs_dir.join("archives");
    std::fs::create_dir_all(&archive_dir)?;

    let name = path
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("log path has no file name: {}", path.display()))?;
    let dest = archive_dir.join(name);
    std::fs::rename(path, &dest)?;

    Ok(dest)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, "x").unwrap();
        path
    }

    // ── find_log_files ────────────────────────────────────────────────────────

    #[test]
    fn test_find_log_files_filters_by_pattern() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "run-robomaker.log");
        touch(dir.path(), "sagemaker.log");

        let files = find_log_files(dir.path(), "robomaker");
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("run-robomaker.log"));
    }

    #[test]
    fn test_find_log_files_sorted() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "c-robomaker.log");
        touch(dir.path(), "a-robomaker.log");
        touch(dir.path(), "b-robomaker.log");

        let files = find_log_files(dir.path(), "robomaker");
        let names: Vec<&str> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(
            names,
            vec!["a-robomaker.log", "b-robomaker.log", "c-robomaker.log"]
        );
    }

    #[test]
    fn test_find_log_files_ignores_archives_subdir() {
        let dir = TempDir::new().unwrap();
        let archives = dir.path().join("archives");
        std::fs::create_dir_all(&archives).unwrap();
        touch(&archives, "old-robomaker.log");
        touch(dir.path(), "new-robomaker.log");

        let files = find_log_files(dir.path(), "robomaker");
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("new-robomaker.log"));
    }

    #[test]
    fn test_find_log_files_missing_dir() {
        let files = find_log_files(Path::new("/tmp/does-not-exist-simtrace-batch"), "robomaker");
        assert!(files.is_empty());
    }

    // ── archive_file ──────────────────────────────────────────────────────────

    #[test]
    fn test_archive_file_moves_into_archives() {
        let dir = TempDir::new().unwrap();
        let log = touch(dir.path(), "run-robomaker.log");

        let dest = archive_file(&log, dir.path()).unwrap();

        assert!(!log.exists());
        assert!(dest.exists());
        assert!(dest.ends_with("archives/run-robomaker.log"));
    }

    #[test]
    fn test_archive_file_missing_source_fails() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("ghost-robomaker.log");
        assert!(archive_file(&missing, dir.path()).is_err());
    }
}
