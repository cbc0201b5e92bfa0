//! Course geometry for the rendering overlay.
//!
//! A track file holds one waypoint per line as six comma-separated floats:
//! center x/y, inner border x/y, outer border x/y. Files live in the tracks
//! directory as `<world_name>.csv`.

use std::path::{Path, PathBuf};

use simtrace_core::{AnalyzerError, Result};
use tracing::warn;

/// Track geometry: center line plus inner and outer borders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Track {
    pub center: Vec<(f64, f64)>,
    pub inner: Vec<(f64, f64)>,
    pub outer: Vec<(f64, f64)>,
}

impl Track {
    /// Load a waypoint file. Blank lines are skipped; any other line must
    /// hold exactly six floats.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| AnalyzerError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;

        let mut track = Track::default();
        for (index, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }

            let cols: Vec<f64> = line
                .split(',')
                .map(|c| c.trim().parse::<f64>())
                .collect::<std::result::Result<_, _>>()
                .map_err(|_| AnalyzerError::TrackFormat {
                    path: path.to_path_buf(),
                    line: index + 1,
                })?;
            if cols.len() != 6 {
                return Err(AnalyzerError::TrackFormat {
                    path: path.to_path_buf(),
                    line: index + 1,
                });
            }

            track.center.push((cols[0], cols[1]));
            track.inner.push((cols[2], cols[3]));
            track.outer.push((cols[4], cols[5]));
        }

        Ok(track)
    }

    /// Resolve `<tracks_dir>/<world_name>.csv` and load it.
    ///
    /// A missing file is not an error: figures are rendered without the
    /// course overlay and a warning is logged.
    pub fn lookup(tracks_dir: &Path, world_name: &str) -> Result<Option<Self>> {
        let path = Self::path_for(tracks_dir, world_name);
        if !path.exists() {
            warn!(
                "No track file at {}; rendering without course overlay",
                path.display()
            );
            return Ok(None);
        }
        Self::load(&path).map(Some)
    }

    /// The expected waypoint file path for a world.
    pub fn path_for(tracks_dir: &Path, world_name: &str) -> PathBuf {
        tracks_dir.join(format!("{world_name}.csv"))
    }

    pub fn is_empty(&self) -> bool {
        self.center.is_empty()
    }

    /// Bounding box over every waypoint: (min_x, min_y, max_x, max_y).
    pub fn bounds(&self) -> Option<(f64, f64, f64, f64)> {
        let mut bounds: Option<(f64, f64, f64, f64)> = None;
        for &(x, y) in self
            .center
            .iter()
            .chain(self.inner.iter())
            .chain(self.outer.iter())
        {
            bounds = Some(match bounds {
                None => (x, y, x, y),
                Some((min_x, min_y, max_x, max_y)) => {
                    (min_x.min(x), min_y.min(y), max_x.max(x), max_y.max(y))
                }
            });
        }
        bounds
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
