//! Locates auxiliary files that travel with a run's checkpoints.
//!
//! Config snapshot files come from one fixed directory inside the run. The
//! dataset statistics file may sit in the run, its parent (shared by sibling
//! seeds) or an extra directory; the most recently modified candidate wins.

use super::scanner::Run;
use crate::error::{ReorgError, Result};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::debug;

/// Auxiliary files found for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuxiliaryFiles {
    /// `(file name, source path)` for each config file present, in the
    /// configured order.
    pub config: Vec<(String, PathBuf)>,
    pub dataset_stats: Option<PathBuf>,
}

/// Finds config snapshot and dataset statistics files for runs.
#[derive(Debug, Clone)]
pub struct MetadataLocator {
    config_files: Vec<String>,
    stats_file: String,
    extra_stats_dirs: Vec<PathBuf>,
}

impl MetadataLocator {
    pub fn new(
        config_files: Vec<String>,
        stats_file: impl Into<String>,
        extra_stats_dirs: Vec<PathBuf>,
    ) -> Self {
        Self {
            config_files,
            stats_file: stats_file.into(),
            extra_stats_dirs,
        }
    }

    pub fn stats_file(&self) -> &str {
        &self.stats_file
    }

    pub fn locate(&self, run: &Run) -> Result<AuxiliaryFiles> {
        Ok(AuxiliaryFiles {
            config: self.locate_config(run),
            dataset_stats: self.locate_stats(run)?,
        })
    }

    /// Config files present in the run's `.hydra` directory.
    pub fn locate_config(&self, run: &Run) -> Vec<(String, PathBuf)> {
        let dir = run.config_dir();
        if !dir.is_dir() {
            return Vec::new();
        }
        self.config_files
            .iter()
            .filter_map(|name| {
                let path = dir.join(name);
                path.is_file().then(|| (name.clone(), path))
            })
            .collect()
    }

    /// Statistics candidates in priority order.
    pub fn stats_candidates(&self, run: &Run) -> Vec<PathBuf> {
        let mut candidates = vec![run.path.join(&self.stats_file)];
        if let Some(parent) = run.path.parent() {
            candidates.push(parent.join(&self.stats_file));
        }
        candidates.extend(self.extra_stats_dirs.iter().map(|d| d.join(&self.stats_file)));
        candidates
    }

    /// The most recently modified existing statistics candidate.
    pub fn locate_stats(&self, run: &Run) -> Result<Option<PathBuf>> {
        let chosen = latest_by_mtime(&self.stats_candidates(run))?;
        if let Some(ref path) = chosen {
            debug!("Dataset stats for {}: {}", run.path.display(), path.display());
        }
        Ok(chosen)
    }
}

/// Pick the existing file with the latest modification time.
///
/// Missing candidates are ignored; ties keep the earlier candidate.
pub fn latest_by_mtime(candidates: &[PathBuf]) -> Result<Option<PathBuf>> {
    let mut best: Option<(SystemTime, &PathBuf)> = None;
    for candidate in candidates {
        let Some(modified) = modified_time(candidate)? else {
            continue;
        };
        match best {
            Some((current, _)) if modified <= current => {}
            _ => best = Some((modified, candidate)),
        }
    }
    Ok(best.map(|(_, path)| path.clone()))
}

/// Modification time of a regular file, `None` if it does not exist.
fn modified_time(path: &Path) -> Result<Option<SystemTime>> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() => meta
            .modified()
            .map(Some)
            .map_err(|e| ReorgError::io_with_path(e, path)),
        Ok(_) => Ok(None),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(ReorgError::io_with_path(e, path)),
    }
}
