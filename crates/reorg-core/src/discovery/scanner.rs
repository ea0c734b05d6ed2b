//! Recursive discovery of run directories.

use crate::config::LayoutConfig;
use crate::error::{ReorgError, Result};
use crate::identity::{Identity, IdentityExtractor};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// A training job's output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    pub path: PathBuf,
    /// `None` when no side/digit could be parsed from the path.
    pub identity: Option<Identity>,
}

impl Run {
    pub fn models_dir(&self) -> PathBuf {
        self.path.join(LayoutConfig::MODELS_DIR_NAME)
    }

    pub fn config_dir(&self) -> PathBuf {
        self.path.join(LayoutConfig::CONFIG_DIR_NAME)
    }
}

/// Walks a source tree and yields every directory holding a `models` child.
#[derive(Debug, Default)]
pub struct RunScanner {
    extractor: IdentityExtractor,
}

impl RunScanner {
    pub fn new(extractor: IdentityExtractor) -> Self {
        Self { extractor }
    }

    /// Scan `root` recursively for qualifying runs.
    ///
    /// Entries are visited in file-name order so repeated scans of the same
    /// tree log identically. Symlinks are not followed.
    pub fn scan(&self, root: &Path) -> Result<Vec<Run>> {
        self.scan_with_incomplete(root).map(|outcome| outcome.runs)
    }

    /// Scan `root`, also reporting identity-named directories that look like
    /// runs but have no `models` directory.
    ///
    /// A directory is reported as incomplete when its own name carries a
    /// side/digit, no run lies at or below it, it is not inside a run, and
    /// no deeper incomplete directory sits below it.
    pub fn scan_with_incomplete(&self, root: &Path) -> Result<ScanOutcome> {
        if !root.is_dir() {
            return Err(ReorgError::NotADirectory(root.to_path_buf()));
        }

        let mut runs = Vec::new();
        let mut named = Vec::new();
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry under {}: {}", root.display(), e);
                    continue;
                }
            };
            if !entry.file_type().is_dir() {
                continue;
            }
            if is_run_dir(entry.path()) {
                let path = entry.into_path();
                let identity = self.extractor.extract(&path);
                debug!("Found run {} ({:?})", path.display(), identity);
                runs.push(Run { path, identity });
            } else if Identity::find_in(&entry.file_name().to_string_lossy()).is_some() {
                named.push(entry.into_path());
            }
        }

        let incomplete = named
            .iter()
            .filter(|dir| {
                !runs
                    .iter()
                    .any(|run| run.path.starts_with(dir) || dir.starts_with(&run.path))
            })
            .filter(|dir| !named.iter().any(|other| other != *dir && other.starts_with(dir)))
            .map(|dir| Run {
                path: dir.clone(),
                identity: self.extractor.extract(dir),
            })
            .collect();

        Ok(ScanOutcome { runs, incomplete })
    }
}

/// Result of [`RunScanner::scan_with_incomplete`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanOutcome {
    /// Directories with a `models` child.
    pub runs: Vec<Run>,
    /// Identity-named directories without one.
    pub incomplete: Vec<Run>,
}

/// A directory qualifies when it has a direct `models` child directory.
pub fn is_run_dir(dir: &Path) -> bool {
    dir.join(LayoutConfig::MODELS_DIR_NAME).is_dir()
}
