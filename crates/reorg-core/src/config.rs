//! Centralized configuration for checkpoint reorganization.
//!
//! Layout constants live in unit structs with associated consts. Invocation
//! options live in [`ConsolidateOptions`], which can be partially supplied by
//! a JSON options file ([`OptionsFile`]) and overridden from the command line.

use crate::error::{ReorgError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Names of the directories and files making up a run and the output layout.
pub struct LayoutConfig;

impl LayoutConfig {
    /// Mandatory artifacts directory inside a run.
    pub const MODELS_DIR_NAME: &'static str = "models";
    /// Configuration snapshot directory inside a run.
    pub const CONFIG_DIR_NAME: &'static str = ".hydra";
    /// Well-known configuration snapshot files.
    pub const CONFIG_FILES: &'static [&'static str] =
        &["config.yaml", "hydra.yaml", "overrides.yaml"];
    /// Dataset statistics file produced by the stats aggregator.
    pub const STATS_FILENAME: &'static str = "dataset_stats.pkl";
    /// Extension of checkpoint files.
    pub const ARTIFACT_EXTENSION: &'static str = "pt";
    /// Suffix of a best-flagged checkpoint stem (`encoder_010_best.pt`).
    pub const BEST_STEM_SUFFIX: &'static str = "best";
    /// Prefix of temporary files written next to a destination.
    pub const TEMP_PREFIX: &'static str = ".tmp_reorg_";
}

/// When best-only picks are written to the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BestCopyTiming {
    /// Copy only the global best per identity and role, after every run has
    /// been seen.
    #[default]
    Deferred,
    /// Copy each run's local pick as soon as the run is processed; the last
    /// processed run wins on disk.
    PerRun,
}

impl BestCopyTiming {
    pub fn as_str(&self) -> &'static str {
        match self {
            BestCopyTiming::Deferred => "deferred",
            BestCopyTiming::PerRun => "per-run",
        }
    }
}

impl std::fmt::Display for BestCopyTiming {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Fully resolved options for one consolidation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsolidateOptions {
    pub source_root: PathBuf,
    pub destination_root: PathBuf,
    /// Copy every checkpoint instead of only the best per role.
    pub all_artifacts: bool,
    /// Move files instead of copying them.
    #[serde(rename = "move")]
    pub move_files: bool,
    pub dry_run: bool,
    /// Leave existing destination files untouched.
    pub keep_existing: bool,
    pub best_copy: BestCopyTiming,
    /// Abort the whole pass on the first failed run.
    pub fail_fast: bool,
    pub stats_file: String,
    /// Additional directories searched for the statistics file.
    pub extra_stats_dirs: Vec<PathBuf>,
    pub config_files: Vec<String>,
}

impl ConsolidateOptions {
    /// Options with defaults for everything except the two roots.
    pub fn new(source_root: impl Into<PathBuf>, destination_root: impl Into<PathBuf>) -> Self {
        Self {
            source_root: source_root.into(),
            destination_root: destination_root.into(),
            all_artifacts: false,
            move_files: false,
            dry_run: false,
            keep_existing: false,
            best_copy: BestCopyTiming::default(),
            fail_fast: false,
            stats_file: LayoutConfig::STATS_FILENAME.to_string(),
            extra_stats_dirs: Vec::new(),
            config_files: LayoutConfig::CONFIG_FILES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }

    /// Reject option combinations that would corrupt the source or loop.
    pub fn validate(&self) -> Result<()> {
        if self.source_root.as_os_str().is_empty() {
            return Err(ReorgError::Validation {
                field: "source_root".into(),
                message: "must not be empty".into(),
            });
        }
        if self.destination_root.as_os_str().is_empty() {
            return Err(ReorgError::Validation {
                field: "destination_root".into(),
                message: "must not be empty".into(),
            });
        }
        if self.stats_file.is_empty() || self.stats_file.contains(['/', '\\']) {
            return Err(ReorgError::Validation {
                field: "stats_file".into(),
                message: format!("'{}' is not a plain file name", self.stats_file),
            });
        }

        let src = absolute(&self.source_root)?;
        let dst = absolute(&self.destination_root)?;
        if src == dst {
            return Err(ReorgError::Validation {
                field: "destination_root".into(),
                message: "must differ from source_root".into(),
            });
        }
        // The output layout itself looks like runs (`right_index/models`), so a
        // destination under the source would be rescanned on the next pass.
        if dst.starts_with(&src) {
            return Err(ReorgError::Validation {
                field: "destination_root".into(),
                message: format!("{} is inside source_root", dst.display()),
            });
        }
        Ok(())
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).map_err(|e| ReorgError::io_with_path(e, path))
}

/// Options as read from a JSON file; every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OptionsFile {
    pub source_root: Option<PathBuf>,
    pub destination_root: Option<PathBuf>,
    pub all_artifacts: Option<bool>,
    #[serde(rename = "move")]
    pub move_files: Option<bool>,
    pub dry_run: Option<bool>,
    pub keep_existing: Option<bool>,
    pub best_copy: Option<BestCopyTiming>,
    pub fail_fast: Option<bool>,
    pub stats_file: Option<String>,
    pub extra_stats_dirs: Option<Vec<PathBuf>>,
    pub config_files: Option<Vec<String>>,
}

impl OptionsFile {
    /// Load an options file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ReorgError::io_context(
                e,
                format!("Failed to read options file {}", path.display()),
                path,
            )
        })?;
        serde_json::from_str(&contents).map_err(|e| ReorgError::Config {
            message: format!("Invalid options file {}: {}", path.display(), e),
        })
    }

    /// Overlay `other` on top of `self`; fields set in `other` win.
    pub fn merge(self, other: OptionsFile) -> OptionsFile {
        OptionsFile {
            source_root: other.source_root.or(self.source_root),
            destination_root: other.destination_root.or(self.destination_root),
            all_artifacts: other.all_artifacts.or(self.all_artifacts),
            move_files: other.move_files.or(self.move_files),
            dry_run: other.dry_run.or(self.dry_run),
            keep_existing: other.keep_existing.or(self.keep_existing),
            best_copy: other.best_copy.or(self.best_copy),
            fail_fast: other.fail_fast.or(self.fail_fast),
            stats_file: other.stats_file.or(self.stats_file),
            extra_stats_dirs: other.extra_stats_dirs.or(self.extra_stats_dirs),
            config_files: other.config_files.or(self.config_files),
        }
    }

    /// Resolve into full options, requiring both roots.
    pub fn resolve(self) -> Result<ConsolidateOptions> {
        let source_root = self.source_root.ok_or_else(|| ReorgError::Validation {
            field: "source_root".into(),
            message: "is required".into(),
        })?;
        let destination_root = self.destination_root.ok_or_else(|| ReorgError::Validation {
            field: "destination_root".into(),
            message: "is required".into(),
        })?;

        let mut options = ConsolidateOptions::new(source_root, destination_root);
        options.all_artifacts = self.all_artifacts.unwrap_or(false);
        options.move_files = self.move_files.unwrap_or(false);
        options.dry_run = self.dry_run.unwrap_or(false);
        options.keep_existing = self.keep_existing.unwrap_or(false);
        options.best_copy = self.best_copy.unwrap_or_default();
        options.fail_fast = self.fail_fast.unwrap_or(false);
        if let Some(stats_file) = self.stats_file {
            options.stats_file = stats_file;
        }
        if let Some(dirs) = self.extra_stats_dirs {
            options.extra_stats_dirs = dirs;
        }
        if let Some(files) = self.config_files {
            options.config_files = files;
        }
        options.validate()?;
        Ok(options)
    }
}
