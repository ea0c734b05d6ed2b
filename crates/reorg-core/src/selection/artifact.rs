//! Checkpoint files and their filename-derived attributes.

use crate::config::LayoutConfig;
use crate::error::{ReorgError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Functional slot of a checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactRole {
    Encoder,
    Decoder,
    Unclassified,
}

impl ArtifactRole {
    /// Roles competing for a best-only slot.
    pub const PAIRED: [ArtifactRole; 2] = [ArtifactRole::Encoder, ArtifactRole::Decoder];

    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactRole::Encoder => "encoder",
            ArtifactRole::Decoder => "decoder",
            ArtifactRole::Unclassified => "unclassified",
        }
    }

    /// `encoder_*` and `decoder_*` file names; anything else is unclassified.
    pub fn from_file_name(name: &str) -> Self {
        if name.starts_with("encoder_") {
            ArtifactRole::Encoder
        } else if name.starts_with("decoder_") {
            ArtifactRole::Decoder
        } else {
            ArtifactRole::Unclassified
        }
    }
}

impl std::fmt::Display for ArtifactRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A checkpoint file inside a run's `models` directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    pub file_name: String,
    pub role: ArtifactRole,
    pub is_best: bool,
    pub modified: SystemTime,
}

impl Artifact {
    /// Build an artifact from a file name and modification time.
    pub fn new(path: PathBuf, modified: SystemTime) -> Self {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let role = ArtifactRole::from_file_name(&file_name);
        let is_best = is_best_flagged(&path);
        Self {
            path,
            file_name,
            role,
            is_best,
            modified,
        }
    }

    /// Stat `path` and build an artifact from it.
    pub fn from_path(path: PathBuf) -> Result<Self> {
        let modified = fs::metadata(&path)
            .and_then(|m| m.modified())
            .map_err(|e| ReorgError::io_with_path(e, &path))?;
        Ok(Self::new(path, modified))
    }
}

/// Best flag: the stem ends with `best` (`decoder_042_best.pt`).
pub fn is_best_flagged(path: &Path) -> bool {
    path.file_stem()
        .map(|s| s.to_string_lossy().ends_with(LayoutConfig::BEST_STEM_SUFFIX))
        .unwrap_or(false)
}

/// Every checkpoint file directly inside `models_dir`, sorted by file name.
pub fn list_artifacts(models_dir: &Path) -> Result<Vec<Artifact>> {
    let entries = fs::read_dir(models_dir).map_err(|e| {
        ReorgError::io_context(
            e,
            format!("Failed to read directory {}", models_dir.display()),
            models_dir,
        )
    })?;

    let mut artifacts = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ReorgError::io_with_path(e, models_dir))?;
        let path = entry.path();
        let is_checkpoint = path
            .extension()
            .map(|ext| ext == LayoutConfig::ARTIFACT_EXTENSION)
            .unwrap_or(false);
        if is_checkpoint && path.is_file() {
            artifacts.push(Artifact::from_path(path)?);
        }
    }
    artifacts.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    Ok(artifacts)
}
