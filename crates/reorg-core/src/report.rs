//! Summary of one consolidation pass.

use crate::error::Result;
use crate::fs_ops::{atomic_write_json, Action, ActionKind, TransferMode};
use crate::identity::Identity;
use crate::selection::{Artifact, ArtifactRole};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Why a run contributed nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    UnrecognizedIdentity,
    MissingModelsDir,
    NoArtifacts,
    NoBestArtifacts,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::UnrecognizedIdentity => "unrecognized identity",
            SkipReason::MissingModelsDir => "missing models directory",
            SkipReason::NoArtifacts => "no checkpoint files",
            SkipReason::NoBestArtifacts => "no best-flagged checkpoints",
        }
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRun {
    pub path: PathBuf,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunFailure {
    pub path: PathBuf,
    pub message: String,
}

/// Final global best for one identity and role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectedArtifact {
    pub identity: Identity,
    pub role: ArtifactRole,
    pub path: PathBuf,
    pub modified: DateTime<Utc>,
}

impl SelectedArtifact {
    pub fn new(identity: Identity, role: ArtifactRole, artifact: &Artifact) -> Self {
        Self {
            identity,
            role,
            path: artifact.path.clone(),
            modified: DateTime::<Utc>::from(artifact.modified),
        }
    }
}

/// Per-kind action tallies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ActionCounts {
    pub copied: usize,
    pub moved: usize,
    pub overwritten: usize,
    pub kept_existing: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConsolidationReport {
    pub generated_at: DateTime<Utc>,
    pub source_root: PathBuf,
    pub destination_root: PathBuf,
    pub all_artifacts: bool,
    pub mode: TransferMode,
    pub dry_run: bool,
    pub runs_found: usize,
    pub runs_processed: usize,
    pub skipped: Vec<SkippedRun>,
    pub failures: Vec<RunFailure>,
    pub actions: Vec<Action>,
    /// Global best per identity and role (best-only mode).
    pub selections: Vec<SelectedArtifact>,
}

impl ConsolidationReport {
    pub fn new(
        source_root: &Path,
        destination_root: &Path,
        all_artifacts: bool,
        mode: TransferMode,
        dry_run: bool,
    ) -> Self {
        Self {
            generated_at: Utc::now(),
            source_root: source_root.to_path_buf(),
            destination_root: destination_root.to_path_buf(),
            all_artifacts,
            mode,
            dry_run,
            runs_found: 0,
            runs_processed: 0,
            skipped: Vec::new(),
            failures: Vec::new(),
            actions: Vec::new(),
            selections: Vec::new(),
        }
    }

    pub fn action_counts(&self) -> ActionCounts {
        let mut counts = ActionCounts::default();
        for action in &self.actions {
            match action.kind {
                ActionKind::Copy => counts.copied += 1,
                ActionKind::Move => counts.moved += 1,
                ActionKind::Overwrite => counts.overwritten += 1,
                ActionKind::SkipExists => counts.kept_existing += 1,
            }
        }
        counts
    }

    /// No run failed.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// One-line human summary.
    pub fn summary(&self) -> String {
        let counts = self.action_counts();
        format!(
            "{} runs found, {} processed, {} skipped, {} failed; {} copied, {} moved, {} overwritten, {} kept{}",
            self.runs_found,
            self.runs_processed,
            self.skipped.len(),
            self.failures.len(),
            counts.copied,
            counts.moved,
            counts.overwritten,
            counts.kept_existing,
            if self.dry_run { " (dry run)" } else { "" }
        )
    }

    /// Write the report as pretty JSON, atomically.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        atomic_write_json(path, self)
    }
}
