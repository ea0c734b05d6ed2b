//! Copy/move executor for single source -> destination pairs.
//!
//! Decision table:
//!
//! | destination | keep_existing | action        |
//! |-------------|---------------|---------------|
//! | exists      | yes           | `skip-exists` |
//! | exists      | no            | `overwrite`   |
//! | missing     | -             | `copy`/`move` |
//!
//! Overwrites remove the old file first. Writes go through a temp sibling,
//! so a failure never leaves a half-written destination. Under `dry_run`
//! the same decisions are traced but nothing is touched.

use super::atomic::atomic_copy;
use crate::error::{ReorgError, Result};
use crate::trace::{TraceLine, TraceSink};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Whether the source survives the transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferMode {
    #[default]
    Copy,
    Move,
}

/// Transfer policy shared by every action of a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecutorPolicy {
    pub mode: TransferMode,
    pub keep_existing: bool,
    pub dry_run: bool,
}

/// What happened (or would happen, under dry run) to one destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionKind {
    Copy,
    Move,
    SkipExists,
    Overwrite,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Copy => "copy",
            ActionKind::Move => "move",
            ActionKind::SkipExists => "skip-exists",
            ActionKind::Overwrite => "overwrite",
        }
    }
}

/// A planned or executed filesystem effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub kind: ActionKind,
    pub source: PathBuf,
    pub destination: PathBuf,
    pub mode: TransferMode,
    pub dry_run: bool,
}

/// Apply one transfer under `policy`, tracing every decision to `sink`.
pub fn apply(
    source: &Path,
    destination: &Path,
    policy: ExecutorPolicy,
    sink: &mut dyn TraceSink,
) -> Result<Action> {
    let action = |kind| Action {
        kind,
        source: source.to_path_buf(),
        destination: destination.to_path_buf(),
        mode: policy.mode,
        dry_run: policy.dry_run,
    };

    let exists = destination.symlink_metadata().is_ok();
    if exists && policy.keep_existing {
        sink.record(TraceLine::SkipExisting {
            path: destination.to_path_buf(),
        });
        return Ok(action(ActionKind::SkipExists));
    }

    if exists {
        sink.record(TraceLine::Remove {
            path: destination.to_path_buf(),
        });
        if !policy.dry_run {
            remove_existing(destination)?;
        }
    }

    sink.record(match policy.mode {
        TransferMode::Copy => TraceLine::Copy {
            src: source.to_path_buf(),
            dest: destination.to_path_buf(),
        },
        TransferMode::Move => TraceLine::Move {
            src: source.to_path_buf(),
            dest: destination.to_path_buf(),
        },
    });

    if !policy.dry_run {
        ensure_parent(destination)?;
        match policy.mode {
            TransferMode::Copy => atomic_copy(source, destination)?,
            TransferMode::Move => move_file(source, destination)?,
        }
    }

    let kind = match (exists, policy.mode) {
        (true, _) => ActionKind::Overwrite,
        (false, TransferMode::Copy) => ActionKind::Copy,
        (false, TransferMode::Move) => ActionKind::Move,
    };
    Ok(action(kind))
}

fn remove_existing(destination: &Path) -> Result<()> {
    let is_dir = destination
        .symlink_metadata()
        .map(|m| m.is_dir())
        .unwrap_or(false);
    if is_dir {
        return Err(ReorgError::Validation {
            field: "destination".into(),
            message: format!("{} is a directory, refusing to replace it", destination.display()),
        });
    }
    fs::remove_file(destination).map_err(|e| {
        ReorgError::io_context(
            e,
            format!("Failed to remove {}", destination.display()),
            destination,
        )
    })
}

fn ensure_parent(destination: &Path) -> Result<()> {
    if let Some(parent) = destination.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| {
                ReorgError::io_context(
                    e,
                    format!("Failed to create directory {}", parent.display()),
                    parent,
                )
            })?;
        }
    }
    Ok(())
}

/// Move a file, falling back to copy+delete for cross-filesystem moves.
///
/// The copy completes before the source is removed; if removal fails the
/// error is surfaced with both files still present.
fn move_file(src: &Path, dest: &Path) -> Result<()> {
    match fs::rename(src, dest) {
        Ok(()) => Ok(()),
        Err(e) => {
            debug!(
                "Rename {} -> {} failed ({}), copying instead",
                src.display(),
                dest.display(),
                e
            );
            atomic_copy(src, dest)?;
            fs::remove_file(src).map_err(|e| {
                warn!(
                    "Copied {} but could not remove the source: {}",
                    src.display(),
                    e
                );
                ReorgError::MoveFailed {
                    src: src.to_path_buf(),
                    dest: dest.to_path_buf(),
                    reason: format!("source removal failed: {}", e),
                }
            })
        }
    }
}
