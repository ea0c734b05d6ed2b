//! Atomic file writes.
//!
//! Both helpers write to a hidden temp sibling with a PID+TID suffix, flush it
//! to disk and rename it over the target, so readers only ever see the old
//! file or the complete new one.

use crate::config::LayoutConfig;
use crate::error::{ReorgError, Result};
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process;
use std::thread;
use tracing::debug;

/// Copy `src` to `dest` through a temp file, preserving the modification time.
///
/// On failure the temp file is removed and `dest` is left as it was.
pub fn atomic_copy(src: &Path, dest: &Path) -> Result<()> {
    let temp_path = temp_sibling(dest);

    let result = copy_into_temp(src, &temp_path).and_then(|()| {
        fs::rename(&temp_path, dest).map_err(|e| {
            ReorgError::io_context(
                e,
                format!("Failed to rename {} to {}", temp_path.display(), dest.display()),
                dest,
            )
        })
    });

    if result.is_err() && temp_path.exists() {
        let _ = fs::remove_file(&temp_path);
    }
    result?;

    debug!("Atomically copied {} -> {}", src.display(), dest.display());
    Ok(())
}

fn copy_into_temp(src: &Path, temp_path: &Path) -> Result<()> {
    fs::copy(src, temp_path).map_err(|e| {
        ReorgError::io_context(
            e,
            format!("Failed to copy {} to {}", src.display(), temp_path.display()),
            src,
        )
    })?;

    let modified = fs::metadata(src)
        .and_then(|m| m.modified())
        .map_err(|e| ReorgError::io_with_path(e, src))?;

    let file = OpenOptions::new()
        .write(true)
        .open(temp_path)
        .map_err(|e| ReorgError::io_with_path(e, temp_path))?;
    file.set_modified(modified)
        .map_err(|e| ReorgError::io_with_path(e, temp_path))?;
    file.sync_all()
        .map_err(|e| ReorgError::io_with_path(e, temp_path))?;
    Ok(())
}

/// Write data to a JSON file atomically, creating parent directories.
pub fn atomic_write_json<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| {
                ReorgError::io_context(
                    e,
                    format!("Failed to create directory {}", parent.display()),
                    parent,
                )
            })?;
        }
    }

    let serialized = serde_json::to_string_pretty(data).map_err(|e| ReorgError::Json {
        message: format!("Failed to serialize data: {}", e),
        source: Some(e),
    })?;

    let temp_path = temp_sibling(path);
    {
        let mut file = File::create(&temp_path).map_err(|e| {
            ReorgError::io_context(
                e,
                format!("Failed to create temp file {}", temp_path.display()),
                &temp_path,
            )
        })?;
        file.write_all(serialized.as_bytes())
            .and_then(|()| file.write_all(b"\n"))
            .and_then(|()| file.sync_all())
            .map_err(|e| {
                ReorgError::io_context(
                    e,
                    format!("Failed to write temp file {}", temp_path.display()),
                    &temp_path,
                )
            })?;
    }

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        ReorgError::io_context(
            e,
            format!("Failed to rename {} to {}", temp_path.display(), path.display()),
            path,
        )
    })?;

    debug!("Atomically wrote {}", path.display());
    Ok(())
}

/// Hidden temp path next to `target`, unique per process and thread.
pub(crate) fn temp_sibling(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp_name = format!(
        "{}{}.{}.{}",
        LayoutConfig::TEMP_PREFIX,
        name,
        process::id(),
        thread_id()
    );
    target.with_file_name(temp_name)
}

fn thread_id() -> u64 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    let mut hasher = DefaultHasher::new();
    thread::current().id().hash(&mut hasher);
    hasher.finish()
}
