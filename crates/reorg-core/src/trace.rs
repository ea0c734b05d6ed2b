//! User-facing per-decision trace.
//!
//! Every copy, move, removal, skip and warning produces one [`TraceLine`].
//! The CLI prints them to stdout; tests collect them in a `Vec`.

use std::path::PathBuf;

/// One decision taken during a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceLine {
    Copy { src: PathBuf, dest: PathBuf },
    Move { src: PathBuf, dest: PathBuf },
    Remove { path: PathBuf },
    SkipExisting { path: PathBuf },
    Warn(String),
    Error(String),
    Info(String),
}

impl TraceLine {
    /// Bracketed tag printed at the start of the line.
    pub fn tag(&self) -> &'static str {
        match self {
            TraceLine::Copy { .. } => "[copy]",
            TraceLine::Move { .. } => "[move]",
            TraceLine::Remove { .. } => "[rm]",
            TraceLine::SkipExisting { .. } => "[skip]",
            TraceLine::Warn(_) => "[warn]",
            TraceLine::Error(_) => "[error]",
            TraceLine::Info(_) => "",
        }
    }
}

impl std::fmt::Display for TraceLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TraceLine::Copy { src, dest } | TraceLine::Move { src, dest } => {
                write!(f, "{} {} -> {}", self.tag(), src.display(), dest.display())
            }
            TraceLine::Remove { path } => write!(f, "{}   {}", self.tag(), path.display()),
            TraceLine::SkipExisting { path } => {
                write!(f, "{} {} exists (keep-existing)", self.tag(), path.display())
            }
            TraceLine::Warn(message) | TraceLine::Error(message) => {
                write!(f, "{} {}", self.tag(), message)
            }
            TraceLine::Info(message) => write!(f, "{}", message),
        }
    }
}

/// Receiver of trace lines.
pub trait TraceSink {
    fn record(&mut self, line: TraceLine);
}

impl TraceSink for Vec<TraceLine> {
    fn record(&mut self, line: TraceLine) {
        self.push(line);
    }
}

/// Discards every line.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl TraceSink for NullSink {
    fn record(&mut self, _line: TraceLine) {}
}
