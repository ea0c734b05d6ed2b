//! Reorg Core - consolidates per-run training checkpoints into a canonical layout.
//!
//! A batch of training jobs leaves one output directory per run, each with a
//! `models/` folder of checkpoints and a `.hydra/` config snapshot. This crate
//! finds those runs, recovers the side/digit each one was trained for from
//! its path, picks the checkpoints worth keeping and copies (or moves) them
//! into:
//!
//! ```text
//! <dst>/<side>_<digit>/models/<checkpoints>
//! <dst>/<side>_<digit>/.hydra/<config files>
//! <dst>/<side>_<digit>/dataset_stats.pkl
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use reorg_core::{ConsolidateOptions, Consolidator, NullSink};
//!
//! fn main() -> reorg_core::Result<()> {
//!     let options = ConsolidateOptions::new("out/2025.08.17", "reorganized/2025.08.17");
//!     let report = Consolidator::new(options)?.run(&mut NullSink)?;
//!     println!("{}", report.summary());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod consolidate;
pub mod discovery;
pub mod error;
pub mod fs_ops;
pub mod identity;
pub mod report;
pub mod selection;
pub mod trace;

// Re-export commonly used types
pub use config::{BestCopyTiming, ConsolidateOptions, LayoutConfig, OptionsFile};
pub use consolidate::Consolidator;
pub use discovery::{AuxiliaryFiles, MetadataLocator, Run, RunScanner};
pub use error::{ReorgError, Result};
pub use fs_ops::{apply, Action, ActionKind, ExecutorPolicy, TransferMode};
pub use identity::{Digit, Identity, IdentityExtractor, IdentityStrategy, Side};
pub use report::{ConsolidationReport, RunFailure, SelectedArtifact, SkipReason, SkippedRun};
pub use selection::{select, Artifact, ArtifactRole, Selection, SelectionMode, SelectionState};
pub use trace::{NullSink, TraceLine, TraceSink};
