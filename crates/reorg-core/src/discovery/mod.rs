//! Run discovery and auxiliary file lookup.

mod metadata;
mod scanner;

pub use metadata::{latest_by_mtime, AuxiliaryFiles, MetadataLocator};
pub use scanner::{is_run_dir, Run, RunScanner, ScanOutcome};
