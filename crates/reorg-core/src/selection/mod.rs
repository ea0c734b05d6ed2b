//! Checkpoint classification and selection.

mod artifact;
mod selector;

pub use artifact::{is_best_flagged, list_artifacts, Artifact, ArtifactRole};
pub use selector::{latest_best, select, Offer, Selection, SelectionMode, SelectionState};
