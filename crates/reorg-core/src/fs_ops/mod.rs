//! Filesystem actions: atomic writes and the copy/move executor.

mod atomic;
mod executor;

pub use atomic::{atomic_copy, atomic_write_json};
pub use executor::{apply, Action, ActionKind, ExecutorPolicy, TransferMode};
