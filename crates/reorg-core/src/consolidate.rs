//! Consolidation driver.
//!
//! # Pass (single-threaded, one run at a time)
//!
//! 1. **Scan**: find runs under the source root, attach identities
//! 2. **Select**: per run, pick checkpoints and fold them into the
//!    [`SelectionState`] accumulator
//! 3. **Transfer**: copy config snapshot, dataset stats and picks into
//!    `<dst>/<side>_<digit>/`. In per-run timing this happens as each run is
//!    processed
//! 4. **Finish**: in deferred best-only mode, transfer the global best per
//!    identity and role, with the metadata of the run that produced the
//!    newest of them; summarize
//!
//! Runs that cannot be identified or carry no checkpoints are skipped with a
//! warning. A filesystem failure aborts the rest of that run and is recorded;
//! the pass continues unless `fail_fast` is set. A failed run never
//! contributes to the selection state.

use crate::config::{BestCopyTiming, ConsolidateOptions, LayoutConfig};
use crate::discovery::{MetadataLocator, Run, RunScanner, ScanOutcome};
use crate::error::{ReorgError, Result};
use crate::fs_ops::{apply, Action, ExecutorPolicy, TransferMode};
use crate::identity::{Identity, IdentityExtractor};
use crate::report::{ConsolidationReport, RunFailure, SelectedArtifact, SkipReason, SkippedRun};
use crate::selection::{list_artifacts, select, Artifact, SelectionMode, SelectionState};
use crate::trace::{TraceLine, TraceSink};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Runs one consolidation pass over a source tree.
#[derive(Debug)]
pub struct Consolidator {
    options: ConsolidateOptions,
    scanner: RunScanner,
    locator: MetadataLocator,
}

/// What a single run produced.
enum RunOutcome {
    Processed,
    Skipped(SkipReason),
}

impl Consolidator {
    /// Create a consolidator with the default identity extractor.
    pub fn new(options: ConsolidateOptions) -> Result<Self> {
        Self::with_extractor(options, IdentityExtractor::default())
    }

    pub fn with_extractor(options: ConsolidateOptions, extractor: IdentityExtractor) -> Result<Self> {
        options.validate()?;
        let locator = MetadataLocator::new(
            options.config_files.clone(),
            options.stats_file.clone(),
            options.extra_stats_dirs.clone(),
        );
        Ok(Self {
            options,
            scanner: RunScanner::new(extractor),
            locator,
        })
    }

    pub fn options(&self) -> &ConsolidateOptions {
        &self.options
    }

    fn policy(&self) -> ExecutorPolicy {
        ExecutorPolicy {
            mode: if self.options.move_files {
                TransferMode::Move
            } else {
                TransferMode::Copy
            },
            keep_existing: self.options.keep_existing,
            dry_run: self.options.dry_run,
        }
    }

    fn selection_mode(&self) -> SelectionMode {
        if self.options.all_artifacts {
            SelectionMode::AllArtifacts
        } else {
            SelectionMode::BestOnly
        }
    }

    /// Picks are written as each run is processed, rather than once at the end.
    fn transfers_per_run(&self) -> bool {
        self.selection_mode() == SelectionMode::AllArtifacts
            || self.options.best_copy == BestCopyTiming::PerRun
    }

    fn identity_dir(&self, identity: Identity) -> PathBuf {
        self.options.destination_root.join(identity.dir_name())
    }

    /// Execute the pass, tracing every decision to `sink`.
    pub fn run(&self, sink: &mut dyn TraceSink) -> Result<ConsolidationReport> {
        let src = &self.options.source_root;
        let dst = &self.options.destination_root;
        let policy = self.policy();
        let mut report = ConsolidationReport::new(
            src,
            dst,
            self.options.all_artifacts,
            policy.mode,
            policy.dry_run,
        );

        if !src.is_dir() {
            return Err(ReorgError::NotADirectory(src.clone()));
        }
        if !policy.dry_run {
            std::fs::create_dir_all(dst).map_err(|e| {
                ReorgError::io_context(e, format!("Failed to create {}", dst.display()), dst)
            })?;
        }

        let ScanOutcome { runs, incomplete } = self.scanner.scan_with_incomplete(src)?;
        for run in &incomplete {
            let message = format!("Missing models dir for: {}", run.path.display());
            warn!("{}", message);
            sink.record(TraceLine::Warn(message));
            report.skipped.push(SkippedRun {
                path: run.path.clone(),
                reason: SkipReason::MissingModelsDir,
            });
        }

        report.runs_found = runs.len();
        if runs.is_empty() {
            info!("No runs found under {}", src.display());
            sink.record(TraceLine::Info(format!(
                "No runs with '{}' found under {}",
                LayoutConfig::MODELS_DIR_NAME,
                src.display()
            )));
            return Ok(report);
        }

        info!(
            "Consolidating {} runs from {} into {} (best copy: {})",
            runs.len(),
            src.display(),
            dst.display(),
            self.options.best_copy
        );
        sink.record(TraceLine::Info(format!(
            "Found {} runs with '{}' under {}\n",
            runs.len(),
            LayoutConfig::MODELS_DIR_NAME,
            src.display()
        )));

        let mut state = SelectionState::new();
        for run in &runs {
            // Offers are committed only once the run's own transfers succeed.
            let mut candidate = state.clone();
            match self.process_run(run, &mut candidate, sink, &mut report.actions) {
                Ok(RunOutcome::Processed) => {
                    state = candidate;
                    report.runs_processed += 1;
                }
                Ok(RunOutcome::Skipped(reason)) => {
                    state = candidate;
                    report.skipped.push(SkippedRun {
                        path: run.path.clone(),
                        reason,
                    });
                }
                Err(e) => self.record_failure(&run.path, e, sink, &mut report)?,
            }
        }

        let failed = if self.transfers_per_run() {
            Vec::new()
        } else {
            self.transfer_global_best(&state, sink, &mut report)?
        };

        report.selections = state
            .iter()
            .filter(|(identity, _, _)| !failed.contains(identity))
            .map(|(identity, role, artifact)| SelectedArtifact::new(identity, role, artifact))
            .collect();

        let summary = report.summary();
        info!("Consolidation complete: {}", summary);
        sink.record(TraceLine::Info(format!("\nDone. {}", summary)));
        Ok(report)
    }

    fn process_run(
        &self,
        run: &Run,
        state: &mut SelectionState,
        sink: &mut dyn TraceSink,
        actions: &mut Vec<Action>,
    ) -> Result<RunOutcome> {
        let Some(identity) = run.identity else {
            return Ok(self.skip(
                sink,
                SkipReason::UnrecognizedIdentity,
                format!("Could not parse side/finger from: {}", run.path.display()),
            ));
        };

        let models_dir = run.models_dir();
        if !models_dir.is_dir() {
            return Ok(self.skip(
                sink,
                SkipReason::MissingModelsDir,
                format!("Missing models dir for: {}", run.path.display()),
            ));
        }

        let artifacts = list_artifacts(&models_dir)?;
        if artifacts.is_empty() {
            return Ok(self.skip(
                sink,
                SkipReason::NoArtifacts,
                format!(
                    "No .{} files in {}",
                    LayoutConfig::ARTIFACT_EXTENSION,
                    models_dir.display()
                ),
            ));
        }

        let selection = select(
            &artifacts,
            identity,
            self.selection_mode(),
            std::mem::take(state),
        );
        *state = selection.state;
        for (role, offer) in &selection.offers {
            debug!("{} {} from {}: {:?}", identity, role, run.path.display(), offer);
        }
        if selection.picks.is_empty() {
            return Ok(self.skip(
                sink,
                SkipReason::NoBestArtifacts,
                format!(
                    "No *_{}.{} in {}; nothing copied for {}",
                    LayoutConfig::BEST_STEM_SUFFIX,
                    LayoutConfig::ARTIFACT_EXTENSION,
                    models_dir.display(),
                    identity
                ),
            ));
        }

        if self.transfers_per_run() {
            self.transfer_run(identity, run, &selection.picks, sink, actions)?;
        }
        Ok(RunOutcome::Processed)
    }

    /// Write `run`'s config snapshot and dataset stats, then `picks`, into
    /// the identity directory. Stops at the first failed action.
    fn transfer_run(
        &self,
        identity: Identity,
        run: &Run,
        picks: &[Artifact],
        sink: &mut dyn TraceSink,
        actions: &mut Vec<Action>,
    ) -> Result<()> {
        let policy = self.policy();
        let identity_dir = self.identity_dir(identity);
        let aux = self.locator.locate(run)?;

        let config_dir = identity_dir.join(LayoutConfig::CONFIG_DIR_NAME);
        for (name, source) in &aux.config {
            actions.push(apply(source, &config_dir.join(name), policy, sink)?);
        }
        if let Some(stats) = &aux.dataset_stats {
            let dest = identity_dir.join(self.locator.stats_file());
            actions.push(apply(stats, &dest, policy, sink)?);
        }

        let models_dir = identity_dir.join(LayoutConfig::MODELS_DIR_NAME);
        for artifact in picks {
            let dest = models_dir.join(&artifact.file_name);
            actions.push(apply(&artifact.path, &dest, policy, sink)?);
        }
        Ok(())
    }

    /// Deferred best-only mode: write the winners of every identity.
    ///
    /// Metadata comes from the run holding the newest winner (encoder first
    /// on equal mtimes). Returns the identities whose transfer failed.
    fn transfer_global_best(
        &self,
        state: &SelectionState,
        sink: &mut dyn TraceSink,
        report: &mut ConsolidationReport,
    ) -> Result<Vec<Identity>> {
        let mut winners: BTreeMap<Identity, Vec<Artifact>> = BTreeMap::new();
        for (identity, role, artifact) in state.iter() {
            debug!("Global best {} {}: {}", identity, role, artifact.path.display());
            winners.entry(identity).or_default().push(artifact.clone());
        }

        let mut failed = Vec::new();
        for (identity, picks) in winners {
            let Some(newest) = picks
                .iter()
                .reduce(|best, a| if a.modified > best.modified { a } else { best })
            else {
                continue;
            };
            let source_run = Run {
                path: run_dir_of(&newest.path).to_path_buf(),
                identity: Some(identity),
            };
            if let Err(e) = self.transfer_run(identity, &source_run, &picks, sink, &mut report.actions) {
                self.record_failure(&source_run.path, e, sink, report)?;
                failed.push(identity);
            }
        }
        Ok(failed)
    }

    fn skip(&self, sink: &mut dyn TraceSink, reason: SkipReason, message: String) -> RunOutcome {
        warn!("{}", message);
        sink.record(TraceLine::Warn(message));
        RunOutcome::Skipped(reason)
    }

    /// Record a failed run, or abort the pass under `fail_fast`.
    fn record_failure(
        &self,
        run: &Path,
        err: ReorgError,
        sink: &mut dyn TraceSink,
        report: &mut ConsolidationReport,
    ) -> Result<()> {
        let message = err.to_string();
        error!("Run {} failed: {}", run.display(), message);
        sink.record(TraceLine::Error(format!(
            "Run {} failed: {}",
            run.display(),
            message
        )));
        if self.options.fail_fast {
            return Err(ReorgError::RunFailed {
                run: run.to_path_buf(),
                message,
            });
        }
        report.failures.push(RunFailure {
            path: run.to_path_buf(),
            message,
        });
        Ok(())
    }
}

/// `<run>/models/<file>` -> `<run>`.
fn run_dir_of(artifact: &Path) -> &Path {
    artifact
        .parent()
        .and_then(Path::parent)
        .unwrap_or(artifact)
}
