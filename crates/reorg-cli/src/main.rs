//! reorganize-checkpoints - collect per-run checkpoints into a side/digit layout.
//!
//! Action trace lines go to stdout; diagnostics go to stderr through
//! `tracing`.

use anyhow::{Context, Result};
use clap::Parser;
use reorg_core::{
    BestCopyTiming, ConsolidateOptions, Consolidator, OptionsFile, TraceLine, TraceSink,
};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "reorganize-checkpoints")]
#[command(about = "Reorganize checkpoints by finger into a compact layout")]
struct Args {
    /// Source date folder, e.g. out/2025.08.17
    #[arg(long)]
    src: Option<PathBuf>,

    /// Destination date folder, e.g. checkpoint_reorganized/2025.08.17
    #[arg(long)]
    dst: Option<PathBuf>,

    /// Copy all *.pt files (default: only *_best.pt)
    #[arg(long)]
    all_models: bool,

    /// Move files instead of copying
    #[arg(long = "move")]
    move_files: bool,

    /// Print actions only
    #[arg(long)]
    dry_run: bool,

    /// Do not overwrite if the destination file exists
    #[arg(long)]
    keep_existing: bool,

    /// Copy each run's best checkpoints as soon as the run is processed
    /// instead of only the newest across the whole pass
    #[arg(long)]
    copy_each_run: bool,

    /// Abort the pass on the first run that fails
    #[arg(long)]
    fail_fast: bool,

    /// Name of the dataset statistics file next to each run
    #[arg(long, value_name = "NAME")]
    stats_file: Option<String>,

    /// Extra directory searched for the statistics file (repeatable)
    #[arg(long = "stats-dir", value_name = "DIR")]
    stats_dirs: Vec<PathBuf>,

    /// JSON options file; command-line flags override its values
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write a JSON report of the pass to this file
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

impl Args {
    /// Flags that were actually given, as an overlay for the options file.
    fn overrides(&self) -> OptionsFile {
        let flag = |set: bool| set.then_some(true);
        OptionsFile {
            source_root: self.src.clone(),
            destination_root: self.dst.clone(),
            all_artifacts: flag(self.all_models),
            move_files: flag(self.move_files),
            dry_run: flag(self.dry_run),
            keep_existing: flag(self.keep_existing),
            best_copy: self.copy_each_run.then_some(BestCopyTiming::PerRun),
            fail_fast: flag(self.fail_fast),
            stats_file: self.stats_file.clone(),
            extra_stats_dirs: (!self.stats_dirs.is_empty()).then(|| self.stats_dirs.clone()),
            config_files: None,
        }
    }

    fn options(&self) -> Result<ConsolidateOptions> {
        let base = match &self.config {
            Some(path) => OptionsFile::load(path)
                .with_context(|| format!("loading options from {}", path.display()))?,
            None => OptionsFile::default(),
        };
        let options = base.merge(self.overrides()).resolve()?;
        Ok(options)
    }
}

/// Prints each trace line to stdout as it happens.
struct StdoutSink {
    out: std::io::Stdout,
}

impl TraceSink for StdoutSink {
    fn record(&mut self, line: TraceLine) {
        // A closed stdout must not abort a half-finished pass.
        let _ = writeln!(self.out.lock(), "{}", line);
    }
}

fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter = if debug {
        EnvFilter::new(default_level)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
    };
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();
    init_logging(args.debug);

    let options = args.options()?;
    debug!(?options, "Resolved options");
    info!(
        "Reorganizing {} -> {}",
        options.source_root.display(),
        options.destination_root.display()
    );

    let consolidator = Consolidator::new(options)?;
    let mut sink = StdoutSink {
        out: std::io::stdout(),
    };
    let report = consolidator.run(&mut sink)?;

    if let Some(path) = &args.report {
        report
            .write_json(path)
            .with_context(|| format!("writing report to {}", path.display()))?;
        info!("Report written to {}", path.display());
    }

    if report.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        error!("{} run(s) failed", report.failures.len());
        Ok(ExitCode::FAILURE)
    }
}
