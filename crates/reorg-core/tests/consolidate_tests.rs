//! End-to-end consolidation passes over temporary source trees.

use reorg_core::{
    ActionKind, BestCopyTiming, ConsolidateOptions, Consolidator, NullSink, ReorgError,
    SkipReason, TraceLine,
};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;
use walkdir::WalkDir;

/// Create a test environment with empty source and destination roots.
fn create_test_env() -> (TempDir, PathBuf, PathBuf) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let src = temp_dir.path().join("out").join("2025.08.17");
    let dst = temp_dir.path().join("checkpoint_reorganized").join("2025.08.17");
    fs::create_dir_all(&src).unwrap();
    (temp_dir, src, dst)
}

fn write_file(path: &Path, contents: &str, secs: u64) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
    File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
        .unwrap();
}

/// Relative path -> contents of every file under `root`.
fn snapshot(root: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    if !root.exists() {
        return BTreeMap::new();
    }
    WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let rel = e.path().strip_prefix(root).unwrap().to_path_buf();
            (rel, fs::read(e.path()).unwrap())
        })
        .collect()
}

fn populate_sweep(src: &Path) {
    let right = src.join("run_right_index");
    write_file(&right.join("models/encoder_001_best.pt"), "enc-1", 100);
    write_file(&right.join("models/decoder_001_best.pt"), "dec-1", 100);
    write_file(&right.join("models/encoder_001.pt"), "enc-1-last", 150);
    write_file(&right.join(".hydra/config.yaml"), "lr: 0.001", 100);
    write_file(&right.join(".hydra/hydra.yaml"), "run: {}", 100);

    let left = src.join("left-thumb").join("seed_0");
    write_file(&left.join("models/encoder_004_best.pt"), "enc-4", 300);
    write_file(&left.join("dataset_stats.pkl"), "stats", 300);
}

#[test]
fn test_best_only_layout() {
    let (_temp, src, dst) = create_test_env();
    populate_sweep(&src);

    let report = Consolidator::new(ConsolidateOptions::new(&src, &dst))
        .unwrap()
        .run(&mut NullSink)
        .unwrap();

    let files: Vec<PathBuf> = snapshot(&dst).into_keys().collect();
    assert_eq!(
        files,
        vec![
            PathBuf::from("left_thumb/dataset_stats.pkl"),
            PathBuf::from("left_thumb/models/encoder_004_best.pt"),
            PathBuf::from("right_index/.hydra/config.yaml"),
            PathBuf::from("right_index/.hydra/hydra.yaml"),
            PathBuf::from("right_index/models/decoder_001_best.pt"),
            PathBuf::from("right_index/models/encoder_001_best.pt"),
        ]
    );
    assert_eq!(report.runs_found, 2);
    assert_eq!(report.runs_processed, 2);
    assert_eq!(report.selections.len(), 3);
    assert!(report.is_success());
}

#[test]
fn test_latest_run_wins_for_shared_identity() {
    let (_temp, src, dst) = create_test_env();
    write_file(&src.join("run_right_index/models/encoder_001_best.pt"), "old", 100);
    write_file(&src.join("run_right-index-v2/models/encoder_002_best.pt"), "new", 200);

    Consolidator::new(ConsolidateOptions::new(&src, &dst))
        .unwrap()
        .run(&mut NullSink)
        .unwrap();

    let models: Vec<PathBuf> = snapshot(&dst.join("right_index/models")).into_keys().collect();
    assert_eq!(models, vec![PathBuf::from("encoder_002_best.pt")]);
}

#[test]
fn test_latest_run_wins_regardless_of_scan_order() {
    let (_temp, src, dst) = create_test_env();
    // The newer run sorts last here.
    write_file(&src.join("a_right_index/models/encoder_001_best.pt"), "old", 100);
    write_file(&src.join("b_right_index/models/encoder_002_best.pt"), "new", 200);

    Consolidator::new(ConsolidateOptions::new(&src, &dst))
        .unwrap()
        .run(&mut NullSink)
        .unwrap();

    let models: Vec<PathBuf> = snapshot(&dst.join("right_index/models")).into_keys().collect();
    assert_eq!(models, vec![PathBuf::from("encoder_002_best.pt")]);
}

#[test]
fn test_run_without_models_is_skipped() {
    let (_temp, src, dst) = create_test_env();
    write_file(&src.join("left_pinky_trial/checkpoints/encoder_best.pt"), "x", 10);
    write_file(&src.join("left_pinky_trial/.hydra/config.yaml"), "cfg", 10);

    let mut trace = Vec::new();
    let report = Consolidator::new(ConsolidateOptions::new(&src, &dst))
        .unwrap()
        .run(&mut trace)
        .unwrap();

    assert_eq!(report.runs_found, 0);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].reason, SkipReason::MissingModelsDir);
    assert!(snapshot(&dst).is_empty());
    assert!(trace.iter().any(|l| matches!(
        l,
        TraceLine::Warn(m) if m.starts_with("Missing models dir for:") && m.ends_with("left_pinky_trial")
    )));
    assert!(trace
        .iter()
        .any(|line| line.to_string().starts_with("No runs with 'models' found")));
}

#[test]
fn test_unrecognized_identity_is_skipped_with_warning() {
    let (_temp, src, dst) = create_test_env();
    write_file(&src.join("baseline/models/encoder_best.pt"), "x", 10);
    write_file(&src.join("right_ring/models/encoder_best.pt"), "y", 10);

    let mut trace = Vec::new();
    let report = Consolidator::new(ConsolidateOptions::new(&src, &dst))
        .unwrap()
        .run(&mut trace)
        .unwrap();

    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].reason, SkipReason::UnrecognizedIdentity);
    assert_eq!(report.runs_processed, 1);
    assert!(trace.iter().any(|l| matches!(
        l,
        TraceLine::Warn(m) if m.starts_with("Could not parse side/finger")
    )));
    assert!(dst.join("right_ring/models/encoder_best.pt").exists());
}

#[test]
fn test_all_artifacts_copies_everything() {
    let (_temp, src, dst) = create_test_env();
    let run = src.join("right_middle");
    write_file(&run.join("models/encoder_010.pt"), "a", 10);
    write_file(&run.join("models/encoder_020_best.pt"), "b", 20);
    write_file(&run.join("models/decoder_020.pt"), "c", 20);
    write_file(&run.join("models/README.md"), "not a checkpoint", 20);

    let mut options = ConsolidateOptions::new(&src, &dst);
    options.all_artifacts = true;
    let report = Consolidator::new(options).unwrap().run(&mut NullSink).unwrap();

    let models: Vec<PathBuf> = snapshot(&dst.join("right_middle/models")).into_keys().collect();
    assert_eq!(
        models,
        vec![
            PathBuf::from("decoder_020.pt"),
            PathBuf::from("encoder_010.pt"),
            PathBuf::from("encoder_020_best.pt"),
        ]
    );
    assert!(report.selections.is_empty());
}

#[test]
fn test_rerun_is_idempotent() {
    let (_temp, src, dst) = create_test_env();
    populate_sweep(&src);
    let options = ConsolidateOptions::new(&src, &dst);

    Consolidator::new(options.clone()).unwrap().run(&mut NullSink).unwrap();
    let first = snapshot(&dst);

    let report = Consolidator::new(options).unwrap().run(&mut NullSink).unwrap();
    let second = snapshot(&dst);

    assert_eq!(first, second);
    assert!(report.actions.iter().all(|a| a.kind == ActionKind::Overwrite));
}

#[test]
fn test_dry_run_leaves_destination_unchanged() {
    let (_temp, src, dst) = create_test_env();
    populate_sweep(&src);
    write_file(&dst.join("right_index/models/encoder_001_best.pt"), "stale", 1);
    let before_dst = snapshot(&dst);
    let before_src = snapshot(&src);

    let mut options = ConsolidateOptions::new(&src, &dst);
    options.dry_run = true;
    options.move_files = true;
    let mut trace = Vec::new();
    let report = Consolidator::new(options).unwrap().run(&mut trace).unwrap();

    assert_eq!(snapshot(&dst), before_dst);
    assert_eq!(snapshot(&src), before_src);
    assert!(!report.actions.is_empty());
    assert!(report.actions.iter().all(|a| a.dry_run));
    assert!(trace.iter().any(|l| matches!(l, TraceLine::Remove { .. })));
    assert!(trace.iter().any(|l| matches!(l, TraceLine::Move { .. })));
}

#[test]
fn test_dry_run_does_not_create_destination_root() {
    let (_temp, src, dst) = create_test_env();
    populate_sweep(&src);

    let mut options = ConsolidateOptions::new(&src, &dst);
    options.dry_run = true;
    Consolidator::new(options).unwrap().run(&mut NullSink).unwrap();

    assert!(!dst.exists());
}

#[test]
fn test_keep_existing_preserves_destination() {
    let (_temp, src, dst) = create_test_env();
    populate_sweep(&src);
    write_file(&dst.join("right_index/models/encoder_001_best.pt"), "curated", 1);

    let mut options = ConsolidateOptions::new(&src, &dst);
    options.keep_existing = true;
    let report = Consolidator::new(options).unwrap().run(&mut NullSink).unwrap();

    assert_eq!(
        fs::read_to_string(dst.join("right_index/models/encoder_001_best.pt")).unwrap(),
        "curated"
    );
    assert_eq!(report.action_counts().kept_existing, 1);
    assert_eq!(
        fs::read_to_string(dst.join("right_index/models/decoder_001_best.pt")).unwrap(),
        "dec-1"
    );
}

#[test]
fn test_move_empties_selected_sources() {
    let (_temp, src, dst) = create_test_env();
    populate_sweep(&src);

    let mut options = ConsolidateOptions::new(&src, &dst);
    options.move_files = true;
    let report = Consolidator::new(options).unwrap().run(&mut NullSink).unwrap();

    assert!(!src.join("run_right_index/models/encoder_001_best.pt").exists());
    assert!(!src.join("run_right_index/.hydra/config.yaml").exists());
    // Unselected checkpoints stay behind.
    assert!(src.join("run_right_index/models/encoder_001.pt").exists());
    assert!(dst.join("right_index/models/encoder_001_best.pt").exists());
    assert_eq!(report.action_counts().moved, report.actions.len());
}

#[test]
fn test_copy_preserves_modification_time() {
    let (_temp, src, dst) = create_test_env();
    write_file(&src.join("right_index/models/encoder_best.pt"), "w", 1_234_567);

    Consolidator::new(ConsolidateOptions::new(&src, &dst))
        .unwrap()
        .run(&mut NullSink)
        .unwrap();

    let modified = fs::metadata(dst.join("right_index/models/encoder_best.pt"))
        .unwrap()
        .modified()
        .unwrap();
    assert_eq!(modified, SystemTime::UNIX_EPOCH + Duration::from_secs(1_234_567));
}

#[test]
fn test_report_lists_global_best() {
    let (_temp, src, dst) = create_test_env();
    write_file(&src.join("right_index_a/models/decoder_1_best.pt"), "a", 100);
    write_file(&src.join("right_index_b/models/decoder_2_best.pt"), "b", 500);
    let report_path = dst.join("report.json");

    let report = Consolidator::new(ConsolidateOptions::new(&src, &dst))
        .unwrap()
        .run(&mut NullSink)
        .unwrap();
    report.write_json(&report_path).unwrap();

    let value: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&report_path).unwrap()).unwrap();
    assert_eq!(value["runs_found"], 2);
    assert_eq!(value["selections"][0]["role"], "decoder");
    assert!(value["selections"][0]["path"]
        .as_str()
        .unwrap()
        .ends_with("decoder_2_best.pt"));
}

/// A directory where a file should land makes every write to it fail.
fn block_destination(dst: &Path, rel: &str) {
    fs::create_dir_all(dst.join(rel)).unwrap();
}

#[test]
fn test_metadata_follows_global_best() {
    let (_temp, src, dst) = create_test_env();
    let a = src.join("a_right_index");
    write_file(&a.join("models/encoder_002_best.pt"), "enc-a", 200);
    write_file(&a.join(".hydra/config.yaml"), "config-of-A", 200);
    write_file(&a.join("dataset_stats.pkl"), "stats-A", 200);
    let b = src.join("b_right_index");
    write_file(&b.join("models/encoder_001_best.pt"), "enc-b", 100);
    write_file(&b.join(".hydra/config.yaml"), "config-of-B", 100);
    write_file(&b.join("dataset_stats.pkl"), "stats-B", 100);

    let report = Consolidator::new(ConsolidateOptions::new(&src, &dst))
        .unwrap()
        .run(&mut NullSink)
        .unwrap();

    let out = dst.join("right_index");
    let models: Vec<PathBuf> = snapshot(&out.join("models")).into_keys().collect();
    assert_eq!(models, vec![PathBuf::from("encoder_002_best.pt")]);
    assert_eq!(fs::read_to_string(out.join(".hydra/config.yaml")).unwrap(), "config-of-A");
    assert_eq!(fs::read_to_string(out.join("dataset_stats.pkl")).unwrap(), "stats-A");
    // One config, one stats file, one checkpoint.
    assert_eq!(report.actions.len(), 3);
}

#[test]
fn test_metadata_comes_from_run_of_newest_role() {
    let (_temp, src, dst) = create_test_env();
    let a = src.join("a_left_middle");
    write_file(&a.join("models/encoder_1_best.pt"), "enc", 300);
    write_file(&a.join(".hydra/config.yaml"), "config-of-A", 300);
    let b = src.join("b_left_middle");
    write_file(&b.join("models/decoder_1_best.pt"), "dec", 100);
    write_file(&b.join(".hydra/config.yaml"), "config-of-B", 100);

    Consolidator::new(ConsolidateOptions::new(&src, &dst))
        .unwrap()
        .run(&mut NullSink)
        .unwrap();

    let out = dst.join("left_middle");
    assert!(out.join("models/encoder_1_best.pt").exists());
    assert!(out.join("models/decoder_1_best.pt").exists());
    assert_eq!(fs::read_to_string(out.join(".hydra/config.yaml")).unwrap(), "config-of-A");
}

#[test]
fn test_failed_run_is_not_promoted() {
    let (_temp, src, dst) = create_test_env();
    let run = src.join("right_index");
    write_file(&run.join("models/encoder_9_best.pt"), "enc", 100);
    write_file(&run.join(".hydra/config.yaml"), "cfg", 100);
    block_destination(&dst, "right_index/.hydra/config.yaml");

    let mut trace = Vec::new();
    let report = Consolidator::new(ConsolidateOptions::new(&src, &dst))
        .unwrap()
        .run(&mut trace)
        .unwrap();

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].path, run);
    assert!(!report.is_success());
    assert!(report.selections.is_empty());
    assert!(!dst.join("right_index/models/encoder_9_best.pt").exists());
    assert!(trace.iter().any(|l| matches!(l, TraceLine::Error(m) if m.contains("failed"))));
}

#[test]
fn test_failed_run_does_not_displace_earlier_pick() {
    let (_temp, src, dst) = create_test_env();
    // Newer run fails on its config; the older run has no config to copy.
    let a = src.join("a_right_index");
    write_file(&a.join("models/encoder_2_best.pt"), "newer", 200);
    write_file(&a.join(".hydra/config.yaml"), "cfg", 200);
    let b = src.join("b_right_index");
    write_file(&b.join("models/encoder_1_best.pt"), "older", 100);
    block_destination(&dst, "right_index/.hydra/config.yaml");

    let mut options = ConsolidateOptions::new(&src, &dst);
    options.best_copy = BestCopyTiming::PerRun;
    let report = Consolidator::new(options).unwrap().run(&mut NullSink).unwrap();

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].path, a);
    assert_eq!(report.runs_processed, 1);
    assert_eq!(report.selections.len(), 1);
    assert!(report.selections[0].path.starts_with(&b));
    let models: Vec<PathBuf> = snapshot(&dst.join("right_index/models")).into_keys().collect();
    assert_eq!(models, vec![PathBuf::from("encoder_1_best.pt")]);
}

#[test]
fn test_failure_is_recorded_and_pass_continues() {
    let (_temp, src, dst) = create_test_env();
    let broken = src.join("a_right_index");
    write_file(&broken.join("models/encoder_1_best.pt"), "enc", 100);
    write_file(&broken.join(".hydra/config.yaml"), "cfg", 100);
    write_file(&src.join("b_left_ring/models/decoder_1_best.pt"), "dec", 100);
    block_destination(&dst, "right_index/.hydra/config.yaml");

    let mut options = ConsolidateOptions::new(&src, &dst);
    options.best_copy = BestCopyTiming::PerRun;
    let report = Consolidator::new(options).unwrap().run(&mut NullSink).unwrap();

    assert_eq!(report.runs_found, 2);
    assert_eq!(report.runs_processed, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].path, broken);
    assert!(dst.join("left_ring/models/decoder_1_best.pt").exists());
}

#[test]
fn test_fail_fast_aborts_pass() {
    let (_temp, src, dst) = create_test_env();
    let broken = src.join("a_right_index");
    write_file(&broken.join("models/encoder_1_best.pt"), "enc", 100);
    write_file(&broken.join(".hydra/config.yaml"), "cfg", 100);
    write_file(&src.join("b_left_ring/models/decoder_1_best.pt"), "dec", 100);
    block_destination(&dst, "right_index/.hydra/config.yaml");

    let mut options = ConsolidateOptions::new(&src, &dst);
    options.best_copy = BestCopyTiming::PerRun;
    options.fail_fast = true;
    let err = Consolidator::new(options)
        .unwrap()
        .run(&mut NullSink)
        .unwrap_err();

    match err {
        ReorgError::RunFailed { run, .. } => assert_eq!(run, broken),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!dst.join("left_ring").exists());
}
