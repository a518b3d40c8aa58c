//! End-to-end tests for crossbench
//!
//! These drive the orchestrator against a throwaway corpus and results tree.

use std::fs;
use std::path::Path;

use crossbench::config::{HarnessConfig, WorkloadSizes};
use crossbench::orchestrator::{InvocationStatus, Orchestrator, RunRequest, Target};
use crossbench::schema::{ResultRecord, MANIFEST_FILE};
use crossbench::{ErrorKind, HarnessError, Runtime};
use tempfile::tempdir;

fn quick_config(root: &Path) -> HarnessConfig {
    let mut config = HarnessConfig::default();
    config.paths.corpus_dir = root.join("benches");
    config.paths.staging_dir = root.join("tmp");
    config.paths.results_dir = root.join("bench_times");
    config.runner.runtimes = vec![Runtime::Native];
    config.runner.warmup_time = "1ms".to_string();
    config.runner.bench_time = "5ms".to_string();
    config
}

fn sizes(default_size: u64, sweep: &[u64]) -> WorkloadSizes {
    WorkloadSizes {
        default_size: Some(default_size),
        sweep: Some(sweep.to_vec()),
    }
}

/// A sweep run keeps one namespace and keys every record by size
#[test]
fn test_full_sweep_keys_records_by_size() {
    let dir = tempdir().unwrap();
    let mut config = quick_config(dir.path());
    config.workloads.insert("crc16".to_string(), sizes(64, &[16, 64]));
    config.workloads.insert("matmul".to_string(), sizes(4, &[2, 4]));
    config.workloads.insert("quicksort".to_string(), sizes(32, &[32]));
    config.workloads.insert("softmax".to_string(), sizes(8, &[8]));

    let mut req = RunRequest::new(Target::Full);
    req.run_id = Some("sweep".to_string());
    let summary = Orchestrator::new(&config).run(&req).unwrap();

    assert_eq!(summary.invocations.len(), 6);
    assert_eq!(summary.failures().count(), 0);

    let ns = dir.path().join("bench_times/sweep");
    for name in [
        "crc16_16_native.json",
        "crc16_64_native.json",
        "crc16_table_16_native.json",
        "matmul_native_2_native.json",
        "matmul_par_4_native.json",
        "quicksort_32_native.json",
        "sort_unstable_32_native.json",
        "softmax_par_8_native.json",
    ] {
        assert!(ns.join(name).is_file(), "missing {name}");
    }

    let rec = ResultRecord::load(&ns.join("matmul_par_2_native.json")).unwrap();
    assert_eq!(rec.size, 2);
    assert_eq!(rec.workload, "matmul");
    assert_eq!(rec.file, "native:matmul");
    assert!(!rec.times.is_empty());

    let manifest: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(ns.join(MANIFEST_FILE)).unwrap()).unwrap();
    assert_eq!(manifest["mode"], "full");
    assert_eq!(manifest["run_id"], "sweep");
}

/// Nothing is created when the plan cannot be resolved
#[test]
fn test_unknown_workload_touches_nothing() {
    let dir = tempdir().unwrap();
    let config = quick_config(dir.path());

    let err = Orchestrator::new(&config)
        .run(&RunRequest::new(Target::Single("nope".to_string())))
        .unwrap_err();
    assert!(matches!(err, HarnessError::UnknownWorkload(_)));
    assert!(!dir.path().join("bench_times").exists());
}

/// Reusing a run id is refused rather than mixing results
#[test]
fn test_run_id_reuse_is_refused() {
    let dir = tempdir().unwrap();
    let mut config = quick_config(dir.path());
    config.workloads.insert("softmax".to_string(), sizes(16, &[16]));

    let mut req = RunRequest::new(Target::Single("softmax".to_string()));
    req.run_id = Some("dup".to_string());
    Orchestrator::new(&config).run(&req).unwrap();

    let err = Orchestrator::new(&config).run(&req).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Orchestration);
    assert!(matches!(err, HarnessError::RunExists(_)));
}

/// Workloads that only exist in the corpus skip the native runtime and fail
/// cleanly on runtimes whose toolchain is absent
#[test]
fn test_corpus_only_workload_is_isolated() {
    let dir = tempdir().unwrap();
    let mut config = quick_config(dir.path());
    config.runner.runtimes = vec![Runtime::Native, Runtime::Mojo];
    config.toolchains.mojo = "crossbench-no-such-mojo".to_string();
    let mojo_driver = dir.path().join("bench_suite.mojo");
    fs::write(&mojo_driver, "fn main():\n    bench()\n").unwrap();
    config.paths.mojo_driver = Some(mojo_driver);

    let fib = dir.path().join("benches/fib");
    fs::create_dir_all(&fib).unwrap();
    fs::write(fib.join("fib.mojo"), "alias bench_size = 10\n\nfn main():\n    print(1)\n").unwrap();
    config.workloads.insert(
        "fib".to_string(),
        WorkloadSizes {
            default_size: Some(25),
            sweep: None,
        },
    );

    let mut req = RunRequest::new(Target::Single("fib".to_string()));
    req.run_id = Some("fib".to_string());
    let summary = Orchestrator::new(&config).run(&req).unwrap();

    assert!(matches!(summary.invocations[0].status, InvocationStatus::Skipped));
    match &summary.invocations[1].status {
        InvocationStatus::Failed { kind, .. } => assert_eq!(*kind, ErrorKind::Toolchain),
        other => panic!("unexpected {other:?}"),
    }

    // staged before the toolchain was looked up
    let staged = fs::read_to_string(dir.path().join("tmp/fib.mojo")).unwrap();
    assert!(staged.contains("alias bench_size = 25"));
    assert!(staged.contains("bench()"));
}

/// External drivers get the calling convention through args and environment
#[cfg(unix)]
#[test]
fn test_external_driver_convention() {
    let dir = tempdir().unwrap();
    let mut config = quick_config(dir.path());
    config.runner.runtimes = vec![Runtime::Python];
    config.toolchains.python = "sh".to_string();
    let driver = dir.path().join("driver.sh");
    fs::write(
        &driver,
        "printf '%s|%s|%s|%s|%s' \"$1\" \"$2\" \"$3\" \"$4\" \"$CROSSBENCH_WORKLOAD\" \
         > \"$CROSSBENCH_RESULTS_DIR/demo${CROSSBENCH_KEY_SUFFIX}_py.json\"\n",
    )
    .unwrap();
    config.paths.python_driver = Some(driver);

    let fib = dir.path().join("benches/fib");
    fs::create_dir_all(&fib).unwrap();
    fs::write(fib.join("fib.py"), "bench_size = 10\n").unwrap();
    config.workloads.insert("fib".to_string(), sizes(12, &[12]));

    let mut req = RunRequest::new(Target::Full);
    req.runtimes = vec![Runtime::Python];
    req.run_id = Some("ext".to_string());
    // registry workloads have no python sources here; only fib succeeds
    let summary = Orchestrator::new(&config).run(&req).unwrap();

    let out = dir.path().join("bench_times/ext/demo_12_py.json");
    let seen = fs::read_to_string(&out).unwrap();
    let parts: Vec<&str> = seen.split('|').collect();
    assert!(parts[0].ends_with("fib.py"));
    assert_eq!(parts[1], "ext");
    assert_eq!(parts[2].parse::<f64>().unwrap(), 0.001);
    assert_eq!(parts[3].parse::<f64>().unwrap(), 0.005);
    assert_eq!(parts[4], "fib");

    let fib_run = summary
        .invocations
        .iter()
        .find(|i| i.workload == "fib")
        .unwrap();
    match &fib_run.status {
        InvocationStatus::Completed { records } => assert_eq!(records, &vec![out]),
        other => panic!("unexpected {other:?}"),
    }
    assert!(summary.failures().all(|f| matches!(
        f.status,
        InvocationStatus::Failed {
            kind: ErrorKind::Staging,
            ..
        }
    )));
}
