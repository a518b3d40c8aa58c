//! Run orchestration: resolve what to run, create the run namespace, then
//! invoke every (workload, size, runtime) triple in order.
//!
//! Everything that can be rejected up front (unknown workload, missing sweep,
//! bad configuration, an existing namespace) is an error returned from
//! [`Orchestrator::run`]. Failures inside a single invocation are logged and
//! collected in the [`RunSummary`]; the run carries on.

use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::config::HarnessConfig;
use crate::runtime::{Invocation, InvocationOutcome, Runner};
use crate::schema::RunMeta;
use crate::workloads::REGISTRY;
use crate::{ErrorKind, HarnessError, Runtime};

/// What a run covers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Target {
    /// One workload at its default size.
    Single(String),
    /// Every catalog workload at its default size.
    All,
    /// Every catalog workload across its sweep sizes.
    Full,
}

impl Target {
    pub fn parse(s: &str) -> Self {
        match s {
            "all" => Target::All,
            "full" => Target::Full,
            name => Target::Single(name.to_string()),
        }
    }

    pub fn mode(&self) -> &'static str {
        match self {
            Target::Single(_) => "single",
            Target::All => "all",
            Target::Full => "full",
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Single(name) => f.write_str(name),
            Target::All => f.write_str("all"),
            Target::Full => f.write_str("full"),
        }
    }
}

/// A workload the orchestrator knows how to size.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CatalogEntry {
    pub name: String,
    pub default_size: u64,
    pub sweep: Vec<u64>,
    /// Has an in-process implementation for the `native` runtime.
    pub native: bool,
}

/// Registry workloads with configured size overrides applied, plus workloads
/// that exist only in configuration (and the corpus). Sorted by name.
pub fn catalog(config: &HarnessConfig) -> Result<Vec<CatalogEntry>, HarnessError> {
    let mut entries: Vec<CatalogEntry> = REGISTRY
        .iter()
        .map(|def| {
            let sizes = config.workloads.get(def.name);
            CatalogEntry {
                name: def.name.to_string(),
                default_size: sizes
                    .and_then(|s| s.default_size)
                    .unwrap_or(def.default_size),
                sweep: sizes
                    .and_then(|s| s.sweep.clone())
                    .unwrap_or_else(|| def.sweep.to_vec()),
                native: true,
            }
        })
        .collect();

    for (name, sizes) in &config.workloads {
        if entries.iter().any(|e| &e.name == name) {
            continue;
        }
        let sweep = sizes.sweep.clone().unwrap_or_default();
        let default_size = sizes
            .default_size
            .or_else(|| sweep.first().copied())
            .ok_or_else(|| {
                HarnessError::Config(format!(
                    "workloads.{name} needs a default_size or a sweep"
                ))
            })?;
        entries.push(CatalogEntry {
            name: name.clone(),
            default_size,
            sweep,
            native: false,
        });
    }

    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

/// One (workload, size) step of a run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlanItem {
    pub workload: String,
    pub size: u64,
    /// Appended to record keys; `_<size>` in sweep runs.
    pub key_suffix: String,
}

/// Resolve `target` against the catalog without touching the filesystem.
pub fn plan(target: &Target, catalog: &[CatalogEntry]) -> Result<Vec<PlanItem>, HarnessError> {
    let at_default = |e: &CatalogEntry| PlanItem {
        workload: e.name.clone(),
        size: e.default_size,
        key_suffix: String::new(),
    };

    match target {
        Target::Single(name) => catalog
            .iter()
            .find(|e| &e.name == name)
            .map(|e| vec![at_default(e)])
            .ok_or_else(|| HarnessError::UnknownWorkload(name.clone())),
        Target::All => Ok(catalog.iter().map(at_default).collect()),
        Target::Full => {
            let mut items = Vec::new();
            for e in catalog {
                if e.sweep.is_empty() {
                    return Err(HarnessError::UnknownSize(e.name.clone()));
                }
                items.extend(e.sweep.iter().map(|&size| PlanItem {
                    workload: e.name.clone(),
                    size,
                    key_suffix: format!("_{size}"),
                }));
            }
            Ok(items)
        }
    }
}

/// Default run id for a target started at `unix_secs`.
pub fn default_run_id(target: &Target, catalog: &[CatalogEntry], unix_secs: u64) -> String {
    match target {
        Target::Single(name) => {
            let size = catalog
                .iter()
                .find(|e| &e.name == name)
                .map(|e| e.default_size)
                .unwrap_or_default();
            format!("{name}_{size}_{unix_secs}")
        }
        Target::All => format!("all_{unix_secs}"),
        Target::Full => format!("full_{unix_secs}"),
    }
}

#[derive(Clone, Debug)]
pub struct RunRequest {
    pub target: Target,
    pub run_id: Option<String>,
    /// Overrides `runner.bench_time`.
    pub bench: Option<Duration>,
    /// Overrides `runner.warmup_time`.
    pub warmup: Option<Duration>,
    /// Overrides `runner.runtimes`.
    pub runtimes: Vec<Runtime>,
}

impl RunRequest {
    pub fn new(target: Target) -> Self {
        Self {
            target,
            run_id: None,
            bench: None,
            warmup: None,
            runtimes: Vec::new(),
        }
    }
}

#[derive(Debug)]
pub enum InvocationStatus {
    /// The driver finished; `records` are the files it added to the namespace.
    Completed { records: Vec<PathBuf> },
    /// `native` was requested for a workload with no in-process implementation.
    Skipped,
    Failed { kind: ErrorKind, message: String },
}

#[derive(Debug)]
pub struct InvocationResult {
    pub workload: String,
    pub size: u64,
    pub runtime: Runtime,
    pub status: InvocationStatus,
}

#[derive(Debug)]
pub struct RunSummary {
    pub run_id: String,
    pub namespace: PathBuf,
    pub invocations: Vec<InvocationResult>,
}

impl RunSummary {
    pub fn records(&self) -> impl Iterator<Item = &PathBuf> {
        self.invocations.iter().flat_map(|inv| match &inv.status {
            InvocationStatus::Completed { records } => records.as_slice(),
            _ => &[] as &[PathBuf],
        })
    }

    pub fn failures(&self) -> impl Iterator<Item = &InvocationResult> {
        self.invocations
            .iter()
            .filter(|inv| matches!(inv.status, InvocationStatus::Failed { .. }))
    }
}

pub struct Orchestrator<'a> {
    config: &'a HarnessConfig,
}

impl<'a> Orchestrator<'a> {
    pub fn new(config: &'a HarnessConfig) -> Self {
        Self { config }
    }

    pub fn run(&self, req: &RunRequest) -> Result<RunSummary, HarnessError> {
        let catalog = catalog(self.config)?;
        let items = plan(&req.target, &catalog)?;

        let mut driver = self.config.driver_config()?;
        if let Some(warmup) = req.warmup {
            driver.warmup = warmup;
        }
        if let Some(bench) = req.bench {
            if bench.is_zero() {
                return Err(HarnessError::Config(
                    "measurement window must be > 0".to_string(),
                ));
            }
            driver.bench = bench;
        }

        let runtimes = dedup(if req.runtimes.is_empty() {
            &self.config.runner.runtimes
        } else {
            &req.runtimes
        });

        let started = unix_secs();
        let run_id = match &req.run_id {
            Some(id) => validate_run_id(id)?,
            None => default_run_id(&req.target, &catalog, started),
        };

        let namespace = create_namespace(&self.config.paths.results_dir, &run_id)?;
        RunMeta {
            schema_version: crate::schema::SCHEMA_VERSION,
            bench_version: env!("CARGO_PKG_VERSION").to_string(),
            run_id: run_id.clone(),
            mode: req.target.mode().to_string(),
            timestamp_utc: format!("unix:{started}"),
            git_sha: git_sha_short(),
            runtimes: runtimes.iter().map(|r| r.tag().to_string()).collect(),
            warmup_time: driver.warmup.as_secs_f64(),
            bench_time: driver.bench.as_secs_f64(),
        }
        .write(&namespace)?;

        tracing::info!(
            %run_id,
            mode = req.target.mode(),
            steps = items.len() * runtimes.len(),
            "writing results to {}",
            namespace.display()
        );

        let runner = Runner::new(self.config, driver);
        let mut invocations = Vec::with_capacity(items.len() * runtimes.len());
        for item in &items {
            for &runtime in &runtimes {
                let inv = Invocation {
                    workload: &item.workload,
                    size: item.size,
                    run_id: &run_id,
                    namespace: &namespace,
                    key_suffix: &item.key_suffix,
                };
                let status = invoke_isolated(&runner, runtime, &inv);
                invocations.push(InvocationResult {
                    workload: item.workload.clone(),
                    size: item.size,
                    runtime,
                    status,
                });
            }
        }

        Ok(RunSummary {
            run_id,
            namespace,
            invocations,
        })
    }
}

fn invoke_isolated(runner: &Runner<'_>, runtime: Runtime, inv: &Invocation<'_>) -> InvocationStatus {
    tracing::info!("----- Running {} ({}) - {runtime}", inv.workload, inv.size);

    let before = snapshot(inv.namespace);
    match runner.invoke(runtime, inv) {
        Ok(InvocationOutcome::Unsupported) => {
            tracing::info!(
                workload = inv.workload,
                "no in-process implementation, skipping native"
            );
            InvocationStatus::Skipped
        }
        Ok(_) => {
            let records = snapshot(inv.namespace)
                .difference(&before)
                .cloned()
                .collect();
            InvocationStatus::Completed { records }
        }
        Err(e) => {
            let kind = e.kind();
            if kind == ErrorKind::Correctness {
                tracing::error!(
                    workload = inv.workload,
                    %runtime,
                    kind = kind.as_str(),
                    "workload is wrong, not slow: {e}"
                );
            } else {
                tracing::warn!(
                    workload = inv.workload,
                    %runtime,
                    kind = kind.as_str(),
                    "{e}"
                );
            }
            InvocationStatus::Failed {
                kind,
                message: e.to_string(),
            }
        }
    }
}

fn snapshot(dir: &Path) -> BTreeSet<PathBuf> {
    fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .map(|e| e.path())
                .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
                .collect()
        })
        .unwrap_or_default()
}

/// Create `<results_dir>/<run_id>`, refusing to reuse an existing one.
pub fn create_namespace(results_dir: &Path, run_id: &str) -> Result<PathBuf, HarnessError> {
    fs::create_dir_all(results_dir)?;
    let namespace = results_dir.join(run_id);
    match fs::create_dir(&namespace) {
        Ok(()) => Ok(namespace),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            Err(HarnessError::RunExists(namespace))
        }
        Err(e) => Err(e.into()),
    }
}

fn validate_run_id(id: &str) -> Result<String, HarnessError> {
    let bad = id.is_empty()
        || id == "."
        || id == ".."
        || id.contains(|c: char| c == '/' || c == '\\');
    if bad {
        return Err(HarnessError::Config(format!("invalid run id `{id}`")));
    }
    Ok(id.to_string())
}

fn dedup(runtimes: &[Runtime]) -> Vec<Runtime> {
    let mut seen = BTreeSet::new();
    runtimes.iter().copied().filter(|r| seen.insert(*r)).collect()
}

fn unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn git_sha_short() -> Option<String> {
    // Set by CI or build scripts.
    std::env::var("GIT_SHA")
        .ok()
        .or_else(|| std::env::var("GITHUB_SHA").ok())
        .map(|s| s.chars().take(12).collect())
}
