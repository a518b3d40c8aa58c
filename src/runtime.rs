//! Per-runtime recipes: stage the workload, build it if needed, and hand it to
//! that runtime's driver.
//!
//! `native` runs in this process through the workload registry. Every other
//! runtime is a child process speaking the external driver convention:
//!
//! ```text
//! <driver...> <source-ref> <run-id> <warmup-secs> <bench-secs>
//! CROSSBENCH_WORKLOAD, CROSSBENCH_RESULTS_DIR, CROSSBENCH_KEY_SUFFIX,
//! CROSSBENCH_SOURCE_SHA256
//! ```
//!
//! Exit status 3 from a driver is a failed correctness check.
//!
//! A built-in driver ships for every external runtime (see `templates/`);
//! each can be replaced through the `[paths]` configuration.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::HarnessConfig;
use crate::corpus::Corpus;
use crate::driver::{DriverReport, RunContext};
use crate::error::EXIT_CORRECTNESS;
use crate::harness::DriverConfig;
use crate::splice::{self, EntryPoint, WORKLOAD_MARKER};
use crate::staging::{SourceFormat, StagedSource};
use crate::workloads;
use crate::{HarnessError, Runtime};

/// Built-in driver template for the `rustc` runtime.
pub const RUST_DRIVER_TEMPLATE: &str = include_str!("../templates/rust_driver.rs.in");
/// Built-in driver script for the `python` and `pypy` runtimes.
pub const PYTHON_DRIVER: &str = include_str!("../templates/bench_suite.py");
/// Built-in driver body spliced over a mojo workload's `fn main()`.
pub const MOJO_DRIVER: &str = include_str!("../templates/bench_suite.mojo");
/// Version stamped on the first line of every built-in driver.
pub const DRIVER_VERSION: u32 = 1;

/// File the built-in python driver is written to, inside the staging dir.
const PYTHON_DRIVER_FILE: &str = "crossbench_driver.py";

/// One (workload, size) pair to run under a runtime, inside a run namespace.
#[derive(Clone, Debug)]
pub struct Invocation<'a> {
    pub workload: &'a str,
    pub size: u64,
    pub run_id: &'a str,
    pub namespace: &'a Path,
    /// Empty, or `_<size>` in sweep mode.
    pub key_suffix: &'a str,
}

#[derive(Debug)]
pub enum InvocationOutcome {
    Native(DriverReport),
    /// An external driver exited cleanly.
    External { program: String },
    /// `native` was requested for a workload with no in-process implementation.
    Unsupported,
}

/// A staged source ready to hand to a runtime.
#[derive(Clone, Debug)]
pub struct Prepared {
    pub path: PathBuf,
    pub sha256: String,
}

pub struct Runner<'a> {
    config: &'a HarnessConfig,
    corpus: Corpus,
    driver: DriverConfig,
}

impl<'a> Runner<'a> {
    pub fn new(config: &'a HarnessConfig, driver: DriverConfig) -> Self {
        Self {
            config,
            corpus: Corpus::new(&config.paths.corpus_dir),
            driver,
        }
    }

    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    pub fn driver_config(&self) -> &DriverConfig {
        &self.driver
    }

    pub fn invoke(
        &self,
        runtime: Runtime,
        inv: &Invocation<'_>,
    ) -> Result<InvocationOutcome, HarnessError> {
        match runtime {
            Runtime::Native => self.invoke_native(inv),
            Runtime::Python | Runtime::Pypy => self.invoke_python(runtime, inv),
            Runtime::Mojo => self.invoke_mojo(inv),
            Runtime::Rustc => self.invoke_rustc(inv),
        }
    }

    /// Stage `workload` for `runtime` exactly as [`Runner::invoke`] would,
    /// without running anything.
    pub fn stage(
        &self,
        runtime: Runtime,
        workload: &str,
        size: u64,
    ) -> Result<Prepared, HarnessError> {
        match runtime {
            Runtime::Native => Err(HarnessError::Config(
                "the native runtime has no staged source".to_string(),
            )),
            Runtime::Python | Runtime::Pypy => self.stage_plain(workload, size, SourceFormat::Python),
            Runtime::Mojo => self.stage_mojo(workload, size),
            Runtime::Rustc => self.stage_rust(workload, size),
        }
    }

    fn invoke_native(&self, inv: &Invocation<'_>) -> Result<InvocationOutcome, HarnessError> {
        let Some(def) = workloads::lookup(inv.workload) else {
            return Ok(InvocationOutcome::Unsupported);
        };
        let source_ref = format!("native:{}", def.name);
        let ctx = RunContext {
            run_id: inv.run_id,
            namespace: inv.namespace,
            size: inv.size,
            key_suffix: inv.key_suffix,
            runtime: Runtime::Native,
            source_ref: &source_ref,
        };
        def.native
            .execute(&self.driver, &ctx)
            .map(InvocationOutcome::Native)
    }

    fn invoke_python(
        &self,
        runtime: Runtime,
        inv: &Invocation<'_>,
    ) -> Result<InvocationOutcome, HarnessError> {
        let interpreter = match runtime {
            Runtime::Pypy => &self.config.toolchains.pypy,
            _ => &self.config.toolchains.python,
        };
        let staged = self.stage_plain(inv.workload, inv.size, SourceFormat::Python)?;
        let driver = self.python_driver(inv.workload)?;
        let mut cmd = Command::new(interpreter);
        cmd.arg(&driver);
        self.run_driver(runtime, cmd, interpreter, &staged, inv)
    }

    fn invoke_mojo(&self, inv: &Invocation<'_>) -> Result<InvocationOutcome, HarnessError> {
        let staged = self.stage_mojo(inv.workload, inv.size)?;
        let mojo = &self.config.toolchains.mojo;
        self.run_driver(Runtime::Mojo, Command::new(mojo), mojo, &staged, inv)
    }

    fn invoke_rustc(&self, inv: &Invocation<'_>) -> Result<InvocationOutcome, HarnessError> {
        let staged = self.stage_rust(inv.workload, inv.size)?;
        let rustc = &self.config.toolchains.rustc;
        let binary = self
            .config
            .paths
            .staging_dir
            .join(format!("{}_rs{}", inv.workload, std::env::consts::EXE_SUFFIX));

        tracing::info!(workload = inv.workload, "compiling {}", staged.path.display());
        let status = Command::new(rustc)
            .arg(&staged.path)
            .arg("-o")
            .arg(&binary)
            .args(&self.config.toolchains.rustc_flags)
            .status()
            .map_err(|e| spawn_error(rustc, e))?;
        if !status.success() {
            return Err(HarnessError::ToolchainFailed {
                program: rustc.clone(),
                status,
            });
        }

        let program = binary.display().to_string();
        let outcome = self.run_driver(Runtime::Rustc, Command::new(&binary), &program, &staged, inv);
        if let Err(e) = fs::remove_file(&binary) {
            tracing::warn!("failed to remove {}: {e}", binary.display());
        }
        outcome
    }

    fn stage_plain(
        &self,
        workload: &str,
        size: u64,
        format: SourceFormat,
    ) -> Result<Prepared, HarnessError> {
        let staged = StagedSource::load(&self.corpus, workload, size, format)?;
        self.write(staged)
    }

    fn stage_mojo(&self, workload: &str, size: u64) -> Result<Prepared, HarnessError> {
        let mut staged = StagedSource::load(&self.corpus, workload, size, SourceFormat::Mojo)?;
        let driver_body = match &self.config.paths.mojo_driver {
            Some(path) => read_asset(workload, path)?,
            None => MOJO_DRIVER.to_string(),
        };
        staged.text = splice::replace_entry_point(&staged.text, &EntryPoint::MOJO, &driver_body);
        self.write(staged)
    }

    fn stage_rust(&self, workload: &str, size: u64) -> Result<Prepared, HarnessError> {
        let mut staged = StagedSource::load(&self.corpus, workload, size, SourceFormat::Rust)?;
        let template = match &self.config.paths.rust_template {
            Some(path) => read_asset(workload, path)?,
            None => RUST_DRIVER_TEMPLATE.to_string(),
        };
        staged.text = splice::substitute_marker(&template, WORKLOAD_MARKER, &staged.text)?;
        self.write(staged)
    }

    /// The configured python driver, or the built-in one written out next to
    /// the staged sources.
    fn python_driver(&self, workload: &str) -> Result<PathBuf, HarnessError> {
        if let Some(path) = &self.config.paths.python_driver {
            return Ok(path.clone());
        }
        let staging = &self.config.paths.staging_dir;
        let path = staging.join(PYTHON_DRIVER_FILE);
        fs::create_dir_all(staging)
            .and_then(|()| fs::write(&path, PYTHON_DRIVER))
            .map_err(|source| HarnessError::Staging {
                workload: workload.to_string(),
                path: path.clone(),
                source,
            })?;
        Ok(path)
    }

    fn write(&self, staged: StagedSource) -> Result<Prepared, HarnessError> {
        let path = staged.write_to(&self.config.paths.staging_dir)?;
        tracing::debug!(workload = %staged.workload, size = staged.size, "staged {}", path.display());
        Ok(Prepared {
            path,
            sha256: staged.sha256(),
        })
    }

    fn run_driver(
        &self,
        runtime: Runtime,
        mut cmd: Command,
        program: &str,
        staged: &Prepared,
        inv: &Invocation<'_>,
    ) -> Result<InvocationOutcome, HarnessError> {
        cmd.arg(&staged.path)
            .arg(inv.run_id)
            .arg(self.driver.warmup.as_secs_f64().to_string())
            .arg(self.driver.bench.as_secs_f64().to_string())
            .env("CROSSBENCH_WORKLOAD", inv.workload)
            .env("CROSSBENCH_RESULTS_DIR", inv.namespace)
            .env("CROSSBENCH_KEY_SUFFIX", inv.key_suffix)
            .env("CROSSBENCH_SOURCE_SHA256", &staged.sha256);

        tracing::debug!(?cmd, "spawning driver");
        let status = cmd.status().map_err(|e| spawn_error(program, e))?;
        match status.code() {
            Some(0) => Ok(InvocationOutcome::External {
                program: program.to_string(),
            }),
            Some(EXIT_CORRECTNESS) => Err(HarnessError::Correctness {
                workload: inv.workload.to_string(),
                runtime: runtime.tag(),
                message: format!("driver exited with status {EXIT_CORRECTNESS}"),
            }),
            _ => Err(HarnessError::ToolchainFailed {
                program: program.to_string(),
                status,
            }),
        }
    }
}

fn read_asset(workload: &str, path: &Path) -> Result<String, HarnessError> {
    fs::read_to_string(path).map_err(|source| HarnessError::Staging {
        workload: workload.to_string(),
        path: path.to_path_buf(),
        source,
    })
}

fn spawn_error(program: &str, e: io::Error) -> HarnessError {
    if e.kind() == io::ErrorKind::NotFound {
        HarnessError::MissingToolchain {
            program: program.to_string(),
        }
    } else {
        HarnessError::Io(e)
    }
}
