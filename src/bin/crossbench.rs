use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crossbench::config::{parse_duration, HarnessConfig};
use crossbench::orchestrator::{self, InvocationStatus, Orchestrator, RunRequest, Target};
use crossbench::runtime::Runner;
use crossbench::{HarnessError, Runtime};

#[derive(Subcommand, Debug)]
enum Command {
    /// Benchmark one workload, `all` workloads, or the `full` size sweep.
    Run {
        /// Workload name, `all`, or `full`.
        target: String,

        /// Run id; names the result namespace. Defaults to one derived from
        /// the target and the current time.
        run_id: Option<String>,

        /// Measurement window per variant (e.g. "5", "5s", "500ms").
        measurement: Option<String>,

        /// Restrict to these runtimes (repeatable). Defaults to the configured set.
        #[arg(long = "runtime", value_enum)]
        runtimes: Vec<Runtime>,

        /// Warmup duration per variant.
        #[arg(long)]
        warmup: Option<String>,
    },

    /// List known workloads, their sizes, and which corpus sources exist.
    List,

    /// Stage (and splice) a workload for a runtime without running it.
    Stage {
        workload: String,

        #[arg(value_enum)]
        runtime: Runtime,

        /// Size to inject; defaults to the workload's default size.
        #[arg(long)]
        size: Option<u64>,
    },

    /// Print a default crossbench.toml.
    Config,
}

#[derive(Parser, Debug)]
#[command(name = "crossbench")]
#[command(about = "Cross-language micro-benchmark harness (JSON results per run)")]
#[command(version)]
struct Args {
    /// Configuration file. Defaults to the nearest crossbench.toml, if any.
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Log level filter; RUST_LOG takes precedence.
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    cmd: Command,
}

fn setup_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<HarnessConfig> {
    if let Some(path) = path {
        return HarnessConfig::load(path)
            .with_context(|| format!("failed to load {}", path.display()));
    }
    match HarnessConfig::discover()? {
        Some((path, config)) => {
            tracing::debug!("using {}", path.display());
            Ok(config)
        }
        None => Ok(HarnessConfig::default()),
    }
}

fn main() -> Result<()> {
    let Args {
        config: config_path,
        log_level,
        cmd,
    } = Args::parse();
    setup_logging(&log_level);

    match cmd {
        Command::Run {
            target,
            run_id,
            measurement,
            runtimes,
            warmup,
        } => {
            let config = load_config(config_path.as_ref())?;
            let mut req = RunRequest::new(Target::parse(&target));
            req.run_id = run_id;
            req.runtimes = runtimes;
            req.bench = measurement
                .as_deref()
                .map(parse_duration)
                .transpose()?;
            req.warmup = warmup.as_deref().map(parse_duration).transpose()?;

            let summary = Orchestrator::new(&config).run(&req)?;
            for inv in &summary.invocations {
                let status = match &inv.status {
                    InvocationStatus::Completed { records } => format!("{} record(s)", records.len()),
                    InvocationStatus::Skipped => "skipped".to_string(),
                    InvocationStatus::Failed { kind, .. } => format!("failed ({})", kind.as_str()),
                };
                println!("{:<16} {:>9} {:<7} {status}", inv.workload, inv.size, inv.runtime.tag());
            }
            println!(
                "run {}: {} record(s), {} failure(s) in {}",
                summary.run_id,
                summary.records().count(),
                summary.failures().count(),
                summary.namespace.display()
            );
        }
        Command::List => {
            let config = load_config(config_path.as_ref())?;
            let catalog = orchestrator::catalog(&config)?;
            let driver = config.driver_config()?;
            let runner = Runner::new(&config, driver);
            let corpus = runner.corpus();

            for entry in &catalog {
                let formats: Vec<&str> = corpus
                    .formats_for(&entry.name)
                    .iter()
                    .map(|f| f.extension())
                    .collect();
                println!(
                    "{:<16} default={:<9} sweep={:?} native={} corpus=[{}]",
                    entry.name,
                    entry.default_size,
                    entry.sweep,
                    entry.native,
                    formats.join(",")
                );
            }

            let discovered = corpus
                .discover()
                .with_context(|| format!("failed to read {}", corpus.root().display()))?;
            for name in discovered {
                if !catalog.iter().any(|e| e.name == name) {
                    println!("{name:<16} (corpus only; add [workloads.{name}] to configure sizes)");
                }
            }
        }
        Command::Stage {
            workload,
            runtime,
            size,
        } => {
            let config = load_config(config_path.as_ref())?;
            let size = match size {
                Some(size) => size,
                None => orchestrator::catalog(&config)?
                    .into_iter()
                    .find(|e| e.name == workload)
                    .map(|e| e.default_size)
                    .ok_or_else(|| HarnessError::UnknownWorkload(workload.clone()))?,
            };
            let runner = Runner::new(&config, config.driver_config()?);
            let prepared = runner.stage(runtime, &workload, size)?;
            println!("{}", prepared.path.display());
            tracing::info!(sha256 = %prepared.sha256, "staged {workload} at size {size}");
        }
        Command::Config => print!("{}", HarnessConfig::default_toml()),
    }

    Ok(())
}
