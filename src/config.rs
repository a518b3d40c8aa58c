//! Configuration loading from `crossbench.toml`.
//!
//! The file is discovered by walking up from the current directory. Every
//! section is optional; missing keys fall back to the defaults below.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::harness::DriverConfig;
use crate::{HarnessError, Runtime};

pub const CONFIG_FILE: &str = "crossbench.toml";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HarnessConfig {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub runner: RunnerConfig,
    #[serde(default)]
    pub toolchains: ToolchainConfig,
    /// Per-workload size overrides, and sizes for corpus-only workloads.
    #[serde(default)]
    pub workloads: BTreeMap<String, WorkloadSizes>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Root of the workload corpus (`<corpus>/<name>/<name>.<ext>`).
    #[serde(default = "default_corpus_dir")]
    pub corpus_dir: PathBuf,
    /// Where staged, parameterized sources and build artifacts go.
    #[serde(default = "default_staging_dir")]
    pub staging_dir: PathBuf,
    /// Parent of all run namespaces.
    #[serde(default = "default_results_dir")]
    pub results_dir: PathBuf,
    /// Replacement for the built-in python/pypy driver script.
    #[serde(default)]
    pub python_driver: Option<PathBuf>,
    /// Replacement for the built-in mojo driver body.
    #[serde(default)]
    pub mojo_driver: Option<PathBuf>,
    /// Replacement for the built-in rust driver template.
    #[serde(default)]
    pub rust_template: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            corpus_dir: default_corpus_dir(),
            staging_dir: default_staging_dir(),
            results_dir: default_results_dir(),
            python_driver: None,
            mojo_driver: None,
            rust_template: None,
        }
    }
}

fn default_corpus_dir() -> PathBuf {
    PathBuf::from("benches")
}
fn default_staging_dir() -> PathBuf {
    PathBuf::from("tmp")
}
fn default_results_dir() -> PathBuf {
    PathBuf::from("bench_times")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Runtimes to invoke, in order.
    #[serde(default = "default_runtimes")]
    pub runtimes: Vec<Runtime>,
    /// Warmup duration before measurement (e.g., "1s")
    #[serde(default = "default_warmup")]
    pub warmup_time: String,
    /// Measurement window, also the warmup budget (e.g., "5s")
    #[serde(default = "default_bench")]
    pub bench_time: String,
    /// Seed for in-process input fixtures
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            runtimes: default_runtimes(),
            warmup_time: default_warmup(),
            bench_time: default_bench(),
            seed: default_seed(),
        }
    }
}

fn default_runtimes() -> Vec<Runtime> {
    Runtime::ALL.to_vec()
}
fn default_warmup() -> String {
    "1s".to_string()
}
fn default_bench() -> String {
    "5s".to_string()
}
fn default_seed() -> u64 {
    42
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolchainConfig {
    #[serde(default = "default_python")]
    pub python: String,
    #[serde(default = "default_pypy")]
    pub pypy: String,
    #[serde(default = "default_mojo")]
    pub mojo: String,
    #[serde(default = "default_rustc")]
    pub rustc: String,
    #[serde(default = "default_rustc_flags")]
    pub rustc_flags: Vec<String>,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            python: default_python(),
            pypy: default_pypy(),
            mojo: default_mojo(),
            rustc: default_rustc(),
            rustc_flags: default_rustc_flags(),
        }
    }
}

fn default_python() -> String {
    "python3".to_string()
}
fn default_pypy() -> String {
    "pypy3".to_string()
}
fn default_mojo() -> String {
    "mojo".to_string()
}
fn default_rustc() -> String {
    "rustc".to_string()
}
fn default_rustc_flags() -> Vec<String> {
    [
        "--edition",
        "2021",
        "-C",
        "opt-level=3",
        "-C",
        "target-cpu=native",
        "-C",
        "lto",
        "-C",
        "codegen-units=1",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct WorkloadSizes {
    #[serde(default)]
    pub default_size: Option<u64>,
    #[serde(default)]
    pub sweep: Option<Vec<u64>>,
}

impl HarnessConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, HarnessError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Find `crossbench.toml` in the current directory or any parent.
    pub fn discover() -> Result<Option<(PathBuf, Self)>, HarnessError> {
        let mut dir = std::env::current_dir()?;
        loop {
            let config_path = dir.join(CONFIG_FILE);
            if config_path.is_file() {
                let config = Self::load(&config_path)?;
                return Ok(Some((config_path, config)));
            }
            if !dir.pop() {
                return Ok(None);
            }
        }
    }

    fn validate(&self) -> Result<(), HarnessError> {
        self.driver_config()?;
        if self.runner.runtimes.is_empty() {
            return Err(HarnessError::Config("runner.runtimes is empty".to_string()));
        }
        Ok(())
    }

    pub fn driver_config(&self) -> Result<DriverConfig, HarnessError> {
        let warmup = parse_duration(&self.runner.warmup_time)?;
        let bench = parse_duration(&self.runner.bench_time)?;
        if bench.is_zero() {
            return Err(HarnessError::Config("runner.bench_time must be > 0".to_string()));
        }
        Ok(DriverConfig {
            warmup,
            bench,
            seed: self.runner.seed,
        })
    }

    /// Generate a default configuration as TOML string
    pub fn default_toml() -> String {
        r#"# crossbench configuration

[paths]
# Workload corpus: <corpus_dir>/<name>/<name>.{py,mojo,rs}
corpus_dir = "benches"
# Staged (parameterized, spliced) sources and build artifacts
staging_dir = "tmp"
# One sub-directory per run id
results_dir = "bench_times"
# Built-in drivers are used unless overridden (uncomment to enable)
# python_driver = "templates/bench_suite.py"
# mojo_driver = "templates/bench_suite.mojo"
# rust_template = "templates/rust_driver.rs.in"

[runner]
runtimes = ["native", "python", "pypy", "mojo", "rustc"]
# Warmup duration before measurement
warmup_time = "1s"
# Measurement window; warmup must also finish within it
bench_time = "5s"
# Seed for in-process input fixtures
seed = 42

[toolchains]
python = "python3"
pypy = "pypy3"
mojo = "mojo"
rustc = "rustc"
rustc_flags = ["--edition", "2021", "-C", "opt-level=3", "-C", "target-cpu=native", "-C", "lto", "-C", "codegen-units=1"]

# Size overrides, or sizes for workloads that only exist in the corpus
# [workloads.crc16]
# default_size = 100000
# sweep = [1000, 10000, 100000, 1000000]
"#
        .to_string()
    }
}

/// Parse duration string (e.g., "3s", "500ms", "2m").
pub fn parse_duration(s: &str) -> Result<Duration, HarnessError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(HarnessError::Config("empty duration string".to_string()));
    }

    // Find where the number ends and unit begins
    let (num_part, unit_part) = s
        .char_indices()
        .find(|(_, c)| c.is_alphabetic())
        .map(|(i, _)| s.split_at(i))
        .unwrap_or((s, "s"));

    let value: f64 = num_part
        .trim()
        .parse()
        .map_err(|_| HarnessError::Config(format!("invalid duration number: {num_part}")))?;
    if !value.is_finite() || value < 0.0 {
        return Err(HarnessError::Config(format!("invalid duration: {s}")));
    }

    let multiplier: u64 = match unit_part.to_lowercase().as_str() {
        "ns" => 1,
        "us" | "µs" => 1_000,
        "ms" => 1_000_000,
        "s" | "" => 1_000_000_000,
        "m" | "min" => 60_000_000_000,
        _ => {
            return Err(HarnessError::Config(format!(
                "unknown duration unit: {unit_part}"
            )))
        }
    };

    Ok(Duration::from_nanos((value * multiplier as f64) as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HarnessConfig::default();
        assert_eq!(config.runner.warmup_time, "1s");
        assert_eq!(config.runner.bench_time, "5s");
        assert_eq!(config.runner.runtimes, Runtime::ALL.to_vec());
        assert_eq!(config.paths.results_dir, PathBuf::from("bench_times"));
        assert!(config.paths.python_driver.is_none());
        assert!(config.paths.mojo_driver.is_none());
        assert!(config.workloads.is_empty());
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("3s").unwrap(), Duration::from_secs(3));
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("100us").unwrap(), Duration::from_micros(100));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("1.5s").unwrap(), Duration::from_millis(1500));
        assert_eq!(parse_duration("7").unwrap(), Duration::from_secs(7));
        assert!(parse_duration("").is_err());
        assert!(parse_duration("5 fortnights").is_err());
        assert!(parse_duration("-1s").is_err());
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = r#"
            [runner]
            runtimes = ["native", "rustc"]
            bench_time = "2s"

            [workloads.fib]
            default_size = 30
            sweep = [20, 25, 30]
        "#;

        let config: HarnessConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.runner.runtimes, vec![Runtime::Native, Runtime::Rustc]);
        assert_eq!(config.runner.bench_time, "2s");
        // Defaults should still apply
        assert_eq!(config.runner.warmup_time, "1s");
        assert_eq!(config.toolchains.pypy, "pypy3");
        assert_eq!(config.workloads["fib"].sweep, Some(vec![20, 25, 30]));

        let driver = config.driver_config().unwrap();
        assert_eq!(driver.bench, Duration::from_secs(2));
    }

    #[test]
    fn test_default_toml_parses() {
        let config: HarnessConfig = toml::from_str(&HarnessConfig::default_toml()).unwrap();
        assert_eq!(config.runner.bench_time, "5s");
        assert_eq!(config.toolchains.rustc_flags, default_rustc_flags());
        config.validate().unwrap();
        assert!(config.paths.python_driver.is_none());
    }

    #[test]
    fn test_zero_bench_time_rejected() {
        let mut config = HarnessConfig::default();
        config.runner.bench_time = "0s".to_string();
        assert!(config.driver_config().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "[runner]\nruntimes = []\n").unwrap();
        let err = HarnessConfig::load(&path).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Orchestration);
    }
}
