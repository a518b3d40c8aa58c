//! The workload contract and the registry of in-process workloads.

use std::fmt::Debug;

use rand_chacha::ChaCha8Rng;
use thiserror::Error;

use crate::driver::{self, DriverReport, RunContext};
use crate::harness::DriverConfig;
use crate::HarnessError;

pub mod crc16;
pub mod matmul;
pub mod quicksort;
pub mod softmax;

/// A self-check that did not hold.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct CheckError(pub String);

/// Fail with a descriptive message unless `got == want`.
pub fn check_eq<T: PartialEq + Debug>(what: &str, got: T, want: T) -> Result<(), CheckError> {
    if got == want {
        Ok(())
    } else {
        Err(CheckError(format!("{what}: expected {want:?}, got {got:?}")))
    }
}

/// Fail unless every element of `got` is within `tol` of `want`.
pub fn check_close(what: &str, got: &[f64], want: &[f64], tol: f64) -> Result<(), CheckError> {
    if got.len() != want.len() {
        return Err(CheckError(format!(
            "{what}: expected {} values, got {}",
            want.len(),
            got.len()
        )));
    }
    for (i, (g, w)) in got.iter().zip(want).enumerate() {
        if (g - w).abs() > tol {
            return Err(CheckError(format!("{what}[{i}]: expected {w}, got {g}")));
        }
    }
    Ok(())
}

/// One timed entry point of a workload.
pub struct Variant<I, O> {
    pub name: &'static str,
    pub run: fn(&I) -> O,
}

/// A benchmarkable unit: deterministic input, self-test, timed variants.
pub trait Workload {
    type Input;
    type Output;

    fn name(&self) -> &'static str;

    /// Build the input fixture for `size`. Called once per driver invocation.
    fn initialize(&self, size: usize, rng: &mut ChaCha8Rng) -> Self::Input;

    /// Internal self-checks on small known inputs.
    fn test(&self) -> Result<(), CheckError>;

    fn variants(&self) -> Vec<Variant<Self::Input, Self::Output>>;
}

/// Type-erased handle the registry stores for each in-process workload.
pub trait NativeTarget: Sync {
    fn execute(&self, cfg: &DriverConfig, ctx: &RunContext<'_>)
        -> Result<DriverReport, HarnessError>;
}

impl<W: Workload + Sync> NativeTarget for W {
    fn execute(
        &self,
        cfg: &DriverConfig,
        ctx: &RunContext<'_>,
    ) -> Result<DriverReport, HarnessError> {
        driver::run_workload(self, cfg, ctx)
    }
}

pub struct WorkloadDef {
    pub name: &'static str,
    pub default_size: u64,
    pub sweep: &'static [u64],
    pub native: &'static dyn NativeTarget,
}

pub static REGISTRY: &[WorkloadDef] = &[
    WorkloadDef {
        name: "crc16",
        default_size: 100_000,
        sweep: &[1_000, 10_000, 100_000, 1_000_000],
        native: &crc16::Crc16,
    },
    WorkloadDef {
        name: "matmul",
        default_size: 256,
        sweep: &[16, 32, 64, 128, 256],
        native: &matmul::Matmul,
    },
    WorkloadDef {
        name: "quicksort",
        default_size: 10_000,
        sweep: &[1_000, 10_000, 100_000],
        native: &quicksort::Quicksort,
    },
    WorkloadDef {
        name: "softmax",
        default_size: 2048,
        sweep: &[256, 1024, 2048, 8192],
        native: &softmax::Softmax,
    },
];

pub fn lookup(name: &str) -> Option<&'static WorkloadDef> {
    REGISTRY.iter().find(|w| w.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_names_unique_and_sorted() {
        let names: Vec<&str> = REGISTRY.iter().map(|w| w.name).collect();
        let mut sorted = names.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(names, sorted);
    }

    #[test]
    fn test_default_size_is_part_of_sweep() {
        for w in REGISTRY {
            assert!(w.sweep.contains(&w.default_size), "{}", w.name);
        }
    }

    /// Each workload module opens with a one-line summary
    #[test]
    fn test_every_workload_module_has_a_header() {
        for source in [
            include_str!("crc16.rs"),
            include_str!("matmul.rs"),
            include_str!("quicksort.rs"),
            include_str!("softmax.rs"),
        ] {
            assert!(source.starts_with("//! "), "{}", source.lines().next().unwrap_or(""));
        }
    }

    #[test]
    fn test_lookup() {
        assert_eq!(lookup("matmul").map(|w| w.default_size), Some(256));
        assert!(lookup("fib").is_none());
    }

    #[test]
    fn test_check_helpers() {
        assert!(check_eq("x", 1, 1).is_ok());
        let err = check_eq("crc", 0x1234u16, 0x6e90).unwrap_err();
        assert!(err.to_string().contains("crc"));
        assert!(check_close("p", &[0.5, 0.25], &[0.5, 0.25 + 1e-12], 1e-9).is_ok());
        assert!(check_close("p", &[0.5], &[0.5, 0.5], 1e-9).is_err());
    }
}
