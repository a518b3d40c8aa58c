//! In-process measurement driver.
//!
//! Per workload: `LOAD → CORRECTNESS_CHECK`, then per variant
//! `WARMUP → MEASURE → PERSIST`. A failure in the first two phases aborts the
//! whole workload for this runtime; later failures only cost the variant.

use std::any::Any;
use std::fmt;
use std::hint::black_box;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use crate::harness::{self, DriverConfig};
use crate::schema::{RecordKey, ResultRecord};
use crate::workloads::Workload;
use crate::{HarnessError, Runtime};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Load,
    CorrectnessCheck,
    Warmup,
    Measure,
    Persist,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Load => "load",
            Phase::CorrectnessCheck => "correctness-check",
            Phase::Warmup => "warmup",
            Phase::Measure => "measure",
            Phase::Persist => "persist",
            Phase::Done => "done",
        })
    }
}

/// What is being benchmarked and where its records go.
#[derive(Clone, Debug)]
pub struct RunContext<'a> {
    pub run_id: &'a str,
    /// Run namespace directory records are written into.
    pub namespace: &'a Path,
    pub size: u64,
    /// Appended to the variant name in record file names.
    pub key_suffix: &'a str,
    pub runtime: Runtime,
    pub source_ref: &'a str,
}

#[derive(Clone, Debug)]
pub enum VariantOutcome {
    Recorded {
        path: PathBuf,
        calls: usize,
        mean_ns: f64,
    },
    /// Warmup did not finish within the measurement budget.
    SkippedOverrun { warmup_calls: u64 },
    /// The variant panicked during warmup or measurement.
    Failed { phase: Phase, message: String },
}

#[derive(Clone, Debug)]
pub struct DriverReport {
    pub workload: String,
    pub variants: Vec<(String, VariantOutcome)>,
}

impl DriverReport {
    pub fn recorded(&self) -> impl Iterator<Item = &PathBuf> {
        self.variants.iter().filter_map(|(_, o)| match o {
            VariantOutcome::Recorded { path, .. } => Some(path),
            _ => None,
        })
    }
}

pub fn run_workload<W: Workload + ?Sized>(
    workload: &W,
    cfg: &DriverConfig,
    ctx: &RunContext<'_>,
) -> Result<DriverReport, HarnessError> {
    let name = workload.name();
    let span = tracing::info_span!("driver", workload = name, runtime = %ctx.runtime, size = ctx.size);
    let _enter = span.enter();

    tracing::debug!(phase = %Phase::Load, "entering phase");
    let mut rng = cfg.rng();
    let input = panic::catch_unwind(AssertUnwindSafe(|| {
        workload.initialize(ctx.size as usize, &mut rng)
    }))
    .map_err(|payload| HarnessError::Load {
        workload: name.to_string(),
        runtime: ctx.runtime.tag(),
        message: panic_message(payload),
    })?;

    tracing::debug!(phase = %Phase::CorrectnessCheck, "entering phase");
    let checked = panic::catch_unwind(AssertUnwindSafe(|| workload.test()))
        .unwrap_or_else(|payload| Err(crate::workloads::CheckError(panic_message(payload))));
    if let Err(e) = checked {
        return Err(HarnessError::Correctness {
            workload: name.to_string(),
            runtime: ctx.runtime.tag(),
            message: e.to_string(),
        });
    }

    let mut report = DriverReport {
        workload: name.to_string(),
        variants: Vec::new(),
    };

    for variant in workload.variants() {
        let run = variant.run;
        let outcome = run_variant(name, variant.name, cfg, ctx, || run(black_box(&input)))?;
        report.variants.push((variant.name.to_string(), outcome));
    }

    tracing::debug!(phase = %Phase::Done, variants = report.variants.len(), "entering phase");
    Ok(report)
}

fn run_variant<T>(
    workload: &str,
    variant: &str,
    cfg: &DriverConfig,
    ctx: &RunContext<'_>,
    mut call: impl FnMut() -> T,
) -> Result<VariantOutcome, HarnessError> {
    tracing::debug!(variant, phase = %Phase::Warmup, "entering phase");
    let warm = match panic::catch_unwind(AssertUnwindSafe(|| {
        harness::warm_up(cfg.warmup, cfg.bench, &mut call)
    })) {
        Ok(w) => w,
        Err(payload) => return Ok(failed(variant, Phase::Warmup, payload)),
    };
    if warm.overrun {
        tracing::warn!(
            variant,
            warmup_calls = warm.calls,
            "warmup exceeded budget, skipping this variant"
        );
        return Ok(VariantOutcome::SkippedOverrun {
            warmup_calls: warm.calls,
        });
    }

    tracing::debug!(variant, phase = %Phase::Measure, "entering phase");
    let measured = match panic::catch_unwind(AssertUnwindSafe(|| {
        harness::measure_window(cfg.bench, &mut call)
    })) {
        Ok(m) => m,
        Err(payload) => return Ok(failed(variant, Phase::Measure, payload)),
    };

    let record = ResultRecord {
        run_id: ctx.run_id.to_string(),
        workload: workload.to_string(),
        variant: variant.to_string(),
        runtime: ctx.runtime.tag().to_string(),
        size: ctx.size,
        mean: measured.mean_ns,
        warmup_time: cfg.warmup.as_secs_f64(),
        bench_time: cfg.bench.as_secs_f64(),
        file: ctx.source_ref.to_string(),
        source_sha256: None,
        times: measured.deltas_ns,
    };
    let key = RecordKey {
        variant: variant.to_string(),
        suffix: ctx.key_suffix.to_string(),
        runtime_tag: ctx.runtime.tag().to_string(),
    };
    tracing::debug!(variant, phase = %Phase::Persist, "entering phase");
    let path = record.persist(ctx.namespace, &key)?;

    tracing::info!(
        variant,
        calls = record.times.len(),
        mean_ms = record.mean / 1e6,
        "saved {}",
        path.display()
    );

    Ok(VariantOutcome::Recorded {
        path,
        calls: record.times.len(),
        mean_ns: record.mean,
    })
}

fn failed(variant: &str, phase: Phase, payload: Box<dyn Any + Send>) -> VariantOutcome {
    let message = panic_message(payload);
    tracing::error!(variant, %phase, "variant panicked: {message}");
    VariantOutcome::Failed { phase, message }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}
