use std::hint::black_box;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use rand_chacha::rand_core::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Timing parameters shared by every variant of one driver invocation.
#[derive(Clone, Debug)]
pub struct DriverConfig {
    pub warmup: Duration,
    /// Measurement window; also the budget the warmup phase must finish within.
    pub bench: Duration,
    pub seed: u64,
}

impl DriverConfig {
    pub fn rng(&self) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(self.seed)
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            warmup: Duration::from_secs(1),
            bench: Duration::from_secs(5),
            seed: 42,
        }
    }
}

/// Timer that trips once `budget` elapses unless disarmed first.
///
/// The timer runs on its own thread and only ever sets a flag; the guarded
/// loop polls [`OverrunGuard::tripped`] between calls.
pub struct OverrunGuard {
    fired: Arc<AtomicBool>,
    disarm: Sender<()>,
    timer: JoinHandle<()>,
}

impl OverrunGuard {
    pub fn arm(budget: Duration) -> Self {
        let fired = Arc::new(AtomicBool::new(false));
        let (disarm, armed) = mpsc::channel::<()>();

        let flag = Arc::clone(&fired);
        let timer = thread::spawn(move || {
            if let Err(RecvTimeoutError::Timeout) = armed.recv_timeout(budget) {
                flag.store(true, Ordering::Release);
            }
        });

        Self { fired, disarm, timer }
    }

    pub fn tripped(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }

    /// Stop the timer and report whether it fired.
    ///
    /// The timer thread is joined before returning, so the answer is final.
    pub fn disarm(self) -> bool {
        let _ = self.disarm.send(());
        let _ = self.timer.join();
        self.fired.load(Ordering::Acquire)
    }
}

#[derive(Clone, Debug)]
pub struct Warmup {
    pub calls: u64,
    pub elapsed: Duration,
    pub overrun: bool,
}

/// Call `f` repeatedly for `warmup`, abandoning the loop if the guard armed
/// with `budget` fires first.
///
/// Only a trip seen while the loop is still running counts as an overrun; the
/// guard firing after the warmup has finished does not.
pub fn warm_up<T>(warmup: Duration, budget: Duration, mut f: impl FnMut() -> T) -> Warmup {
    let start = Instant::now();
    let guard = OverrunGuard::arm(budget);
    let mut calls = 0;

    let overrun = loop {
        if guard.tripped() {
            break true;
        }
        if start.elapsed() >= warmup {
            break false;
        }
        black_box(f());
        calls += 1;
    };
    let elapsed = start.elapsed();
    guard.disarm();

    Warmup {
        calls,
        elapsed,
        overrun,
    }
}

#[derive(Clone, Debug)]
pub struct Measured {
    /// Per-call durations in nanoseconds, in call order.
    pub deltas_ns: Vec<u64>,
    pub mean_ns: f64,
    pub total_ns: u128,
}

impl Measured {
    pub fn calls(&self) -> usize {
        self.deltas_ns.len()
    }
}

/// Call `f` back to back until `window` has elapsed, stamping after each call.
///
/// The window is checked before each call, so at most one call runs past it,
/// and any non-zero window yields at least one sample.
pub fn measure_window<T>(window: Duration, mut f: impl FnMut() -> T) -> Measured {
    let start = Instant::now();
    let mut stamps = vec![start];

    while start.elapsed() < window {
        black_box(f());
        stamps.push(Instant::now());
    }

    let deltas_ns: Vec<u64> = stamps
        .windows(2)
        .map(|w| w[1].duration_since(w[0]).as_nanos() as u64)
        .collect();
    let total_ns = stamps[stamps.len() - 1].duration_since(start).as_nanos();
    let mean_ns = mean(&deltas_ns);

    Measured {
        deltas_ns,
        mean_ns,
        total_ns,
    }
}

pub fn mean(samples: &[u64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().map(|&s| s as f64).sum::<f64>() / samples.len() as f64
}
