use clap::ValueEnum;
use serde::{Deserialize, Serialize};

pub mod config;
pub mod corpus;
pub mod driver;
pub mod error;
pub mod harness;
pub mod orchestrator;
pub mod runtime;
pub mod schema;
pub mod splice;
pub mod staging;
pub mod workloads;

pub use error::{ErrorKind, HarnessError};

use staging::SourceFormat;

/// Language/execution-engine target a workload is measured under.
#[derive(
    Clone, Copy, Debug, ValueEnum, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Runtime {
    /// In-process Rust driver over the built-in workload registry.
    Native,
    /// CPython, the interpreted reference.
    Python,
    /// PyPy, the alternate interpreter.
    Pypy,
    /// Mojo, JIT-compiled; entry point replaced by the shared driver body.
    Mojo,
    /// rustc, ahead-of-time compiled; workload spliced into the driver template.
    Rustc,
}

impl Runtime {
    pub const ALL: [Runtime; 5] = [
        Runtime::Native,
        Runtime::Python,
        Runtime::Pypy,
        Runtime::Mojo,
        Runtime::Rustc,
    ];

    /// Tag embedded in result record file names.
    pub fn tag(&self) -> &'static str {
        match self {
            Runtime::Native => "native",
            Runtime::Python => "py",
            Runtime::Pypy => "pypy",
            Runtime::Mojo => "mojo",
            Runtime::Rustc => "rs",
        }
    }

    /// Corpus source format, `None` for the in-process runtime.
    pub fn source_format(&self) -> Option<SourceFormat> {
        match self {
            Runtime::Native => None,
            Runtime::Python | Runtime::Pypy => Some(SourceFormat::Python),
            Runtime::Mojo => Some(SourceFormat::Mojo),
            Runtime::Rustc => Some(SourceFormat::Rust),
        }
    }
}

impl std::fmt::Display for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}
