use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

/// Exit code an external driver uses to report a failed correctness check.
pub const EXIT_CORRECTNESS: i32 = 3;

/// Everything that can go wrong while staging, running or recording a
/// workload. [`HarnessError::kind`] maps each variant to the [`ErrorKind`]
/// reported for an isolated failure.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("no {format} source for `{workload}` at {}", .path.display())]
    MissingSource {
        workload: String,
        format: &'static str,
        path: PathBuf,
    },

    #[error("failed to stage `{workload}` into {}: {source}", .path.display())]
    Staging {
        workload: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("driver template: {0}")]
    Template(String),

    #[error("toolchain `{program}` is not installed or not on PATH")]
    MissingToolchain { program: String },

    #[error("`{program}` failed: {status}")]
    ToolchainFailed { program: String, status: ExitStatus },

    #[error("failed to load `{workload}` under {runtime}: {message}")]
    Load {
        workload: String,
        runtime: &'static str,
        message: String,
    },

    #[error("correctness check failed for `{workload}` under {runtime}: {message}")]
    Correctness {
        workload: String,
        runtime: &'static str,
        message: String,
    },

    #[error("failed to persist {}: {source}", .path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("run namespace {} already exists", .0.display())]
    RunExists(PathBuf),

    #[error("unknown workload `{0}`")]
    UnknownWorkload(String),

    #[error("workload `{0}` declares no sweep sizes")]
    UnknownSize(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Coarse classification used when reporting isolated failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Source missing, unreadable, or not splicable.
    Staging,
    /// Input construction failed.
    Load,
    /// Toolchain absent, or it (or the driver it runs) exited non-zero.
    Toolchain,
    /// The workload's self-check failed; it is wrong, not slow.
    Correctness,
    Persist,
    /// Plan, run id or configuration problems, and unclassified I/O.
    Orchestration,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Staging => "staging",
            ErrorKind::Load => "load",
            ErrorKind::Toolchain => "toolchain",
            ErrorKind::Correctness => "correctness",
            ErrorKind::Persist => "persist",
            ErrorKind::Orchestration => "orchestration",
        }
    }
}

impl HarnessError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            HarnessError::MissingSource { .. }
            | HarnessError::Staging { .. }
            | HarnessError::Template(_) => ErrorKind::Staging,
            HarnessError::MissingToolchain { .. } | HarnessError::ToolchainFailed { .. } => {
                ErrorKind::Toolchain
            }
            HarnessError::Load { .. } => ErrorKind::Load,
            HarnessError::Correctness { .. } => ErrorKind::Correctness,
            HarnessError::Persist { .. } => ErrorKind::Persist,
            HarnessError::RunExists(_)
            | HarnessError::UnknownWorkload(_)
            | HarnessError::UnknownSize(_)
            | HarnessError::Config(_)
            | HarnessError::ConfigParse(_)
            | HarnessError::Io(_) => ErrorKind::Orchestration,
        }
    }
}
