use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::HarnessError;

pub const SCHEMA_VERSION: u32 = 1;

/// Manifest written once into every run namespace as `run.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMeta {
    pub schema_version: u32,
    pub bench_version: String,
    pub run_id: String,
    pub mode: String,
    pub timestamp_utc: String,
    pub git_sha: Option<String>,
    pub runtimes: Vec<String>,
    pub warmup_time: f64,
    pub bench_time: f64,
}

pub const MANIFEST_FILE: &str = "run.json";

impl RunMeta {
    pub fn write(&self, namespace: &Path) -> Result<PathBuf, HarnessError> {
        let path = namespace.join(MANIFEST_FILE);
        write_json_once(&path, self)?;
        Ok(path)
    }
}

/// One variant of one workload measured under one runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultRecord {
    pub run_id: String,
    pub workload: String,
    pub variant: String,
    pub runtime: String,
    pub size: u64,
    /// Mean inter-call duration in nanoseconds.
    pub mean: f64,
    /// Warmup duration in seconds.
    pub warmup_time: f64,
    /// Measurement window in seconds.
    pub bench_time: f64,
    /// Resolved workload source the numbers came from.
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_sha256: Option<String>,
    /// Per-call durations in nanoseconds, in call order.
    pub times: Vec<u64>,
}

/// Identity of a record file inside a run namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordKey {
    pub variant: String,
    /// Empty outside sweep runs, `_<size>` within them.
    pub suffix: String,
    pub runtime_tag: String,
}

impl RecordKey {
    pub fn file_name(&self) -> String {
        format!("{}{}_{}.json", self.variant, self.suffix, self.runtime_tag)
    }
}

impl ResultRecord {
    /// Write the record into `namespace` under `key`.
    ///
    /// The record becomes visible only once fully written, and an existing
    /// record with the same key is never replaced.
    pub fn persist(&self, namespace: &Path, key: &RecordKey) -> Result<PathBuf, HarnessError> {
        let path = namespace.join(key.file_name());
        write_json_once(&path, self)?;
        Ok(path)
    }

    pub fn load(path: &Path) -> io::Result<Self> {
        let bytes = fs::read(path)?;
        serde_json::from_slice(&bytes).map_err(io::Error::other)
    }
}

fn write_json_once<T: Serialize>(path: &Path, value: &T) -> Result<(), HarnessError> {
    let persist_err = |source: io::Error| HarnessError::Persist {
        path: path.to_path_buf(),
        source,
    };

    let dir = path
        .parent()
        .ok_or_else(|| persist_err(io::Error::other("record path has no parent")))?;
    let json = serde_json::to_string_pretty(value).map_err(|e| persist_err(io::Error::other(e)))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(persist_err)?;
    tmp.write_all(json.as_bytes()).map_err(persist_err)?;
    tmp.as_file().sync_all().map_err(persist_err)?;
    tmp.persist_noclobber(path)
        .map_err(|e| persist_err(e.error))?;
    Ok(())
}
