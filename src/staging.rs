//! Source parameterization and staging.
//!
//! A workload's corpus file declares its problem size as a top-level
//! `bench_size` constant. Staging reads the corpus file, rewrites that constant
//! to the requested size and hands back an in-memory copy; the corpus original
//! is never written to.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::corpus::Corpus;
use crate::HarnessError;

/// Name of the size constant every corpus source declares.
pub const SIZE_CONSTANT: &str = "bench_size";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Python,
    Mojo,
    Rust,
}

impl SourceFormat {
    pub const ALL: [SourceFormat; 3] = [SourceFormat::Python, SourceFormat::Mojo, SourceFormat::Rust];

    pub fn extension(&self) -> &'static str {
        match self {
            SourceFormat::Python => "py",
            SourceFormat::Mojo => "mojo",
            SourceFormat::Rust => "rs",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceFormat::Python => "python",
            SourceFormat::Mojo => "mojo",
            SourceFormat::Rust => "rust",
        }
    }

    /// Text a size declaration line must contain.
    pub fn declaration_marker(&self) -> &'static str {
        match self {
            SourceFormat::Python | SourceFormat::Mojo => "bench_size = ",
            SourceFormat::Rust => "bench_size: usize = ",
        }
    }

    /// Statement terminator re-appended after the rewritten literal.
    pub fn terminator(&self) -> &'static str {
        match self {
            SourceFormat::Python | SourceFormat::Mojo => "",
            SourceFormat::Rust => ";",
        }
    }
}

/// Result of rewriting the size constant in a source text.
#[derive(Clone, Debug)]
pub struct Parameterized {
    pub text: String,
    /// Number of declaration lines rewritten; zero means pass-through.
    pub rewritten: usize,
}

/// Rewrite every top-level size declaration in `source` to `size`.
///
/// Only unindented lines qualify, so a shadowing declaration inside a function
/// body is left alone. The last whitespace-delimited token of a matching line
/// is replaced; the line's tokens are re-joined with single spaces and its
/// original line ending is kept. A source with no declaration is returned
/// byte-for-byte unchanged.
pub fn parameterize(source: &str, size: u64, format: SourceFormat) -> Parameterized {
    let marker = format.declaration_marker();
    let mut text = String::with_capacity(source.len() + 8);
    let mut rewritten = 0;

    for line in source.split_inclusive('\n') {
        let body = line.trim_end_matches(['\n', '\r']);
        let ending = &line[body.len()..];

        let top_level = body.chars().next().is_some_and(|c| !c.is_whitespace());
        if !top_level || !body.contains(marker) {
            text.push_str(line);
            continue;
        }

        let literal = format!("{size}{}", format.terminator());
        let mut words: Vec<&str> = body.split_whitespace().collect();
        if let Some(last) = words.last_mut() {
            *last = &literal;
        }
        text.push_str(&words.join(" "));
        text.push_str(ending);
        rewritten += 1;
    }

    Parameterized { text, rewritten }
}

/// A parameterized, not yet written, copy of one corpus source.
#[derive(Clone, Debug)]
pub struct StagedSource {
    pub workload: String,
    pub format: SourceFormat,
    pub size: u64,
    /// Corpus file the copy was taken from.
    pub origin: PathBuf,
    pub text: String,
}

impl StagedSource {
    /// Read the corpus source for `workload` and rewrite its size constant.
    pub fn load(
        corpus: &Corpus,
        workload: &str,
        size: u64,
        format: SourceFormat,
    ) -> Result<Self, HarnessError> {
        let origin = corpus.source_path(workload, format);
        if !origin.is_file() {
            return Err(HarnessError::MissingSource {
                workload: workload.to_string(),
                format: format.as_str(),
                path: origin,
            });
        }

        let original = fs::read_to_string(&origin).map_err(|source| HarnessError::Staging {
            workload: workload.to_string(),
            path: origin.clone(),
            source,
        })?;

        let out = parameterize(&original, size, format);
        if out.rewritten == 0 {
            tracing::debug!(
                workload,
                format = format.as_str(),
                "no top-level {SIZE_CONSTANT} declaration; staging unchanged copy"
            );
        }

        Ok(Self {
            workload: workload.to_string(),
            format,
            size,
            origin,
            text: out.text,
        })
    }

    /// Staged file name inside the staging directory.
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.workload, self.format.extension())
    }

    /// Write the staged text to `<staging_dir>/<workload>.<ext>`, replacing any
    /// copy left by an earlier invocation.
    pub fn write_to(&self, staging_dir: &Path) -> Result<PathBuf, HarnessError> {
        let path = staging_dir.join(self.file_name());
        fs::create_dir_all(staging_dir)
            .and_then(|()| fs::write(&path, &self.text))
            .map_err(|source| HarnessError::Staging {
                workload: self.workload.clone(),
                path: path.clone(),
                source,
            })?;
        Ok(path)
    }

    pub fn sha256(&self) -> String {
        hex32(Sha256::digest(self.text.as_bytes()).into())
    }
}

fn hex32(d: [u8; 32]) -> String {
    let mut s = String::with_capacity(64);
    for b in d {
        s.push_str(&format!("{:02x}", b));
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const PY: &str = "import numpy as np\n\nbench_size = 100000\n\ndef initialize():\n    bench_size = 3\n    return bench_size\n";

    #[test]
    fn test_python_rewrite_top_level_only() {
        let out = parameterize(PY, 2048, SourceFormat::Python);
        assert_eq!(out.rewritten, 1);
        assert!(out.text.contains("\nbench_size = 2048\n"));
        assert!(out.text.contains("    bench_size = 3\n"));
    }

    #[test]
    fn test_rust_rewrite_keeps_terminator() {
        let src = "#[allow(non_upper_case_globals)]\nconst bench_size: usize = 1000000;\n\nfn main() {}\n";
        let out = parameterize(src, 64, SourceFormat::Rust);
        assert_eq!(out.rewritten, 1);
        assert_eq!(
            out.text,
            "#[allow(non_upper_case_globals)]\nconst bench_size: usize = 64;\n\nfn main() {}\n"
        );
    }

    #[test]
    fn test_idempotent_with_same_size() {
        let once = parameterize(PY, 77, SourceFormat::Python).text;
        let twice = parameterize(&once, 77, SourceFormat::Python).text;
        assert_eq!(once, twice);
    }

    #[test]
    fn test_no_declaration_is_byte_identical() {
        let src = "def bench_x(a):\n    return a\r\n\n  bench_size = 4\nno newline at end";
        let out = parameterize(src, 9, SourceFormat::Python);
        assert_eq!(out.rewritten, 0);
        assert_eq!(out.text, src);
    }

    #[test]
    fn test_crlf_and_missing_final_newline_preserved() {
        let out = parameterize("bench_size = 1\r\nx = 2\r\nbench_size = 5", 8, SourceFormat::Mojo);
        assert_eq!(out.text, "bench_size = 8\r\nx = 2\r\nbench_size = 8");
        assert_eq!(out.rewritten, 2);
    }

    #[test]
    fn test_stage_never_touches_corpus() {
        let dir = tempdir().unwrap();
        let corpus_dir = dir.path().join("benches");
        fs::create_dir_all(corpus_dir.join("crc16")).unwrap();
        let origin = corpus_dir.join("crc16").join("crc16.py");
        fs::write(&origin, PY).unwrap();

        let corpus = Corpus::new(&corpus_dir);
        let staged = StagedSource::load(&corpus, "crc16", 9, SourceFormat::Python).unwrap();
        let path = staged.write_to(&dir.path().join("tmp")).unwrap();

        assert_eq!(fs::read_to_string(&origin).unwrap(), PY);
        assert!(fs::read_to_string(path).unwrap().contains("bench_size = 9\n"));
        assert_eq!(staged.sha256().len(), 64);
    }

    #[test]
    fn test_missing_source_is_staging_error() {
        let dir = tempdir().unwrap();
        let corpus = Corpus::new(dir.path());
        let err = StagedSource::load(&corpus, "softmax", 1, SourceFormat::Mojo).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Staging);
    }
}
