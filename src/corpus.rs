//! Workload corpus layout: `<root>/<name>/<name>.<ext>`.

use std::io;
use std::path::{Path, PathBuf};

use crate::staging::SourceFormat;

#[derive(Clone, Debug)]
pub struct Corpus {
    root: PathBuf,
}

impl Corpus {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Canonical corpus file for a workload in the given format.
    pub fn source_path(&self, workload: &str, format: SourceFormat) -> PathBuf {
        self.root
            .join(workload)
            .join(format!("{workload}.{}", format.extension()))
    }

    /// Workload directories directly under the corpus root, sorted.
    ///
    /// Dot-directories are ignored; a missing root yields an empty list.
    pub fn discover(&self) -> io::Result<Vec<String>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in walkdir::WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(1)
            .follow_links(false)
        {
            let entry = entry?;
            if !entry.file_type().is_dir() {
                continue;
            }
            let Some(name) = entry.file_name().to_str() else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            names.push(name.to_string());
        }
        names.sort();
        Ok(names)
    }

    /// Formats for which the corpus carries a source of `workload`.
    pub fn formats_for(&self, workload: &str) -> Vec<SourceFormat> {
        SourceFormat::ALL
            .into_iter()
            .filter(|f| self.source_path(workload, *f).is_file())
            .collect()
    }
}
