use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::Result;

/// Append-only log of processed done-keys, one per line.
///
/// `load` is called once per pipeline invocation; `append` writes straight
/// to the file without touching any previously loaded set. Within a run,
/// duplicate suppression therefore relies on processing order, not on
/// re-reading the log.
#[derive(Debug, Clone)]
pub struct DoneLog {
    path: PathBuf,
}

impl DoneLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read all recorded keys into a membership set. A missing file is an
    /// empty log, not an error.
    pub fn load(&self) -> Result<HashSet<String>> {
        if !self.path.exists() {
            return Ok(HashSet::new());
        }
        let content = fs::read_to_string(&self.path)?;
        Ok(content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect())
    }

    /// Record one key as processed.
    pub fn append(&self, key: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{key}")?;
        Ok(())
    }
}
