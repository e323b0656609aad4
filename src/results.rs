//! Read-only access to the files of a finished job.
//!
//! A [`Results`] value points at a job directory and a job name. Files are
//! addressed by extension (`<dir>/<name>.<ext>`), and the main text output can
//! be searched line by line with [`Results::grep_output`] and
//! [`Results::grep_output_after`], mirroring `grep PATTERN` and
//! `grep -A N PATTERN`.

use crate::kf::KfError;
use crate::units::UnitsError;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error type for result extraction.
#[derive(Error, Debug)]
pub enum ResultsError {
    /// A required output file does not exist or cannot be read
    #[error("Failed to read {path}: {source}")]
    File {
        /// File location
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },
    /// A required quantity is absent from the output
    #[error("{0}")]
    Missing(String),
    /// A value was found but could not be interpreted
    #[error("Parse error: {0}")]
    Parse(String),
    /// KF store failure
    #[error(transparent)]
    Kf(#[from] KfError),
    /// Unit conversion failure
    #[error(transparent)]
    Units(#[from] UnitsError),
    /// Geometry file failure
    #[error(transparent)]
    Geometry(#[from] crate::io::IoError),
}

/// Type alias for result extraction
pub type Result<T> = std::result::Result<T, ResultsError>;

/// Files produced by a completed job.
#[derive(Debug, Clone)]
pub struct Results {
    dir: PathBuf,
    name: String,
    output_extension: String,
}

impl Results {
    /// Creates a results view for job `name` inside `dir`.
    ///
    /// `output_extension` names the main text output (e.g. `"out"`).
    pub fn new(dir: impl Into<PathBuf>, name: &str, output_extension: &str) -> Self {
        Self {
            dir: dir.into(),
            name: name.to_string(),
            output_extension: output_extension.to_string(),
        }
    }

    /// Job directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Job name, the stem of every file.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `<dir>/<name>.<extension>`
    pub fn path_for(&self, extension: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", self.name, extension))
    }

    /// Path of the main text output.
    pub fn output_path(&self) -> PathBuf {
        self.path_for(&self.output_extension)
    }

    /// Reads the whole main output.
    pub fn read_output(&self) -> Result<String> {
        let path = self.output_path();
        fs::read_to_string(&path).map_err(|source| ResultsError::File { path, source })
    }

    /// Returns every output line containing `pattern`.
    pub fn grep_output(&self, pattern: &str) -> Result<Vec<String>> {
        let content = self.read_output()?;
        Ok(content
            .lines()
            .filter(|line| line.contains(pattern))
            .map(str::to_string)
            .collect())
    }

    /// Returns one block per match: the matching line followed by up to
    /// `after` lines of trailing context.
    ///
    /// Blocks do not overlap; a match inside the context of an earlier match
    /// extends that block as `grep -A` does.
    pub fn grep_output_after(&self, pattern: &str, after: usize) -> Result<Vec<Vec<String>>> {
        let content = self.read_output()?;
        Ok(grep_blocks(&content, pattern, after))
    }
}

fn grep_blocks(content: &str, pattern: &str, after: usize) -> Vec<Vec<String>> {
    let mut blocks: Vec<Vec<String>> = Vec::new();
    let mut remaining = 0usize;
    for line in content.lines() {
        if line.contains(pattern) {
            if remaining == 0 {
                blocks.push(Vec::new());
            }
            remaining = after + 1;
        }
        if remaining > 0 {
            if let Some(block) = blocks.last_mut() {
                block.push(line.to_string());
            }
            remaining -= 1;
        }
    }
    blocks
}

/// Parses whitespace-separated field `index` of `line` as a float.
pub(crate) fn parse_field(line: &str, index: usize) -> Result<f64> {
    let field = line
        .split_whitespace()
        .nth(index)
        .ok_or_else(|| ResultsError::Parse(format!("no field {} in line '{}'", index, line)))?;
    field
        .parse()
        .map_err(|_| ResultsError::Parse(format!("'{}' is not a number in line '{}'", field, line)))
}

/// Parses field `offset` counted from the end of `line` (1 = last field).
pub(crate) fn parse_field_from_end(line: &str, offset: usize) -> Result<f64> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    let index = fields.len().checked_sub(offset).ok_or_else(|| {
        ResultsError::Parse(format!("line '{}' has fewer than {} fields", line, offset))
    })?;
    parse_field(line, index)
}
