//! Common interface of the program adapters.
//!
//! A job engine drives every program through the same three calls:
//!
//! - [`QMInterface::get_input`]: text of the input file
//! - [`QMInterface::get_runscript`]: shell command running the program
//! - [`QMInterface::check`]: whether a finished run terminated normally
//!
//! The job data itself (name, settings tree, molecule) lives in [`Job`] and
//! is shared by all adapters. Scheduling, file staging and process management
//! are left to the caller.
//!
//! # Usage Pattern
//!
//! ```
//! use qmadapt::config::QMProgram;
//! use qmadapt::qm_interface::{interface_for, Job};
//! use qmadapt::settings::Config;
//! use qmadapt::tree::Settings;
//!
//! let mut settings = Settings::new();
//! settings.set_path("input.main", "B3LYP def2-SVP");
//! let job = Job::new("water", settings, None);
//!
//! let orca = interface_for(QMProgram::Orca, job, &Config::default());
//! assert!(orca.get_input().unwrap().starts_with("! B3LYP def2-SVP"));
//! assert_eq!(orca.get_runscript(), "orca water.inp");
//! ```

use crate::adf::AdfJob;
use crate::config::QMProgram;
use crate::cp2k::Cp2kJob;
use crate::molecule::Molecule;
use crate::orca::OrcaJob;
use crate::results::Results;
use crate::settings::Config;
use crate::tree::{Settings, Value};
use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error type for input generation.
#[derive(Error, Debug)]
pub enum QMError {
    /// File system error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// The settings tree cannot be expressed in the program's input format
    #[error("Invalid input settings: {0}")]
    Input(String),
}

/// Type alias for input generation results
pub type Result<T> = std::result::Result<T, QMError>;

/// Name of the settings branch holding program input.
pub const INPUT_BRANCH: &str = "input";

/// A single calculation: a name, a settings tree and an optional molecule.
///
/// The program input is read from the `input` branch of `settings`.
#[derive(Debug, Clone, Default)]
pub struct Job {
    /// Job name, used as the base name of all job files
    pub name: String,
    /// Full settings tree
    pub settings: Settings,
    /// Molecule to compute
    pub molecule: Option<Molecule>,
}

impl Job {
    /// Creates a job named `name`.
    pub fn new(name: &str, settings: Settings, molecule: Option<Molecule>) -> Self {
        Self {
            name: name.to_string(),
            settings,
            molecule,
        }
    }

    /// The `input` branch, or `None` if it is missing or not a tree.
    pub fn input(&self) -> Option<&Settings> {
        match self.settings.get(INPUT_BRANCH) {
            Some(Value::Tree(t)) => Some(t),
            Some(_) => {
                warn!("settings.{} of job '{}' is not a tree", INPUT_BRANCH, self.name);
                None
            }
            None => None,
        }
    }

    /// `<name>.<extension>`
    pub fn filename(&self, extension: &str) -> String {
        format!("{}.{}", self.name, extension)
    }
}

/// Trait implemented by each program adapter.
pub trait QMInterface {
    /// Program this adapter drives.
    fn program(&self) -> QMProgram;

    /// The wrapped job.
    fn job(&self) -> &Job;

    /// Builds the text of the input file.
    fn get_input(&self) -> Result<String>;

    /// Builds the shell command that runs the program on the input file.
    fn get_runscript(&self) -> String;

    /// Returns `true` if the output of a finished run contains the program's
    /// normal-termination marker. A missing output file counts as failure.
    fn check(&self, results: &Results) -> bool {
        let marker = self.program().termination_marker();
        match results.grep_output(marker) {
            Ok(lines) => !lines.is_empty(),
            Err(e) => {
                warn!("Cannot check job '{}': {}", self.job().name, e);
                false
            }
        }
    }

    /// Writes the input file into `dir` and returns its path.
    fn write_input(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(self.job().filename(self.program().input_extension()));
        fs::write(&path, self.get_input()?)?;
        debug!("Wrote {} input to {}", self.program(), path.display());
        Ok(path)
    }
}

/// Returns the adapter for `program`, configured from `config`.
pub fn interface_for(program: QMProgram, job: Job, config: &Config) -> Box<dyn QMInterface> {
    let programs = &config.programs;
    let command = programs.command(program).to_string();
    match program {
        QMProgram::Adf => Box::new(
            AdfJob::new(job)
                .with_command(&command)
                .with_nprocs(config.general.nprocs),
        ),
        QMProgram::Cp2k => Box::new(
            Cp2kJob::new(job)
                .with_command(&command)
                .with_launcher(&programs.launcher)
                .with_output_extension(&config.extensions.cp2k),
        ),
        QMProgram::Orca => Box::new(OrcaJob::new(job).with_command(&command)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn job_with_input() -> Job {
        let mut settings = Settings::new();
        settings.set_path("input.global.run_type", "ENERGY");
        Job::new("test", settings, None)
    }

    #[test]
    fn test_job_input_branch() {
        let job = job_with_input();
        assert!(job.input().unwrap().contains_key("global"));
        assert_eq!(job.filename("inp"), "test.inp");

        let mut settings = Settings::new();
        settings.set("input", "not a tree");
        assert!(Job::new("x", settings, None).input().is_none());
    }

    #[test]
    fn test_write_input_uses_program_extension() {
        let dir = TempDir::new().unwrap();
        let cp2k = interface_for(QMProgram::Cp2k, job_with_input(), &Config::default());
        let path = cp2k.write_input(dir.path()).unwrap();
        assert_eq!(path, dir.path().join("test.inp"));
        let written = fs::read_to_string(path).unwrap();
        assert!(written.contains("RUN_TYPE  ENERGY"));
    }

    #[test]
    fn test_check_marker_per_program() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("test.out"), "...\n ORCA TERMINATED NORMALLY\n").unwrap();
        let results = Results::new(dir.path(), "test", "out");
        let config = Config::default();

        let orca = interface_for(QMProgram::Orca, job_with_input(), &config);
        assert!(orca.check(&results));
        let adf = interface_for(QMProgram::Adf, job_with_input(), &config);
        assert!(!adf.check(&results));
    }

    #[test]
    fn test_check_without_output_is_false() {
        let dir = TempDir::new().unwrap();
        let results = Results::new(dir.path(), "absent", "out");
        let orca = interface_for(QMProgram::Orca, job_with_input(), &Config::default());
        assert!(!orca.check(&results));
    }
}
