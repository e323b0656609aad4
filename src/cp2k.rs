//! CP2K input writer and run script.
//!
//! The `input` branch of the job settings is written in CP2K's section
//! syntax. Keys are uppercased; nested trees become `&KEY ... &END` sections
//! indented by two spaces per level. Four keys are reserved:
//!
//! | Key | Value | Output |
//! |-----|-------|--------|
//! | `KIND` | tree of kind name → tree | one `&KIND  NAME ... &END` section per child |
//! | `AT_SET` | tree with one `var: value` entry | `@SET var value` |
//! | `AT_IF` | tree with one `predicate: tree` entry | `@IF predicate ... @ENDIF` |
//! | `AT_INCLUDE` | file name | `@include file` |
//!
//! Leaves print as `KEY  value`. A list repeats the keyword once per element,
//! and `true` or `""` print the bare keyword.
//!
//! ```
//! use qmadapt::cp2k::serialize;
//! use qmadapt::tree::Settings;
//!
//! let mut input = Settings::new();
//! input.set_path("global.run_type", "ENERGY");
//! input.set_path("global.print_level", "LOW");
//! assert_eq!(
//!     serialize(&input).unwrap(),
//!     "&GLOBAL\n  RUN_TYPE  ENERGY\n  PRINT_LEVEL  LOW\n&END\n\n"
//! );
//! ```

use crate::config::QMProgram;
use crate::qm_interface::{Job, QMError, QMInterface, Result};
use crate::tree::{Settings, Value};
use log::{debug, info};
use std::process::{Command, Stdio};

const INDENT: &str = "  ";

/// Keys with special meaning in CP2K input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reserved {
    Kind,
    AtSet,
    AtInclude,
    AtIf,
}

impl Reserved {
    fn classify(key: &str) -> Option<Self> {
        match key {
            "KIND" => Some(Reserved::Kind),
            "AT_SET" => Some(Reserved::AtSet),
            "AT_INCLUDE" => Some(Reserved::AtInclude),
            "AT_IF" => Some(Reserved::AtIf),
            _ => None,
        }
    }
}

/// Writes a settings tree as CP2K input.
///
/// Every top-level entry is followed by a blank line.
pub fn serialize(input: &Settings) -> Result<String> {
    let mut out = String::new();
    for (key, value) in input.iter() {
        write_entry(&mut out, key, value, "")?;
        out.push('\n');
    }
    Ok(out)
}

fn write_entry(out: &mut String, key: &str, value: &Value, indent: &str) -> Result<()> {
    let key = key.to_uppercase();
    match (value, Reserved::classify(&key)) {
        (Value::Tree(tree), None) => {
            out.push_str(&format!("{}&{}\n", indent, key));
            write_children(out, tree, indent)?;
            out.push_str(&format!("{}&END\n", indent));
        }
        (Value::Tree(kinds), Some(Reserved::Kind)) => {
            for (name, body) in kinds.iter() {
                let body = body.as_tree().ok_or_else(|| {
                    QMError::Input(format!("KIND '{}' must be a tree of keywords", name))
                })?;
                out.push_str(&format!("{}&{}  {}\n", indent, key, name.to_uppercase()));
                write_children(out, body, indent)?;
                out.push_str(&format!("{}&END\n", indent));
            }
        }
        (Value::Tree(tree), Some(Reserved::AtSet)) => {
            let (var, val) = single_entry(tree, &key)?;
            let val = val.as_scalar().ok_or_else(|| {
                QMError::Input(format!("AT_SET value of '{}' must be a scalar", var))
            })?;
            out.push_str(&format!("@SET {} {}\n", var, val));
        }
        (Value::Tree(tree), Some(Reserved::AtIf)) => {
            let (predicate, branch) = single_entry(tree, &key)?;
            let branch = branch.as_tree().ok_or_else(|| {
                QMError::Input(format!("AT_IF branch '{}' must be a tree", predicate))
            })?;
            out.push_str(&format!("{}@IF {}\n", indent, predicate));
            write_children(out, branch, indent)?;
            out.push_str(&format!("{}@ENDIF\n", indent));
        }
        (Value::Tree(_), Some(Reserved::AtInclude)) => {
            return Err(QMError::Input(
                "AT_INCLUDE expects a file name, not a tree".to_string(),
            ));
        }
        (Value::Scalar(file), Some(Reserved::AtInclude)) => {
            out.push_str(&format!("@include {}\n", file));
        }
        (Value::List(items), _) => {
            for item in items {
                write_entry(out, &key, item, indent)?;
            }
        }
        (Value::Scalar(s), _) if s.is_flag() => {
            out.push_str(&format!("{}{}\n", indent, key));
        }
        (Value::Scalar(s), _) => {
            out.push_str(&format!("{}{}  {}\n", indent, key, s));
        }
    }
    Ok(())
}

fn write_children(out: &mut String, tree: &Settings, indent: &str) -> Result<()> {
    let deeper = format!("{}{}", indent, INDENT);
    for (k, v) in tree.iter() {
        write_entry(out, k, v, &deeper)?;
    }
    Ok(())
}

fn single_entry<'a>(tree: &'a Settings, key: &str) -> Result<(&'a str, &'a Value)> {
    match (tree.len(), tree.first()) {
        (1, Some(entry)) => Ok(entry),
        (n, _) => Err(QMError::Input(format!(
            "{} expects exactly one entry, found {}",
            key, n
        ))),
    }
}

/// Returns `true` if `launcher` can be started.
///
/// The probe process is killed right away; only the ability to spawn it
/// matters.
fn launcher_available(launcher: &str) -> bool {
    if launcher.is_empty() {
        return false;
    }
    match Command::new(launcher)
        .arg("--help")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
    {
        Ok(mut child) => {
            let _ = child.kill();
            let _ = child.wait();
            true
        }
        Err(e) => {
            debug!("Launcher '{}' not available: {}", launcher, e);
            false
        }
    }
}

/// CP2K job adapter.
pub struct Cp2kJob {
    job: Job,
    /// CP2K executable (default: "cp2k.popt")
    pub command: String,
    /// Cluster launcher prefixed to the command when available; empty disables
    pub launcher: String,
    /// Extension of the file passed with `-o` (default: "out")
    pub output_extension: String,
}

impl Cp2kJob {
    /// Wraps `job` with the default executable, launcher and output extension.
    pub fn new(job: Job) -> Self {
        Self {
            job,
            command: QMProgram::Cp2k.default_command().to_string(),
            launcher: "srun".to_string(),
            output_extension: QMProgram::Cp2k.output_extension().to_string(),
        }
    }

    /// Sets the CP2K executable.
    pub fn with_command(mut self, command: &str) -> Self {
        self.command = command.to_string();
        self
    }

    /// Sets the cluster launcher; an empty string disables it.
    pub fn with_launcher(mut self, launcher: &str) -> Self {
        self.launcher = launcher.to_string();
        self
    }

    /// Sets the extension of the output file written by CP2K.
    pub fn with_output_extension(mut self, extension: &str) -> Self {
        self.output_extension = extension.to_string();
        self
    }
}

impl QMInterface for Cp2kJob {
    fn program(&self) -> QMProgram {
        QMProgram::Cp2k
    }

    fn job(&self) -> &Job {
        &self.job
    }

    fn get_input(&self) -> Result<String> {
        match self.job.input() {
            Some(input) => serialize(input),
            None => Ok(String::new()),
        }
    }

    fn get_runscript(&self) -> String {
        let mut script = String::new();
        if launcher_available(&self.launcher) {
            info!("Running CP2K through {}", self.launcher);
            script.push_str(&self.launcher);
            script.push(' ');
        }
        script.push_str(&format!(
            "{} -i {} -o {}",
            self.command,
            self.job.filename(QMProgram::Cp2k.input_extension()),
            self.job.filename(&self.output_extension)
        ));
        script
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(json: &str) -> Settings {
        Settings::from_json_str(json).unwrap()
    }

    #[test]
    fn test_nested_sections_and_indent() {
        let input = tree(r#"{"force_eval": {"method": "Quickstep", "dft": {"charge": 0}}}"#);
        assert_eq!(
            serialize(&input).unwrap(),
            "&FORCE_EVAL\n  METHOD  Quickstep\n  &DFT\n    CHARGE  0\n  &END\n&END\n\n"
        );
    }

    #[test]
    fn test_flags_print_bare_keyword() {
        let input = tree(r#"{"scf": {"added_mos": true, "smear": "", "ot": false}}"#);
        assert_eq!(
            serialize(&input).unwrap(),
            "&SCF\n  ADDED_MOS\n  SMEAR\n  OT  False\n&END\n\n"
        );
    }

    #[test]
    fn test_list_repeats_keyword() {
        let input = tree(r#"{"subsys": {"A": [1, 2]}}"#);
        assert_eq!(
            serialize(&input).unwrap(),
            "&SUBSYS\n  A  1\n  A  2\n&END\n\n"
        );
    }

    #[test]
    fn test_list_of_trees_repeats_section() {
        let input = tree(r#"{"motion": {"print": [{"x": 1}, {"x": 2}]}}"#);
        assert_eq!(
            serialize(&input).unwrap(),
            "&MOTION\n  &PRINT\n    X  1\n  &END\n  &PRINT\n    X  2\n  &END\n&END\n\n"
        );
    }

    #[test]
    fn test_kind_blocks() {
        let input = tree(
            r#"{"subsys": {"kind": {"h": {"basis_set": "DZVP"}, "o": {"basis_set": "TZVP", "potential": "GTH-PBE"}}}}"#,
        );
        assert_eq!(
            serialize(&input).unwrap(),
            "&SUBSYS\n\
             \x20\x20&KIND  H\n    BASIS_SET  DZVP\n  &END\n\
             \x20\x20&KIND  O\n    BASIS_SET  TZVP\n    POTENTIAL  GTH-PBE\n  &END\n\
             &END\n\n"
        );
    }

    #[test]
    fn test_at_set_at_include() {
        let input = tree(r#"{"at_set": {"BASIS": "DZVP"}, "at_include": "kinds.inc"}"#);
        assert_eq!(
            serialize(&input).unwrap(),
            "@SET BASIS DZVP\n\n@include kinds.inc\n\n"
        );
    }

    #[test]
    fn test_at_if_branch() {
        let input = tree(r#"{"dft": {"at_if": {"pred": {"X": 1}}}}"#);
        assert_eq!(
            serialize(&input).unwrap(),
            "&DFT\n  @IF pred\n    X  1\n  @ENDIF\n&END\n\n"
        );
    }

    #[test]
    fn test_malformed_reserved_blocks() {
        assert!(serialize(&tree(r#"{"at_set": {"a": 1, "b": 2}}"#)).is_err());
        assert!(serialize(&tree(r#"{"at_if": {"pred": 1}}"#)).is_err());
        assert!(serialize(&tree(r#"{"at_include": {"f": 1}}"#)).is_err());
        assert!(serialize(&tree(r#"{"kind": {"h": "DZVP"}}"#)).is_err());
    }

    #[test]
    fn test_serialization_is_deterministic() {
        let input = tree(r#"{"global": {"project": "w", "run_type": "MD"}, "at_set": {"a": 1}}"#);
        assert_eq!(serialize(&input).unwrap(), serialize(&input).unwrap());
    }

    #[test]
    fn test_runscript_without_launcher() {
        let job = Cp2kJob::new(Job::new("water", Settings::new(), None))
            .with_launcher("qmadapt-no-such-launcher");
        assert_eq!(job.get_runscript(), "cp2k.popt -i water.inp -o water.out");

        let job = Cp2kJob::new(Job::new("water", Settings::new(), None)).with_launcher("");
        assert_eq!(job.get_runscript(), "cp2k.popt -i water.inp -o water.out");
    }

    #[test]
    fn test_runscript_output_extension() {
        let job = Cp2kJob::new(Job::new("w", Settings::new(), None))
            .with_launcher("")
            .with_output_extension("log");
        assert_eq!(job.get_runscript(), "cp2k.popt -i w.inp -o w.log");
    }

    #[cfg(unix)]
    #[test]
    fn test_runscript_with_launcher() {
        let job = Cp2kJob::new(Job::new("water", Settings::new(), None))
            .with_command("cp2k.psmp")
            .with_launcher("sh");
        assert_eq!(job.get_runscript(), "sh cp2k.psmp -i water.inp -o water.out");
    }
}
