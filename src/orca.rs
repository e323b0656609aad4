//! ORCA input writer, run script and result reader.
//!
//! # Input Layout
//!
//! The `main` entry of the input tree becomes ORCA's simple input line
//! (`! ...`). Every other top-level key becomes a `%key ... end` block; for a
//! tree value each child is printed on its own line, aligned under the first
//! one:
//!
//! ```text
//! ! UKS B3LYP/G SV(P) SV/J TightSCF Direct Grid3 FinalGrid4
//!
//! %method SpecialGridAtoms 26
//!         SpecialGridIntAcc 7
//!         end
//!
//! %basis NewGTO 26 "CP(PPP)" end
//!        NewAuxGTO 26 "TZV/J" end
//!        end
//! ```
//!
//! Sub-keys that need their own `end` (like `NewGTO` above) are trees with a
//! terminator, written in JSON as `{"NewGTO": {"_end": "26 \"CP(PPP)\""}}`.
//! The geometry follows as a `* xyz charge multiplicity ... *` block.

use crate::config::QMProgram;
use crate::io;
use crate::molecule::Molecule;
use crate::qm_interface::{Job, QMInterface, Result};
use crate::results::{parse_field, Results, ResultsError};
use crate::tree::{Settings, Value};
use crate::units::Units;
use lazy_static::lazy_static;
use log::debug;
use nalgebra::DVector;
use regex::Regex;

/// Key of the simple input line.
pub const MAIN_KEY: &str = "main";

const ENERGY_MARKER: &str = "FINAL SINGLE POINT ENERGY";
const FREQUENCY_MARKER: &str = "VIBRATIONAL FREQUENCIES";
/// Lines after the frequency marker that may precede the first mode: the
/// dashed rule, the optional scaling factor note and blank lines.
const FREQUENCY_PREAMBLE_LINES: usize = 4;

lazy_static! {
    // `   6:      1635.43 cm**-1`
    static ref FREQUENCY_ROW_RE: Regex =
        Regex::new(r"^\s*\d+:\s+([-+]?\d+(?:\.\d*)?)\s+cm\*\*-1").unwrap();
}

/// Writes a settings tree as ORCA input (without geometry).
pub fn serialize(input: &Settings) -> String {
    let mut out = String::new();
    for (key, value) in input.iter() {
        if key == MAIN_KEY {
            out.push_str(&format!("! {}\n\n", line_value(value)));
            continue;
        }
        let indent = " ".repeat(key.len() + 2);
        match value {
            Value::Tree(block) => {
                out.push_str(&format!("%{}{}{}end\n\n", key, block_lines(block, &indent), indent));
            }
            other => {
                out.push_str(&format!("%{} {}\n{}end\n\n", key, plain(other), indent));
            }
        }
    }
    out
}

/// Block body: the first entry follows the block name on the same line,
/// the others are aligned under it.
fn block_lines(block: &Settings, indent: &str) -> String {
    let mut out = String::new();
    for (i, (key, value)) in block.iter().enumerate() {
        let lead = if i == 0 { " " } else { indent };
        out.push_str(&format!("{}{} {}\n", lead, key, line_value(value)));
    }
    out
}

/// Value of a line, with `end` appended for terminated trees.
fn line_value(value: &Value) -> String {
    match value {
        Value::Tree(t) => match t.terminator() {
            Some(end) => format!("{} end", end),
            None => plain(value),
        },
        _ => plain(value),
    }
}

/// Scalars print as-is, list elements are concatenated without separators.
fn plain(value: &Value) -> String {
    match value {
        Value::Scalar(s) => s.to_string(),
        Value::List(items) => items.iter().map(plain).collect(),
        Value::Tree(t) => {
            let mut parts: Vec<String> = t
                .iter()
                .map(|(k, v)| format!("{} {}", k, line_value(v)))
                .collect();
            if let Some(end) = t.terminator() {
                parts.push(format!("{} end", end));
            }
            parts.join(" ")
        }
    }
}

/// Writes the `* xyz` geometry block.
///
/// Charge and multiplicity come from the molecule's `charge` and
/// `multiplicity` properties and default to 0 and 1 when absent or not
/// integers. A missing or empty molecule yields an empty string.
pub fn print_molecule(mol: Option<&Molecule>) -> String {
    let Some(mol) = mol.filter(|m| !m.is_empty()) else {
        return String::new();
    };
    let charge = mol.int_property("charge").unwrap_or(0);
    let multiplicity = mol.int_property("multiplicity").unwrap_or(1);
    let xyz: Vec<String> = mol.atoms.iter().map(|a| a.format(11, 5)).collect();
    format!("* xyz {} {}\n{}\n*\n", charge, multiplicity, xyz.join("\n"))
}

/// ORCA job adapter.
pub struct OrcaJob {
    job: Job,
    /// ORCA executable (e.g., "orca", "/path/to/orca")
    pub command: String,
}

impl OrcaJob {
    /// Wraps `job` with the default executable.
    pub fn new(job: Job) -> Self {
        Self {
            job,
            command: QMProgram::Orca.default_command().to_string(),
        }
    }

    /// Sets the ORCA executable.
    pub fn with_command(mut self, command: &str) -> Self {
        self.command = command.to_string();
        self
    }
}

impl QMInterface for OrcaJob {
    fn program(&self) -> QMProgram {
        QMProgram::Orca
    }

    fn job(&self) -> &Job {
        &self.job
    }

    fn get_input(&self) -> Result<String> {
        let mut input = self.job.input().map(serialize).unwrap_or_default();
        input.push_str(&print_molecule(self.job.molecule.as_ref()));
        Ok(input)
    }

    /// ORCA must be started with its absolute path for parallel runs, so
    /// `command` should be configured accordingly.
    fn get_runscript(&self) -> String {
        format!(
            "{} {}",
            self.command,
            self.job.filename(QMProgram::Orca.input_extension())
        )
    }
}

/// Results of a finished ORCA job.
pub struct OrcaResults {
    results: Results,
    molecule: Option<Molecule>,
}

impl OrcaResults {
    /// `molecule` is the job's input molecule; it sizes the frequency table.
    pub fn new(results: Results, molecule: Option<Molecule>) -> Self {
        Self { results, molecule }
    }

    /// Underlying job directory view.
    pub fn results(&self) -> &Results {
        &self.results
    }

    /// Final geometry, read from `<jobname>.xyz`.
    pub fn get_main_molecule(&self) -> std::result::Result<Molecule, ResultsError> {
        Ok(io::read_xyz(&self.results.path_for("xyz"))?)
    }

    /// Final single point energy, expressed in `unit`.
    pub fn get_energy(&self, unit: &str) -> std::result::Result<f64, ResultsError> {
        let lines = self.results.grep_output(ENERGY_MARKER)?;
        let line = lines.last().ok_or_else(|| {
            ResultsError::Missing(format!(
                "'{}' not found in {}",
                ENERGY_MARKER,
                self.results.output_path().display()
            ))
        })?;
        let energy = parse_field(line, 4)?;
        Ok(Units::convert(energy, "au", unit)?)
    }

    /// Vibrational frequencies of the last frequency table, expressed in `unit`.
    pub fn get_frequencies(&self, unit: &str) -> std::result::Result<DVector<f64>, ResultsError> {
        let n_atoms = match &self.molecule {
            Some(mol) if !mol.is_empty() => mol.num_atoms(),
            _ => self.get_main_molecule()?.num_atoms(),
        };
        let n_modes = 3 * n_atoms;
        let after = FREQUENCY_PREAMBLE_LINES + n_modes;
        let blocks = self.results.grep_output_after(FREQUENCY_MARKER, after)?;
        let block = blocks.last().ok_or_else(|| {
            ResultsError::Missing(format!(
                "'{}' not found in {}",
                FREQUENCY_MARKER,
                self.results.output_path().display()
            ))
        })?;

        let ratio = Units::conversion_ratio("cm^-1", unit)?;
        let freqs: Vec<f64> = block
            .iter()
            .filter_map(|line| FREQUENCY_ROW_RE.captures(line))
            .filter_map(|caps| caps[1].parse::<f64>().ok())
            .take(n_modes)
            .map(|f| f * ratio)
            .collect();
        debug!("Parsed {} of {} frequencies", freqs.len(), n_modes);
        Ok(DVector::from_vec(freqs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::molecule::Atom;

    #[test]
    fn test_main_line() {
        let mut input = Settings::new();
        input.set(MAIN_KEY, "B3LYP SV(P)");
        assert_eq!(serialize(&input), "! B3LYP SV(P)\n\n");
    }

    #[test]
    fn test_main_list_concatenates() {
        let mut input = Settings::new();
        input.set(MAIN_KEY, vec!["B3LYP", " def2-SVP"]);
        assert_eq!(serialize(&input), "! B3LYP def2-SVP\n\n");
    }

    #[test]
    fn test_block_alignment() {
        let input = Settings::from_json_str(
            r#"{"method": {"SpecialGridAtoms": 26, "SpecialGridIntAcc": 7}}"#,
        )
        .unwrap();
        assert_eq!(
            serialize(&input),
            "%method SpecialGridAtoms 26\n        SpecialGridIntAcc 7\n        end\n\n"
        );
    }

    #[test]
    fn test_terminated_sub_keys() {
        let input = Settings::from_json_str(
            r#"{"basis": {"NewGTO": {"_end": "26 \"CP(PPP)\""}, "NewAuxGTO": {"_end": "26 \"TZV/J\""}}}"#,
        )
        .unwrap();
        assert_eq!(
            serialize(&input),
            "%basis NewGTO 26 \"CP(PPP)\" end\n       NewAuxGTO 26 \"TZV/J\" end\n       end\n\n"
        );
    }

    #[test]
    fn test_non_tree_block() {
        let mut input = Settings::new();
        input.set("pal", vec!["nprocs", " 4"]);
        assert_eq!(serialize(&input), "%pal nprocs 4\n     end\n\n");
    }

    #[test]
    fn test_molecule_defaults() {
        let mut mol = Molecule::new();
        mol.add_atom(Atom::new("H", [0.0, 0.0, 0.0]));
        mol.add_atom(Atom::new("H", [0.0, 0.0, 0.74]));
        let block = print_molecule(Some(&mol));
        assert!(block.starts_with("* xyz 0 1\n"));
        assert_eq!(
            block,
            "* xyz 0 1\n    H    0.00000    0.00000    0.00000\n    H    0.00000    0.00000    0.74000\n*\n"
        );
    }

    #[test]
    fn test_molecule_charge_and_multiplicity() {
        let mut mol = Molecule::new();
        mol.add_atom(Atom::new("O", [0.0, 0.0, 0.0]));
        mol.set_property("charge", -1);
        mol.set_property("multiplicity", 2);
        assert!(print_molecule(Some(&mol)).starts_with("* xyz -1 2\n"));

        mol.set_property("multiplicity", 2.0);
        assert!(print_molecule(Some(&mol)).starts_with("* xyz -1 1\n"));
    }

    #[test]
    fn test_no_molecule() {
        assert_eq!(print_molecule(None), "");
        assert_eq!(print_molecule(Some(&Molecule::new())), "");
    }

    #[test]
    fn test_energy_from_output() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("job.out"),
            "FINAL SINGLE POINT ENERGY   -40.123456\n",
        )
        .unwrap();
        let results = OrcaResults::new(Results::new(dir.path(), "job", "out"), None);
        assert_eq!(results.get_energy("au").unwrap(), -40.123456);
    }

    #[test]
    fn test_frequencies_after_scaling_note() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("h2.out"),
            "-----------------------\n\
             VIBRATIONAL FREQUENCIES\n\
             -----------------------\n\
             \n\
             Scaling factor for frequencies =  1.000000000  (already applied!)\n\
             \n\
             \x20\x20\x200:         0.00 cm**-1\n\
             \x20\x20\x201:         0.00 cm**-1\n\
             \x20\x20\x202:         0.00 cm**-1\n\
             \x20\x20\x203:         0.00 cm**-1\n\
             \x20\x20\x204:      -112.50 cm**-1\n\
             \x20\x20\x205:      4401.21 cm**-1\n\
             \n\
             ------------\n\
             NORMAL MODES\n",
        )
        .unwrap();
        let mut mol = Molecule::new();
        mol.add_atom(Atom::new("H", [0.0, 0.0, 0.0]));
        mol.add_atom(Atom::new("H", [0.0, 0.0, 0.74]));
        let results = OrcaResults::new(Results::new(dir.path(), "h2", "out"), Some(mol));

        let freqs = results.get_frequencies("cm^-1").unwrap();
        assert_eq!(freqs.len(), 6);
        assert_eq!(freqs[4], -112.5);
        assert_eq!(freqs[5], 4401.21);
    }

    #[test]
    fn test_serialization_is_idempotent() {
        let input = Settings::from_json_str(
            r#"{
                "main": "UKS B3LYP/G SV(P) SV/J TightSCF",
                "method": {"SpecialGridAtoms": 26, "SpecialGridIntAcc": 7},
                "basis": {"NewGTO": {"_end": "26 \"CP(PPP)\""}},
                "scf": {"maxiter": 200, "guess": "moread", "converged": true},
                "pal": ["nprocs", " 4"]
            }"#,
        )
        .unwrap();
        let first = serialize(&input);
        assert_eq!(serialize(&input), first);
        assert_eq!(serialize(&input.clone()), first);
        assert!(first.starts_with("! UKS B3LYP/G SV(P) SV/J TightSCF\n\n%method"));
    }

    #[test]
    fn test_get_input_concatenates_geometry() {
        let mut settings = Settings::new();
        settings.set_path("input.main", "HF STO-3G");
        let mut mol = Molecule::new();
        mol.add_atom(Atom::new("He", [0.0, 0.0, 0.0]));
        let job = OrcaJob::new(Job::new("he", settings, Some(mol)));
        assert_eq!(
            job.get_input().unwrap(),
            "! HF STO-3G\n\n* xyz 0 1\n   He    0.00000    0.00000    0.00000\n*\n"
        );
        assert_eq!(job.get_runscript(), "orca he.inp");
    }
}
