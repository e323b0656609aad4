//! ADF job adapter and result reader.
//!
//! # Input
//!
//! The `input` branch of the job settings is written in ADF's block format
//! (`Key value`, `Key ... End`). The molecule is written as the `Atoms`
//! block; per-atom `adf.fragment` and `adf.block` properties add `f=` and
//! `b=` suffixes.
//!
//! # Results
//!
//! [`AdfResults`] reads numeric results from the main KF file (`TAPE21`,
//! staged as `<jobname>.t21`) through the [`KfStore`] interface and timings
//! from the text output. Arrays stored in the `History` section use ADF's
//! internal atom order; [`AdfResults::to_input_order`] maps them back to the
//! order the atoms were given in. All other sections used here are already in
//! input order.

use crate::adf_input;
use crate::config::QMProgram;
use crate::kf::{KfFile, KfStore, KfValue};
use crate::molecule::Molecule;
use crate::periodic_table::{atomic_number_to_symbol, symbol_to_atomic_number};
use crate::qm_interface::{Job, QMInterface, Result, INPUT_BRANCH};
use crate::results::{parse_field_from_end, Results, ResultsError};
use crate::tree::{Scalar, Settings, Value};
use crate::units::Units;
use log::{debug, warn};
use nalgebra::DMatrix;
use std::collections::BTreeMap;

/// Extension of the main KF file.
pub const KF_EXTENSION: &str = "t21";
/// Extension of a JSON dump of the main KF file, read by [`AdfResults::load`].
pub const KF_DUMP_EXTENSION: &str = "t21.json";

/// Record width of the fixed-width `General%Input` variable.
const INPUT_RECORD_WIDTH: usize = 160;
const TIMINGS_MARKER: &str = " Total Used : ";

/// Writes a settings tree in ADF block format.
///
/// Top-level entries are separated by blank lines. `false` values are
/// omitted; `true` and `""` print the bare key.
pub fn serialize(input: &Settings) -> String {
    let mut out = String::new();
    for (key, value) in input.iter() {
        let before = out.len();
        write_entry(&mut out, key, value, 0);
        if out.len() > before {
            out.push('\n');
        }
    }
    out
}

fn write_entry(out: &mut String, key: &str, value: &Value, depth: usize) {
    let indent = "  ".repeat(depth);
    match value {
        Value::Tree(tree) => {
            out.push_str(&indent);
            out.push_str(key);
            if let Some(header) = tree.header() {
                out.push_str(&format!(" {}", header));
            }
            out.push('\n');
            for (k, v) in tree.iter() {
                write_entry(out, k, v, depth + 1);
            }
            out.push_str(&format!("{}End\n", indent));
        }
        Value::List(items) => {
            for item in items {
                write_entry(out, key, item, depth);
            }
        }
        Value::Scalar(s) if s.is_flag() => {
            out.push_str(&format!("{}{}\n", indent, key));
        }
        Value::Scalar(Scalar::Bool(false)) => {}
        Value::Scalar(s) => {
            out.push_str(&format!("{}{} {}\n", indent, key, s));
        }
    }
}

/// Writes the `Atoms` block for `mol`.
pub fn serialize_molecule(mol: &Molecule) -> String {
    let mut out = String::from("Atoms\n");
    for (i, atom) in mol.atoms.iter().enumerate() {
        out.push_str(&format!("{:>5}{}", i + 1, atom.format(14, 6)));
        for (tag, property) in [("f", "fragment"), ("b", "block")] {
            if let Some(value) = atom.group_property("adf", property) {
                let text = value
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| value.to_string());
                out.push_str(&format!(" {}={}", tag, text));
            }
        }
        out.push('\n');
    }
    out.push_str("End\n");
    out
}

/// ADF job adapter.
pub struct AdfJob {
    job: Job,
    /// ADF executable (default: "adf")
    pub command: String,
    /// Process count passed with `-n`; `None` lets ADF decide
    pub nprocs: Option<u32>,
}

impl AdfJob {
    /// Wraps `job` with the default executable and no process count.
    pub fn new(job: Job) -> Self {
        Self {
            job,
            command: QMProgram::Adf.default_command().to_string(),
            nprocs: None,
        }
    }

    /// Sets the ADF executable.
    pub fn with_command(mut self, command: &str) -> Self {
        self.command = command.to_string();
        self
    }

    /// Sets the process count; 0 clears it.
    pub fn with_nprocs(mut self, nprocs: u32) -> Self {
        self.nprocs = (nprocs > 0).then_some(nprocs);
        self
    }
}

impl QMInterface for AdfJob {
    fn program(&self) -> QMProgram {
        QMProgram::Adf
    }

    fn job(&self) -> &Job {
        &self.job
    }

    /// The molecule replaces any `atoms` entry of the input settings.
    fn get_input(&self) -> Result<String> {
        let mut out = String::new();
        let molecule = self.job.molecule.as_ref().filter(|m| !m.is_empty());
        if let Some(mol) = molecule {
            out.push_str(&serialize_molecule(mol));
            out.push('\n');
        }
        if let Some(input) = self.job.input() {
            let mut input = input.clone();
            if molecule.is_some() {
                if let Some(key) = input.find_case("atoms").map(str::to_string) {
                    debug!("Replacing '{}' block with the job molecule", key);
                    input.remove(&key);
                }
            }
            out.push_str(&serialize(&input));
        }
        Ok(out)
    }

    fn get_runscript(&self) -> String {
        let mut script = self.command.clone();
        if let Some(n) = self.nprocs {
            script.push_str(&format!(" -n {}", n));
        }
        script.push_str(&format!(
            " <{}",
            self.job.filename(QMProgram::Adf.input_extension())
        ));
        script
    }
}

/// CPU, system and wall-clock time of a run, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timings {
    /// CPU time
    pub cpu: f64,
    /// System time
    pub system: f64,
    /// Wall-clock time
    pub elapsed: f64,
}

/// Results of a finished ADF job.
pub struct AdfResults {
    results: Results,
    kf: Option<Box<dyn KfStore>>,
}

type ResultsResult<T> = std::result::Result<T, ResultsError>;

impl AdfResults {
    /// Results backed by an already opened KF store.
    pub fn new(results: Results, kf: Option<Box<dyn KfStore>>) -> Self {
        Self { results, kf }
    }

    /// Opens `<jobname>.t21.json` next to the output, if present.
    pub fn load(results: Results) -> Self {
        let path = results.path_for(KF_DUMP_EXTENSION);
        let kf: Option<Box<dyn KfStore>> = if path.exists() {
            match KfFile::open(&path) {
                Ok(kf) => Some(Box::new(kf)),
                Err(e) => {
                    warn!("Ignoring unreadable KF dump: {}", e);
                    None
                }
            }
        } else {
            debug!("No KF dump at {}", path.display());
            None
        };
        Self { results, kf }
    }

    /// Underlying job directory view.
    pub fn results(&self) -> &Results {
        &self.results
    }

    /// `true` when a KF store is attached.
    pub fn kf_present(&self) -> bool {
        self.kf.is_some()
    }

    fn kf(&self) -> ResultsResult<&dyn KfStore> {
        self.kf.as_deref().ok_or_else(|| {
            ResultsError::Missing(format!(
                "no KF file for job '{}' in {}",
                self.results.name(),
                self.results.dir().display()
            ))
        })
    }

    /// Every variable of the `Properties` section.
    pub fn get_properties(&self) -> ResultsResult<BTreeMap<String, KfValue>> {
        let kf = self.kf()?;
        let mut ret = BTreeMap::new();
        for (section, variable) in kf.entries() {
            if section == "Properties" {
                ret.insert(variable.to_string(), kf.read(section, variable)?.clone());
            }
        }
        Ok(ret)
    }

    /// Final geometry (`Geometry%xyz InputOrder`).
    ///
    /// For multi-geometry runs this is the last geometry; see
    /// [`AdfResults::get_input_molecule`] for the first one.
    pub fn get_main_molecule(&self) -> ResultsResult<Molecule> {
        self.get_molecule("Geometry", "xyz InputOrder", "bohr", false)
    }

    /// Initial geometry: `History%xyz 1` for multi-geometry runs, otherwise
    /// the final geometry.
    pub fn get_input_molecule(&self) -> ResultsResult<Molecule> {
        if self.kf()?.contains("History", "nr of geometries") {
            return self.get_molecule("History", "xyz 1", "bohr", true);
        }
        self.get_main_molecule()
    }

    /// Builds a molecule from a flat coordinate array stored in `unit`.
    ///
    /// `internal` marks arrays stored in internal atom order.
    pub fn get_molecule(
        &self,
        section: &str,
        variable: &str,
        unit: &str,
        internal: bool,
    ) -> ResultsResult<Molecule> {
        let kf = self.kf()?;
        let ratio = Units::conversion_ratio(unit, "angstrom")?;
        let mut coords = kf.read_f64_vec(section, variable)?;
        if internal {
            coords = self.to_input_order(&coords)?;
        }
        let atnums = self.atomic_numbers_input_order()?;
        if coords.len() != 3 * atnums.len() {
            return Err(ResultsError::Parse(format!(
                "{}%{} holds {} values for {} atoms",
                section,
                variable,
                coords.len(),
                atnums.len()
            )));
        }
        let symbols: Vec<String> = atnums
            .iter()
            .map(|&z| atomic_number_to_symbol(z).to_string())
            .collect();
        let xyz: Vec<[f64; 3]> = coords
            .chunks(3)
            .map(|c| [c[0] * ratio, c[1] * ratio, c[2] * ratio])
            .collect();
        Ok(Molecule::from_parts(&symbols, &xyz))
    }

    /// Final bond energy, expressed in `unit`.
    pub fn get_energy(&self, unit: &str) -> ResultsResult<f64> {
        self.single_value("Energy", "Bond Energy", unit)
    }

    /// Dipole vector, expressed in `unit`.
    pub fn get_dipole_vector(&self, unit: &str) -> ResultsResult<Vec<f64>> {
        let props = self.get_properties()?;
        let dipole = props.get("Dipole").ok_or_else(|| {
            ResultsError::Missing(format!(
                "'Dipole' not present in 'Properties' section of {}",
                self.kf_path_display()
            ))
        })?;
        let values = dipole
            .as_f64_vec()
            .ok_or_else(|| ResultsError::Parse("'Dipole' is not numeric".to_string()))?;
        Ok(Units::convert_all(&values, "au", unit)?)
    }

    /// Cartesian gradients from `GeoOpt%Gradients_InputOrder` as an N×3
    /// matrix in `e_unit`/`l_unit`.
    pub fn get_gradients(&self, e_unit: &str, l_unit: &str) -> ResultsResult<DMatrix<f64>> {
        let data = self.kf()?.read_f64_vec("GeoOpt", "Gradients_InputOrder")?;
        if data.len() % 3 != 0 {
            return Err(ResultsError::Parse(format!(
                "gradient array of length {} is not N×3",
                data.len()
            )));
        }
        let scale = Units::conversion_ratio("au", e_unit)? / Units::conversion_ratio("bohr", l_unit)?;
        Ok(DMatrix::from_row_slice(data.len() / 3, 3, &data) * scale)
    }

    /// Energy decomposition terms, expressed in `unit`.
    ///
    /// Keys: `Electrostatic`, `Kinetic`, `Coulomb`, `XC`. The terms sum to
    /// [`AdfResults::get_energy`].
    pub fn get_energy_decomposition(&self, unit: &str) -> ResultsResult<BTreeMap<String, f64>> {
        let terms = [
            ("Electrostatic", "Electrostatic Energy"),
            ("Kinetic", "Kinetic Energy"),
            ("Coulomb", "Elstat Interaction"),
            ("XC", "XC Energy"),
        ];
        let mut ret = BTreeMap::new();
        for (name, variable) in terms {
            ret.insert(name.to_string(), self.single_value("Energy", variable, unit)?);
        }
        Ok(ret)
    }

    /// Timings from the last `Total Used` line of the output.
    pub fn get_timings(&self) -> ResultsResult<Timings> {
        let lines = self.results.grep_output(TIMINGS_MARKER)?;
        let last = lines.last().ok_or_else(|| {
            ResultsError::Missing(format!(
                "'{}' not found in {}",
                TIMINGS_MARKER.trim(),
                self.results.output_path().display()
            ))
        })?;
        Ok(Timings {
            elapsed: parse_field_from_end(last, 1)?,
            system: parse_field_from_end(last, 3)?,
            cpu: parse_field_from_end(last, 5)?,
        })
    }

    /// Atomic numbers in input order.
    pub fn atomic_numbers_input_order(&self) -> ResultsResult<Vec<usize>> {
        let kf = self.kf()?;
        let n = usize::try_from(kf.read_i64("Geometry", "nr of atoms")?)
            .map_err(|_| ResultsError::Parse("negative atom count".to_string()))?;
        let atomtypes = kf
            .read_str("Geometry", "atomtype")?
            .split_whitespace()
            .map(|t| {
                symbol_to_atomic_number(t)
                    .ok_or_else(|| ResultsError::Parse(format!("unknown atom type '{}'", t)))
            })
            .collect::<ResultsResult<Vec<usize>>>()?;
        let index = kf.read_i64_vec("Geometry", "fragment and atomtype index")?;
        if index.len() < n {
            return Err(ResultsError::Parse(format!(
                "atom type index has {} entries for {} atoms",
                index.len(),
                n
            )));
        }
        let internal = index[index.len() - n..]
            .iter()
            .map(|&t| {
                usize::try_from(t)
                    .ok()
                    .and_then(|t| t.checked_sub(1))
                    .and_then(|t| atomtypes.get(t).copied())
                    .ok_or_else(|| ResultsError::Parse(format!("invalid atom type index {}", t)))
            })
            .collect::<ResultsResult<Vec<usize>>>()?;
        self.to_input_order(&internal)
    }

    /// 1-based mapping used to bring internal-order data into input order.
    fn int2inp(&self) -> ResultsResult<Vec<usize>> {
        let aoi = self.atom_order_index()?;
        Ok(aoi[..aoi.len() / 2].to_vec())
    }

    /// 1-based mapping used to bring input-order data into internal order.
    fn inp2int(&self) -> ResultsResult<Vec<usize>> {
        let aoi = self.atom_order_index()?;
        Ok(aoi[aoi.len() / 2..].to_vec())
    }

    fn atom_order_index(&self) -> ResultsResult<Vec<usize>> {
        self.kf()?
            .read_i64_vec("Geometry", "atom order index")?
            .into_iter()
            .map(|i| {
                usize::try_from(i)
                    .map_err(|_| ResultsError::Parse(format!("invalid atom order index {}", i)))
            })
            .collect()
    }

    /// Reorders per-atom data (N values or N×3 flat coordinates) from
    /// internal to input order.
    pub fn to_input_order<T: Clone>(&self, data: &[T]) -> ResultsResult<Vec<T>> {
        reorder(data, &self.int2inp()?)
    }

    /// Reorders per-atom data from input to internal order.
    pub fn to_internal_order<T: Clone>(&self, data: &[T]) -> ResultsResult<Vec<T>> {
        reorder(data, &self.inp2int()?)
    }

    /// Molecule the job was started from, if a KF file is present.
    pub fn recreate_molecule(&self) -> Option<Molecule> {
        if !self.kf_present() {
            return None;
        }
        match self.get_input_molecule() {
            Ok(mol) => Some(mol),
            Err(e) => {
                warn!("Failed to recreate molecule from {}: {}", self.kf_path_display(), e);
                None
            }
        }
    }

    /// Best-effort reconstruction of the job settings from the input text
    /// stored in the KF file.
    ///
    /// The recovered tree is placed under `input`, without its `atoms` block.
    /// Returns `None` (with a warning) when no strategy can parse the text.
    pub fn recreate_settings(&self) -> Option<Settings> {
        let kf = self.kf.as_deref()?;
        let user_input = match stored_input(kf) {
            Ok(text) => text,
            Err(e) => {
                warn!("No input text stored in {}: {}", kf.path().display(), e);
                return None;
            }
        };
        let mut input = match adf_input::recover(&user_input) {
            Ok(settings) => settings,
            Err(failures) => {
                for (strategy, e) in &failures {
                    debug!("{:?}: {}", strategy, e);
                }
                warn!(
                    "Failed to recreate input settings from {}",
                    kf.path().display()
                );
                return None;
            }
        };
        if let Some(key) = input.find_case("atoms").map(str::to_string) {
            input.remove(&key);
        }
        let mut settings = Settings::new();
        settings.set(INPUT_BRANCH, input);
        Some(settings)
    }

    fn single_value(&self, section: &str, variable: &str, unit: &str) -> ResultsResult<f64> {
        let value = self.kf()?.read_f64(section, variable)?;
        Ok(Units::convert(value, "au", unit)?)
    }

    fn kf_path_display(&self) -> String {
        match &self.kf {
            Some(kf) => kf.path().display().to_string(),
            None => self.results.path_for(KF_EXTENSION).display().to_string(),
        }
    }
}

/// Input text from `General%Input` (fixed-width records) or
/// `General%user input`.
fn stored_input(kf: &dyn KfStore) -> std::result::Result<String, crate::kf::KfError> {
    if kf.contains("General", "Input") {
        let raw: Vec<char> = kf.read_str("General", "Input")?.chars().collect();
        let records: Vec<String> = raw
            .chunks(INPUT_RECORD_WIDTH)
            .map(|record| record.iter().collect::<String>().trim_end().to_string())
            .collect();
        return Ok(records.join("\n"));
    }
    Ok(kf.read_str("General", "user input")?.to_string())
}

fn reorder<T: Clone>(data: &[T], mapping: &[usize]) -> ResultsResult<Vec<T>> {
    let n = mapping.len();
    let stride = if data.len() == n {
        1
    } else if data.len() == 3 * n {
        3
    } else {
        return Err(ResultsError::Parse(format!(
            "cannot reorder {} values with a mapping for {} atoms",
            data.len(),
            n
        )));
    };
    let mut out = Vec::with_capacity(data.len());
    for &m in mapping {
        let start = m
            .checked_sub(1)
            .map(|i| i * stride)
            .filter(|&s| s + stride <= data.len())
            .ok_or_else(|| ResultsError::Parse(format!("atom index {} out of range", m)))?;
        out.extend_from_slice(&data[start..start + stride]);
    }
    Ok(out)
}
