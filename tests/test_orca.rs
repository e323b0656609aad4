use qmadapt::config::QMProgram;
use qmadapt::orca::OrcaResults;
use qmadapt::qm_interface::{interface_for, Job};
use qmadapt::results::{Results, ResultsError};
use qmadapt::settings::Config;
use qmadapt::tree::Settings;
use std::fs;
use tempfile::TempDir;

const OUTPUT: &str = "\
                                 * O   R   C   A *

-------------------------   --------------------
FINAL SINGLE POINT ENERGY       -76.300000000000
-------------------------   --------------------

-------------------------   --------------------
FINAL SINGLE POINT ENERGY       -76.326597183000
-------------------------   --------------------

-----------------------
VIBRATIONAL FREQUENCIES
-----------------------

   0:         0.00 cm**-1
   1:         0.00 cm**-1
   2:         0.00 cm**-1
   3:         0.00 cm**-1
   4:         0.00 cm**-1
   5:         0.00 cm**-1
   6:      1635.43 cm**-1
   7:      3696.12 cm**-1
   8:      3803.87 cm**-1

------------
NORMAL MODES
------------

                             ****ORCA TERMINATED NORMALLY****
";

const FINAL_XYZ: &str = "\
3
Coordinates from ORCA-job water E -76.326597183
  O   0.00000000000000      0.00000000000000      0.11730000000000
  H   0.00000000000000      0.75720000000000     -0.46920000000000
  H   0.00000000000000     -0.75720000000000     -0.46920000000000
";

fn job_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("water.out"), OUTPUT).unwrap();
    fs::write(dir.path().join("water.xyz"), FINAL_XYZ).unwrap();
    dir
}

#[test]
fn test_final_energy_uses_last_match() {
    let dir = job_dir();
    let results = OrcaResults::new(Results::new(dir.path(), "water", "out"), None);
    assert!((results.get_energy("au").unwrap() - -76.326597183).abs() < 1e-12);
    let kcal = results.get_energy("kcal/mol").unwrap();
    assert!((kcal - -76.326597183 * 627.509474063).abs() < 1e-6);
}

#[test]
fn test_frequencies_sized_by_final_molecule() {
    let dir = job_dir();
    let results = OrcaResults::new(Results::new(dir.path(), "water", "out"), None);
    let freqs = results.get_frequencies("cm^-1").unwrap();
    assert_eq!(freqs.len(), 9);
    assert_eq!(freqs[0], 0.0);
    assert!((freqs[8] - 3803.87).abs() < 1e-9);

    let ev = results.get_frequencies("eV").unwrap();
    assert!((ev[6] - 1635.43 / 8065.543937).abs() < 1e-6);
}

#[test]
fn test_main_molecule_from_xyz() {
    let dir = job_dir();
    let results = OrcaResults::new(Results::new(dir.path(), "water", "out"), None);
    let mol = results.get_main_molecule().unwrap();
    assert_eq!(mol.num_atoms(), 3);
    assert_eq!(mol.atoms[0].symbol, "O");
    assert!((mol.atoms[1].coords[1] - 0.7572).abs() < 1e-12);
}

#[test]
fn test_missing_energy_is_an_error() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("empty.out"), "nothing here\n").unwrap();
    let results = OrcaResults::new(Results::new(dir.path(), "empty", "out"), None);
    assert!(matches!(results.get_energy("au"), Err(ResultsError::Missing(_))));

    let absent = OrcaResults::new(Results::new(dir.path(), "absent", "out"), None);
    assert!(matches!(absent.get_energy("au"), Err(ResultsError::File { .. })));
}

#[test]
fn test_input_file_and_check() {
    let dir = job_dir();
    let settings = Settings::from_json_str(
        r#"{"input": {
            "main": "UKS B3LYP/G SV(P) SV/J TightSCF",
            "method": {"SpecialGridAtoms": 26, "SpecialGridIntAcc": 7},
            "basis": {"NewGTO": {"_end": "26 \"CP(PPP)\""}}
        }}"#,
    )
    .unwrap();
    let mut mol = qmadapt::io::parse_xyz(FINAL_XYZ).unwrap();
    mol.set_property("charge", 0);
    mol.set_property("multiplicity", 1);
    let job = Job::new("water", settings, Some(mol));
    let adapter = interface_for(QMProgram::Orca, job, &Config::default());

    let path = adapter.write_input(dir.path()).unwrap();
    let text = fs::read_to_string(path).unwrap();
    assert_eq!(
        text,
        "! UKS B3LYP/G SV(P) SV/J TightSCF\n\n\
         %method SpecialGridAtoms 26\n        SpecialGridIntAcc 7\n        end\n\n\
         %basis NewGTO 26 \"CP(PPP)\" end\n       end\n\n\
         * xyz 0 1\n\
         \x20\x20\x20\x20O    0.00000    0.00000    0.11730\n\
         \x20\x20\x20\x20H    0.00000    0.75720   -0.46920\n\
         \x20\x20\x20\x20H    0.00000   -0.75720   -0.46920\n\
         *\n"
    );
    assert!(adapter.check(&Results::new(dir.path(), "water", "out")));
}
