use qmadapt::config::QMProgram;
use qmadapt::qm_interface::{interface_for, Job};
use qmadapt::results::Results;
use qmadapt::settings::{Config, SettingsManager};
use qmadapt::tree::Settings;
use std::fs;
use tempfile::TempDir;

const SETTINGS: &str = r#"{
  "input": {
    "global": {"project": "water", "run_type": "ENERGY"},
    "at_set": {"BASIS": "DZVP-GTH"},
    "force_eval": {
      "method": "Quickstep",
      "dft": {
        "basis_set_file_name": "BASIS_SET",
        "uks": true,
        "scf": {"eps_scf": 1.0e-6, "scf_guess": "ATOMIC"},
        "xc": {"xc_functional": {"pbe": ""}}
      },
      "subsys": {
        "cell": {"abc": "10.0 10.0 10.0"},
        "kind": {
          "h": {"basis_set": "${BASIS}", "potential": "GTH-PBE-q1"},
          "o": {"basis_set": "${BASIS}", "potential": "GTH-PBE-q6"}
        },
        "at_include": "coords.inc"
      }
    }
  }
}"#;

const EXPECTED: &str = "\
&GLOBAL
  PROJECT  water
  RUN_TYPE  ENERGY
&END

@SET BASIS DZVP-GTH

&FORCE_EVAL
  METHOD  Quickstep
  &DFT
    BASIS_SET_FILE_NAME  BASIS_SET
    UKS
    &SCF
      EPS_SCF  1e-6
      SCF_GUESS  ATOMIC
    &END
    &XC
      &XC_FUNCTIONAL
        PBE
      &END
    &END
  &END
  &SUBSYS
    &CELL
      ABC  10.0 10.0 10.0
    &END
    &KIND  H
      BASIS_SET  ${BASIS}
      POTENTIAL  GTH-PBE-q1
    &END
    &KIND  O
      BASIS_SET  ${BASIS}
      POTENTIAL  GTH-PBE-q6
    &END
@include coords.inc
  &END
&END

";

#[test]
fn test_full_input_file() {
    let dir = TempDir::new().unwrap();
    let settings = Settings::from_json_str(SETTINGS).unwrap();
    let adapter = interface_for(
        QMProgram::Cp2k,
        Job::new("water", settings, None),
        &Config::default(),
    );
    let path = adapter.write_input(dir.path()).unwrap();
    assert_eq!(path, dir.path().join("water.inp"));
    assert_eq!(fs::read_to_string(path).unwrap(), EXPECTED);
}

#[test]
fn test_configured_command_and_launcher() {
    let config = SettingsManager::parse_config(
        "[programs]\ncp2k = cp2k.psmp\nlauncher = qmadapt-no-such-launcher\n",
    )
    .unwrap();
    let adapter = interface_for(
        QMProgram::Cp2k,
        Job::new("water", Settings::new(), None),
        &config,
    );
    assert_eq!(adapter.get_runscript(), "cp2k.psmp -i water.inp -o water.out");
}

#[test]
fn test_configured_output_extension() {
    let config = SettingsManager::parse_config("[extensions]\ncp2k = log\n").unwrap();
    let adapter = interface_for(
        QMProgram::Cp2k,
        Job::new("w", Settings::new(), None),
        &config,
    );
    assert!(adapter.get_runscript().ends_with("cp2k.popt -i w.inp -o w.log"));
}

#[test]
fn test_check_termination_marker() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("water.out"),
        " ENERGY| Total FORCE_EVAL ( QS ) energy [a.u.]:  -17.1\n PROGRAM STOPPED IN\n",
    )
    .unwrap();
    fs::write(dir.path().join("crashed.out"), " SCF run NOT converged\n").unwrap();
    let adapter = interface_for(
        QMProgram::Cp2k,
        Job::new("water", Settings::new(), None),
        &Config::default(),
    );
    assert!(adapter.check(&Results::new(dir.path(), "water", "out")));
    assert!(!adapter.check(&Results::new(dir.path(), "crashed", "out")));
}
