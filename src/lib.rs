#![deny(missing_docs)]

//! qmadapt - input writers and result readers for ADF, CP2K and ORCA
//!
//! A job is a name, a nested [`Settings`](tree::Settings) tree and an
//! optional [`Molecule`](molecule::Molecule). Each program adapter turns the
//! `input` branch of the settings into the program's native input text,
//! builds the shell command that runs it, and reads results back from the
//! finished job's files.
//!
//! # Overview
//!
//! | Program | Input syntax | Results |
//! |---------|--------------|---------|
//! | ADF | `Key value` / `Key ... End` blocks, `Atoms` block | KF file: energies, dipole, gradients, geometry, recreated settings |
//! | CP2K | `&SECTION ... &END`, `@SET`/`@IF`/`@include` | termination check |
//! | ORCA | `! simple line`, `%block ... end`, `* xyz` geometry | text output: energy, frequencies |
//!
//! All adapters implement [`QMInterface`](qm_interface::QMInterface):
//! `get_input`, `get_runscript` and `check`. Scheduling, file staging and
//! process management belong to the caller.
//!
//! # Quick Start
//!
//! ```
//! use qmadapt::config::QMProgram;
//! use qmadapt::qm_interface::{interface_for, Job};
//! use qmadapt::settings::Config;
//! use qmadapt::tree::Settings;
//!
//! let settings = Settings::from_json_str(
//!     r#"{"input": {"global": {"project": "water", "run_type": "ENERGY"}}}"#,
//! )
//! .unwrap();
//! let job = Job::new("water", settings, None);
//! let cp2k = interface_for(QMProgram::Cp2k, job, &Config::default());
//! assert_eq!(
//!     cp2k.get_input().unwrap(),
//!     "&GLOBAL\n  PROJECT  water\n  RUN_TYPE  ENERGY\n&END\n\n"
//! );
//! ```
//!
//! # Units
//!
//! Result accessors take a target unit name (`"au"`, `"eV"`, `"kcal/mol"`,
//! `"angstrom"`, `"Debye"`, `"cm^-1"`, ...). Values are stored in atomic
//! units (bohr for lengths, cm⁻¹ for frequencies) and converted with
//! [`Units`](units::Units).

/// ADF input writer and KF result reader
pub mod adf;
/// ADF input parser used to recreate job settings
pub mod adf_input;
/// Program identifiers, extensions and termination markers
pub mod config;
/// CP2K input writer
pub mod cp2k;
/// Built-in help system
pub mod help;
/// XYZ file reading and writing
pub mod io;
/// KF file access
pub mod kf;
/// Atoms and molecules with property bags
pub mod molecule;
/// ORCA input writer and result reader
pub mod orca;
/// Element symbols and atomic numbers
pub mod periodic_table;
/// Job description and the common adapter trait
pub mod qm_interface;
/// Access to files of a finished job
pub mod results;
/// Configuration management system
pub mod settings;
/// Ordered settings trees
pub mod tree;
/// Unit conversion
pub mod units;

pub use config::QMProgram;
pub use molecule::{Atom, Molecule};
pub use qm_interface::{interface_for, Job, QMInterface};
pub use results::Results;
pub use tree::{Settings, Value};
