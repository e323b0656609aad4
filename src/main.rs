//! qmadapt command-line interface
//!
//! Thin wrapper over the library adapters:
//!
//! 1. **Input Writing** (`qmadapt input <program> <settings.json> [molecule.xyz]`):
//!    Writes the program input for a job described by a JSON settings tree
//!
//! 2. **Run Script** (`qmadapt runscript <program> <name>`):
//!    Prints the shell command running job `<name>`
//!
//! 3. **Termination Check** (`qmadapt check <program> <output>`):
//!    Exit status 0 if the output shows normal termination, 1 otherwise
//!
//! 4. **Energy** (`qmadapt energy <program> <output> [unit]`):
//!    Prints the final energy of an ADF or ORCA run
//!
//! 5. **Settings Template** (`qmadapt ci qmadapt_config.cfg`)
//!
//! # Examples
//!
//! ```bash
//! qmadapt input orca water.json water.xyz
//! qmadapt runscript cp2k water
//! qmadapt check adf benzene.out
//! qmadapt energy orca water.out kcal/mol
//! ```

use log::{debug, info};
use qmadapt::adf::AdfResults;
use qmadapt::config::QMProgram;
use qmadapt::help::{print_global_help, print_program_help};
use qmadapt::io::read_xyz;
use qmadapt::orca::OrcaResults;
use qmadapt::qm_interface::{interface_for, Job};
use qmadapt::results::Results;
use qmadapt::settings::{SettingsManager, CONFIG_FILE_NAME};
use qmadapt::tree::Settings;
use std::env;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::process;

type CliResult<T> = Result<T, Box<dyn Error>>;

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage(&args[0]);
        process::exit(1);
    }

    // Check for help flags before processing commands
    check_help_flags(&args);

    let settings = match SettingsManager::load() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Warning: failed to load configuration: {}", e);
            SettingsManager::from_config(Default::default())
        }
    };

    // Initialize console logger for all commands
    env_logger::Builder::from_default_env()
        .filter_level(settings.logging().level_filter())
        .target(env_logger::Target::Stdout)
        .format_timestamp_millis()
        .init();
    debug!("Configuration source: {}", settings.config_source());

    let command = args[1].as_str();
    let result = match command {
        "input" => with_args(&args, 4, "input <program> <settings.json> [molecule.xyz]")
            .and_then(|_| run_input(&settings, &args[2], Path::new(&args[3]), args.get(4))),
        "runscript" => with_args(&args, 4, "runscript <program> <name>")
            .and_then(|_| run_runscript(&settings, &args[2], &args[3])),
        "check" => with_args(&args, 4, "check <program> <output>").and_then(|_| {
            let ok = run_check(&settings, &args[2], Path::new(&args[3]))?;
            if !ok {
                process::exit(1);
            }
            Ok(())
        }),
        "energy" => with_args(&args, 4, "energy <program> <output> [unit]").and_then(|_| {
            let unit = args.get(4).map(String::as_str).unwrap_or("au");
            run_energy(&settings, &args[2], Path::new(&args[3]), unit)
        }),
        "ci" => with_args(&args, 3, &format!("ci {}", CONFIG_FILE_NAME))
            .and_then(|_| run_create_settings_template(&args[2])),
        _ => {
            eprintln!("Error: Unknown command: {}", command);
            print_usage(&args[0]);
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn with_args(args: &[String], count: usize, usage: &str) -> CliResult<()> {
    if args.len() < count {
        return Err(format!("Missing arguments\nUsage: {} {}", args[0], usage).into());
    }
    Ok(())
}

/// Check for help flags and print appropriate help
fn check_help_flags(args: &[String]) {
    if args[1] != "--help" && args[1] != "-h" {
        return;
    }
    match args.get(2) {
        Some(topic) => match topic.parse::<QMProgram>() {
            Ok(program) => print_program_help(program),
            Err(e) => {
                eprintln!("{}", e);
                process::exit(1);
            }
        },
        None => print_global_help(),
    }
    process::exit(0);
}

fn print_usage(program_name: &str) {
    eprintln!("Usage:");
    eprintln!("  {} input <program> <settings.json> [molecule.xyz]", program_name);
    eprintln!("  {} runscript <program> <name>", program_name);
    eprintln!("  {} check <program> <output>", program_name);
    eprintln!("  {} energy <program> <output> [unit]", program_name);
    eprintln!("  {} ci {}", program_name, CONFIG_FILE_NAME);
    eprintln!("  {} --help [program]", program_name);
}

/// Writes `<stem>.<ext>` in the current directory, where `<stem>` is the
/// settings file stem.
fn run_input(
    settings: &SettingsManager,
    program: &str,
    settings_path: &Path,
    molecule_path: Option<&String>,
) -> CliResult<()> {
    let program: QMProgram = program.parse()?;
    let name = file_stem(settings_path)?;
    let tree = Settings::from_json_file(settings_path)?;
    let molecule = match molecule_path {
        Some(path) => Some(read_xyz(Path::new(path))?),
        None => None,
    };

    let job = Job::new(&name, tree, molecule);
    let adapter = interface_for(program, job, settings.config());
    let path = adapter.write_input(Path::new("."))?;
    info!("Wrote {} input: {}", program, path.display());
    println!("{}", path.display());
    Ok(())
}

fn run_runscript(settings: &SettingsManager, program: &str, name: &str) -> CliResult<()> {
    let program: QMProgram = program.parse()?;
    let adapter = interface_for(program, Job::new(name, Settings::new(), None), settings.config());
    println!("{}", adapter.get_runscript());
    Ok(())
}

fn run_check(settings: &SettingsManager, program: &str, output: &Path) -> CliResult<bool> {
    let program: QMProgram = program.parse()?;
    let results = results_for(output, settings.get_output_extension(program))?;
    let name = results.name().to_string();
    let adapter = interface_for(program, Job::new(&name, Settings::new(), None), settings.config());
    let ok = adapter.check(&results);
    if ok {
        info!("{} job '{}' terminated normally", program, name);
    } else {
        info!(
            "{} job '{}' did not terminate normally ({})",
            program,
            name,
            results.output_path().display()
        );
    }
    Ok(ok)
}

fn run_energy(
    settings: &SettingsManager,
    program: &str,
    output: &Path,
    unit: &str,
) -> CliResult<()> {
    let program: QMProgram = program.parse()?;
    let results = results_for(output, settings.get_output_extension(program))?;
    let energy = match program {
        QMProgram::Adf => AdfResults::load(results).get_energy(unit)?,
        QMProgram::Orca => OrcaResults::new(results, None).get_energy(unit)?,
        QMProgram::Cp2k => return Err("energy extraction is not available for cp2k".into()),
    };
    println!("{:.10} {}", energy, unit);
    Ok(())
}

fn run_create_settings_template(file_arg: &str) -> CliResult<()> {
    if file_arg != CONFIG_FILE_NAME {
        return Err(format!("ci only creates '{}'", CONFIG_FILE_NAME).into());
    }
    SettingsManager::create_template(Path::new(CONFIG_FILE_NAME))?;
    println!("✓ Settings template created successfully!");
    println!("  Output file: {}", CONFIG_FILE_NAME);
    println!("\nNext steps:");
    println!("  1. Review and edit the {} file", CONFIG_FILE_NAME);
    println!("  2. Set executables and the cluster launcher for your machine");
    println!("  3. The settings will be automatically loaded by qmadapt");
    Ok(())
}

/// Results view for an output file path: its directory, stem and extension.
///
/// A path without extension is a job name; the configured output extension
/// is used for it.
fn results_for(output: &Path, configured_extension: &str) -> CliResult<Results> {
    let name = file_stem(output)?;
    let dir: PathBuf = match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let extension = output
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or(configured_extension);
    Ok(Results::new(dir, &name, extension))
}

fn file_stem(path: &Path) -> CliResult<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .ok_or_else(|| format!("Cannot derive a job name from {}", path.display()).into())
}
