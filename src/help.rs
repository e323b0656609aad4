//! Built-in help for the command-line tool.

use crate::config::QMProgram;
use crate::settings::CONFIG_FILE_NAME;

/// Help entry for a supported program.
#[derive(Debug, Clone)]
pub struct ProgramInfo {
    /// Program handled by this entry
    pub program: QMProgram,
    /// One-line description
    pub description: &'static str,
    /// How the `input` settings branch is written
    pub input_layout: &'static [&'static str],
    /// Results that can be extracted after the run
    pub results: &'static [&'static str],
}

/// Help entries for every program, in [`QMProgram::ALL`] order.
pub fn get_programs() -> &'static [ProgramInfo] {
    &[
        ProgramInfo {
            program: QMProgram::Adf,
            description: "Amsterdam Density Functional, block-format input and KF result files",
            input_layout: &[
                "key: value              -> Key value",
                "key: {..}               -> Key [header] ... End",
                "key: [a, b]             -> Key a / Key b",
                "key: true | \"\"          -> Key",
                "key: false              -> omitted",
                "molecule                -> Atoms block, f=/b= from adf.fragment/adf.block",
            ],
            results: &[
                "bond energy, energy decomposition, dipole vector, gradients",
                "final and initial molecule, timings",
                "recreated settings and molecule from the KF file",
            ],
        },
        ProgramInfo {
            program: QMProgram::Cp2k,
            description: "CP2K, section-based input run through an optional cluster launcher",
            input_layout: &[
                "key: value              -> KEY  value",
                "key: {..}               -> &KEY ... &END",
                "kind: {name: {..}}      -> &KIND  NAME ... &END",
                "at_set: {var: value}    -> @SET var value",
                "at_if: {pred: {..}}     -> @IF pred ... @ENDIF",
                "at_include: file        -> @include file",
                "key: true | \"\"          -> KEY",
            ],
            results: &["normal termination check"],
        },
        ProgramInfo {
            program: QMProgram::Orca,
            description: "ORCA, simple input line plus %blocks and an xyz geometry block",
            input_layout: &[
                "main: value             -> ! value",
                "key: {..}               -> %key sub value ... end",
                "key: {sub: {_end: v}}   -> %key sub v end ... end",
                "key: value              -> %key value / end",
                "molecule                -> * xyz charge multiplicity ... *",
            ],
            results: &["final single point energy, vibrational frequencies, final molecule"],
        },
    ]
}

/// Print general usage
pub fn print_global_help() {
    println!("qmadapt - input writer and result reader for ADF, CP2K and ORCA");
    println!();
    println!("USAGE:");
    println!("    qmadapt <COMMAND> [ARGS]");
    println!();
    println!("COMMANDS:");
    println!("    input <program> <settings.json> [molecule.xyz]");
    println!("                        Write <name>.<ext> input for the job described by");
    println!("                        settings.json (name taken from the file stem)");
    println!();
    println!("    runscript <program> <name>");
    println!("                        Print the shell command that runs job <name>");
    println!();
    println!("    check <program> <output>");
    println!("                        Exit 0 if the output shows normal termination");
    println!();
    println!("    energy <program> <output> [unit]");
    println!("                        Print the final energy (default unit: au)");
    println!();
    println!("    ci {}", CONFIG_FILE_NAME);
    println!("                        Create a configuration template file");
    println!();
    println!("OPTIONS:");
    println!("    -h, --help [program] Show help. Programs: adf, cp2k, orca");
    println!();
    println!("CONFIGURATION FILE:");
    println!("    Supported locations:");
    println!("      - ./{} (local, highest priority)", CONFIG_FILE_NAME);
    println!("      - ~/.config/qmadapt/{} (user)", CONFIG_FILE_NAME);
    println!("      - /etc/qmadapt/{} (system)", CONFIG_FILE_NAME);
    println!("    Features: executables, launcher, output extensions, logging");
    println!();
    println!("EXAMPLES:");
    println!("    qmadapt input orca water.json water.xyz");
    println!("    qmadapt runscript cp2k water");
    println!("    qmadapt check adf benzene.out");
    println!("    qmadapt energy orca water.out kcal/mol");
    println!();
}

/// Print the settings-to-input mapping of one program
pub fn print_program_help(program: QMProgram) {
    let Some(info) = get_programs().iter().find(|p| p.program == program) else {
        return;
    };
    println!("{} ({})", program, info.description);
    println!("═══════════════════════════════════════════════════════════════════════");
    println!();
    println!("INPUT ('input' branch of settings.json):");
    for line in info.input_layout {
        println!("    {}", line);
    }
    println!();
    println!("FILES:");
    println!(
        "    input: <name>.{}    output: <name>.{}",
        program.input_extension(),
        program.output_extension()
    );
    println!("    normal termination marker: '{}'", program.termination_marker());
    println!();
    println!("RESULTS:");
    for line in info.results {
        println!("    {}", line);
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_program_documented() {
        for program in QMProgram::ALL {
            assert!(get_programs().iter().any(|p| p.program == program));
        }
    }

    #[test]
    fn test_orca_scalar_block_layout_matches_writer() {
        let orca = get_programs()
            .iter()
            .find(|p| p.program == QMProgram::Orca)
            .unwrap();
        assert!(orca
            .input_layout
            .contains(&"key: value              -> %key value / end"));

        let mut input = crate::tree::Settings::new();
        input.set("key", "value");
        let text = crate::orca::serialize(&input);
        let lines: Vec<&str> = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();
        assert_eq!(lines, vec!["%key value", "end"]);
    }
}
