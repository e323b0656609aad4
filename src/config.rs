//! Supported quantum chemistry programs and their file conventions.
//!
//! - [`QMProgram`]: the programs this crate can drive
//!
//! File extensions are the built-in defaults; the output extension can be
//! overridden through the `[extensions]` section of the configuration file
//! (see [`settings`](crate::settings)).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Quantum chemistry programs with an input writer and result reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QMProgram {
    /// Amsterdam Density Functional (block-format input, KF result files)
    Adf,
    /// CP2K (`&SECTION ... &END` input)
    Cp2k,
    /// ORCA (`! simple input` line plus `%block ... end` sections)
    Orca,
}

impl QMProgram {
    /// All supported programs, in a fixed order.
    pub const ALL: [QMProgram; 3] = [QMProgram::Adf, QMProgram::Cp2k, QMProgram::Orca];

    /// Extension of the input file written for this program.
    ///
    /// ```
    /// use qmadapt::config::QMProgram;
    ///
    /// assert_eq!(QMProgram::Adf.input_extension(), "in");
    /// assert_eq!(QMProgram::Orca.input_extension(), "inp");
    /// ```
    pub fn input_extension(self) -> &'static str {
        match self {
            QMProgram::Adf => "in",
            QMProgram::Cp2k => "inp",
            QMProgram::Orca => "inp",
        }
    }

    /// Default extension of the main text output.
    pub fn output_extension(self) -> &'static str {
        match self {
            QMProgram::Adf => "out",
            QMProgram::Cp2k => "out",
            QMProgram::Orca => "out",
        }
    }

    /// Marker printed by the program on normal termination.
    pub fn termination_marker(self) -> &'static str {
        match self {
            QMProgram::Adf => "NORMAL TERMINATION",
            QMProgram::Cp2k => "PROGRAM STOPPED IN",
            QMProgram::Orca => "ORCA TERMINATED NORMALLY",
        }
    }

    /// Default executable name.
    pub fn default_command(self) -> &'static str {
        match self {
            QMProgram::Adf => "adf",
            QMProgram::Cp2k => "cp2k.popt",
            QMProgram::Orca => "orca",
        }
    }
}

impl fmt::Display for QMProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QMProgram::Adf => "adf",
            QMProgram::Cp2k => "cp2k",
            QMProgram::Orca => "orca",
        };
        f.write_str(name)
    }
}

impl FromStr for QMProgram {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "adf" => Ok(QMProgram::Adf),
            "cp2k" => Ok(QMProgram::Cp2k),
            "orca" => Ok(QMProgram::Orca),
            other => Err(format!(
                "Unknown program '{}'; expected one of adf, cp2k, orca",
                other
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_program_round_trip_through_strings() {
        for program in QMProgram::ALL {
            let parsed: QMProgram = program.to_string().parse().unwrap();
            assert_eq!(parsed, program);
        }
        assert_eq!("ORCA".parse::<QMProgram>().unwrap(), QMProgram::Orca);
        assert!("gaussian".parse::<QMProgram>().is_err());
    }

    #[test]
    fn test_termination_markers() {
        assert_eq!(QMProgram::Cp2k.termination_marker(), "PROGRAM STOPPED IN");
        assert_eq!(
            QMProgram::Orca.termination_marker(),
            "ORCA TERMINATED NORMALLY"
        );
    }
}
