//! Parser for ADF's keyword/block input format.
//!
//! Used to turn the input text stored in an ADF result file back into a
//! [`Settings`] tree. The grammar understood here:
//!
//! - `Key value...` stores `value` under `Key`; a bare `Key` is a flag
//! - a block opens on a line whose first word is a known block key (see
//!   [`BLOCK_KEYS`]) or on any line ending in `&`, and closes with `End`
//! - arguments on a block header line become the tree's header
//! - repeated keys collect into a list
//! - `#`, `!` and `::` start comments
//!
//! Older inputs close nested blocks with `SubEnd` and finish with
//! `End Input`. [`parse`] rejects both; [`convert_legacy_input`] rewrites
//! them. [`recover`] tries the [`Recovery`] strategies in order.
//!
//! ```
//! use qmadapt::adf_input::parse;
//!
//! let s = parse("XC\n  GGA PBE\nEnd\nSymmetry NOSYM\n").unwrap();
//! assert_eq!(s.get_path("XC.GGA").unwrap().as_str(), Some("PBE"));
//! ```

use crate::tree::{Scalar, Settings, Value};
use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use thiserror::Error;

/// Keys that open a block at the top level of an ADF input.
pub const BLOCK_KEYS: &[&str] = &[
    "analyticalfreq",
    "aoresponse",
    "atoms",
    "basis",
    "beckegrid",
    "constraints",
    "efield",
    "excitations",
    "fragments",
    "geometry",
    "geovar",
    "integration",
    "irrepoccupations",
    "linearscaling",
    "occupations",
    "qtens",
    "relativity",
    "restart",
    "scf",
    "solvation",
    "units",
    "xc",
    "zlmfit",
];

lazy_static! {
    // Comment starting at line begin or after whitespace
    static ref COMMENT_RE: Regex = Regex::new(r"(^|\s)(#|!|::).*$").unwrap();

    // "End Input" / "EndInput" terminator of legacy inputs
    static ref END_INPUT_RE: Regex = Regex::new(r"(?i)^end\s*input$").unwrap();

    static ref INT_RE: Regex = Regex::new(r"^[-+]?\d+$").unwrap();
    static ref FLOAT_RE: Regex =
        Regex::new(r"^[-+]?(?:\d+\.\d*|\.\d+|\d+)(?:[eEdD][-+]?\d+)?$").unwrap();
}

/// Errors raised by [`parse`].
#[derive(Error, Debug, PartialEq)]
pub enum InputParseError {
    /// `End` outside of any block
    #[error("line {line}: 'End' without an open block")]
    UnbalancedEnd {
        /// 1-based line number
        line: usize,
    },
    /// Input ended inside a block
    #[error("block '{key}' opened on line {line} is never closed")]
    UnterminatedBlock {
        /// Block key
        key: String,
        /// 1-based line of the block header
        line: usize,
    },
    /// Construct only accepted after legacy conversion
    #[error("line {line}: legacy syntax '{text}'")]
    LegacySyntax {
        /// 1-based line number
        line: usize,
        /// Offending line
        text: String,
    },
    /// Nothing to parse
    #[error("input is empty")]
    Empty,
}

struct OpenBlock {
    key: String,
    line: usize,
    tree: Settings,
}

/// Parses ADF input text into a settings tree.
pub fn parse(text: &str) -> Result<Settings, InputParseError> {
    let mut root = Settings::new();
    let mut stack: Vec<OpenBlock> = Vec::new();
    let mut seen_content = false;

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = COMMENT_RE.replace(raw, "");
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        seen_content = true;

        if END_INPUT_RE.is_match(line) || line.eq_ignore_ascii_case("subend") {
            return Err(InputParseError::LegacySyntax {
                line: line_no,
                text: line.to_string(),
            });
        }

        if line.eq_ignore_ascii_case("end") {
            let block = stack
                .pop()
                .ok_or(InputParseError::UnbalancedEnd { line: line_no })?;
            let parent = stack.last_mut().map_or(&mut root, |b| &mut b.tree);
            parent.push_repeated(&block.key, Value::Tree(block.tree));
            continue;
        }

        let (key, rest) = split_key(line);
        if opens_block(key, rest, stack.is_empty()) {
            let header = rest.trim_end_matches('&').trim();
            let mut tree = Settings::new();
            if !header.is_empty() {
                tree.set_header(Some(Scalar::Str(header.to_string())));
            }
            stack.push(OpenBlock {
                key: key.to_string(),
                line: line_no,
                tree,
            });
            continue;
        }

        let parent = stack.last_mut().map_or(&mut root, |b| &mut b.tree);
        parent.push_repeated(key, parse_value(rest));
    }

    if let Some(block) = stack.pop() {
        return Err(InputParseError::UnterminatedBlock {
            key: block.key,
            line: block.line,
        });
    }
    if !seen_content {
        return Err(InputParseError::Empty);
    }
    Ok(root)
}

fn split_key(line: &str) -> (&str, &str) {
    match line.split_once(char::is_whitespace) {
        Some((key, rest)) => (key, rest.trim()),
        None => (line, ""),
    }
}

fn opens_block(key: &str, rest: &str, top_level: bool) -> bool {
    if rest.ends_with('&') || key.ends_with('&') {
        return true;
    }
    top_level && BLOCK_KEYS.iter().any(|b| b.eq_ignore_ascii_case(key))
}

fn parse_value(rest: &str) -> Value {
    if rest.is_empty() {
        Value::Scalar(Scalar::Str(String::new()))
    } else if INT_RE.is_match(rest) {
        rest.parse::<i64>()
            .map(|i| Value::Scalar(Scalar::Int(i)))
            .unwrap_or_else(|_| Value::from(rest))
    } else if FLOAT_RE.is_match(rest) {
        rest.replace(['d', 'D'], "e")
            .parse::<f64>()
            .map(|x| Value::Scalar(Scalar::Float(x)))
            .unwrap_or_else(|_| Value::from(rest))
    } else {
        Value::from(rest)
    }
}

/// Rewrites legacy constructs: drops everything from `End Input` on and
/// turns `SubEnd` into `End`.
pub fn convert_legacy_input(text: &str) -> String {
    let mut out = Vec::new();
    for raw in text.lines() {
        let stripped = COMMENT_RE.replace(raw, "");
        let trimmed = stripped.trim();
        if END_INPUT_RE.is_match(trimmed) {
            break;
        }
        if trimmed.eq_ignore_ascii_case("subend") {
            let indent = &raw[..raw.len() - raw.trim_start().len()];
            out.push(format!("{}End", indent));
        } else {
            out.push(raw.to_string());
        }
    }
    out.join("\n")
}

/// Ways of turning stored input text into settings, tried in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Parse the text as is
    Direct,
    /// Parse after [`convert_legacy_input`]
    LegacyConverted,
}

impl Recovery {
    /// Order in which [`recover`] tries the strategies.
    pub const ORDER: [Recovery; 2] = [Recovery::Direct, Recovery::LegacyConverted];

    /// Runs this strategy on the raw `user input` text.
    pub fn apply(self, text: &str) -> Result<Settings, InputParseError> {
        match self {
            Recovery::Direct => parse(text),
            Recovery::LegacyConverted => parse(&convert_legacy_input(text)),
        }
    }
}

/// Returns the result of the first strategy that succeeds, or every
/// strategy's error if none does.
pub fn recover(text: &str) -> Result<Settings, Vec<(Recovery, InputParseError)>> {
    let mut failures = Vec::new();
    for strategy in Recovery::ORDER {
        match strategy.apply(text) {
            Ok(settings) => {
                debug!("Recovered input settings with {:?} strategy", strategy);
                return Ok(settings);
            }
            Err(e) => {
                debug!("{:?} strategy failed: {}", strategy, e);
                failures.push((strategy, e));
            }
        }
    }
    Err(failures)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODERN: &str = "\
Title water single point

Atoms
    1 O 0.0 0.0 0.0
    2 H 0.757 0.586 0.0
End

Basis
  Type DZP   # double zeta
  Core None
End

XC
  GGA PBE
End

Symmetry NOSYM
NumericalQuality Good
Charge 0 1
SCF
  Iterations 300
  Converge 1.0e-6
End
";

    #[test]
    fn test_parse_modern_input() {
        let s = parse(MODERN).unwrap();
        let keys: Vec<&str> = s.keys().collect();
        assert_eq!(
            keys,
            vec!["Title", "Atoms", "Basis", "XC", "Symmetry", "NumericalQuality", "Charge", "SCF"]
        );
        assert_eq!(s.get_path("Basis.Type").unwrap().as_str(), Some("DZP"));
        assert_eq!(s.get_path("SCF.Iterations"), Some(&Value::from(300)));
        assert_eq!(s.get_path("SCF.Converge"), Some(&Value::from(1.0e-6)));
        assert_eq!(s.get("Charge").unwrap().as_str(), Some("0 1"));
        assert_eq!(s.get("Title").unwrap().as_str(), Some("water single point"));
    }

    #[test]
    fn test_block_header_and_ampersand() {
        let s = parse("Atoms Cartesian\n C 0 0 0\nEnd\nFragments &\n w water.t21\nEnd\n").unwrap();
        let atoms = s.get("Atoms").unwrap().as_tree().unwrap();
        assert_eq!(atoms.header(), Some(&Scalar::Str("Cartesian".to_string())));
        assert!(s.get_path("Fragments.w").is_some());
    }

    #[test]
    fn test_repeated_keys_become_list() {
        let s = parse("Atoms\n H 0 0 0\n H 0 0 1\nEnd\n").unwrap();
        match s.get_path("Atoms.H").unwrap() {
            Value::List(items) => assert_eq!(items.len(), 2),
            other => panic!("expected list, got {:?}", other),
        }
    }

    #[test]
    fn test_fortran_exponent() {
        let s = parse("SCF\n Converge 1.0d-8\nEnd\n").unwrap();
        assert_eq!(s.get_path("SCF.Converge"), Some(&Value::from(1.0e-8)));
    }

    #[test]
    fn test_structural_errors() {
        assert_eq!(
            parse("XC\n GGA PBE\n"),
            Err(InputParseError::UnterminatedBlock {
                key: "XC".to_string(),
                line: 1
            })
        );
        assert_eq!(
            parse("Symmetry NOSYM\nEnd\n"),
            Err(InputParseError::UnbalancedEnd { line: 2 })
        );
        assert_eq!(parse("  \n# only a comment\n"), Err(InputParseError::Empty));
    }

    #[test]
    fn test_legacy_input_needs_conversion() {
        let legacy = "XC\n GGA PBE\nSubEnd\nEnd Input\nleftover junk\nEnd\n";
        assert!(matches!(
            parse(legacy),
            Err(InputParseError::LegacySyntax { line: 3, .. })
        ));
        let converted = convert_legacy_input(legacy);
        assert_eq!(converted, "XC\n GGA PBE\nEnd");
        assert!(parse(&converted).is_ok());
    }

    #[test]
    fn test_recover_falls_back_in_order() {
        assert!(recover(MODERN).is_ok());
        assert!(recover("XC\n GGA PBE\nSubEnd\nEnd Input\n").is_ok());

        let failures = recover("End\n").unwrap_err();
        let tried: Vec<Recovery> = failures.iter().map(|(r, _)| *r).collect();
        assert_eq!(tried, Recovery::ORDER.to_vec());
    }
}
