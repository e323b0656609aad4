//! Section/variable access to ADF KF result files.
//!
//! KF files are binary key/value stores organised as `section%variable`
//! entries. Decoding the binary layout is left to external tooling; this
//! module defines the [`KfStore`] interface that result readers consume and
//! [`KfFile`], an in-memory store loaded from a JSON dump of the form
//!
//! ```text
//! {
//!   "Energy":   { "Bond Energy": -0.5234 },
//!   "Geometry": { "nr of atoms": 3, "atomtype": "O H", "xyz InputOrder": [ ... ] }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised by KF stores.
#[derive(Error, Debug)]
pub enum KfError {
    /// File system error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Malformed dump
    #[error("Failed to decode KF dump {path}: {source}")]
    Decode {
        /// Dump location
        path: PathBuf,
        /// Underlying JSON error
        source: serde_json::Error,
    },
    /// The requested variable does not exist
    #[error("'{section}%{variable}' not present in {path}")]
    Missing {
        /// Section name
        section: String,
        /// Variable name
        variable: String,
        /// File the lookup was made in
        path: PathBuf,
    },
    /// The variable exists but has an unexpected type
    #[error("'{section}%{variable}' in {path} is not {expected}")]
    WrongType {
        /// Section name
        section: String,
        /// Variable name
        variable: String,
        /// File the lookup was made in
        path: PathBuf,
        /// Description of the expected type
        expected: &'static str,
    },
}

/// A value stored in a KF variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KfValue {
    /// Integer scalar
    Int(i64),
    /// Real scalar
    Float(f64),
    /// Logical scalar
    Bool(bool),
    /// Character data
    Str(String),
    /// Integer array
    IntArray(Vec<i64>),
    /// Real array
    FloatArray(Vec<f64>),
}

impl KfValue {
    /// Integer scalar view; one-element arrays are unwrapped.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            KfValue::Int(i) => Some(*i),
            KfValue::IntArray(v) if v.len() == 1 => Some(v[0]),
            _ => None,
        }
    }

    /// Numeric scalar view; integers are widened.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            KfValue::Int(i) => Some(*i as f64),
            KfValue::Float(x) => Some(*x),
            KfValue::IntArray(v) if v.len() == 1 => Some(v[0] as f64),
            KfValue::FloatArray(v) if v.len() == 1 => Some(v[0]),
            _ => None,
        }
    }

    /// Character data, if stored as a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            KfValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Integer array view.
    pub fn as_i64_vec(&self) -> Option<Vec<i64>> {
        match self {
            KfValue::Int(i) => Some(vec![*i]),
            KfValue::IntArray(v) => Some(v.clone()),
            _ => None,
        }
    }

    /// Numeric array view; scalars become one-element vectors.
    pub fn as_f64_vec(&self) -> Option<Vec<f64>> {
        match self {
            KfValue::Int(i) => Some(vec![*i as f64]),
            KfValue::Float(x) => Some(vec![*x]),
            KfValue::IntArray(v) => Some(v.iter().map(|&i| i as f64).collect()),
            KfValue::FloatArray(v) => Some(v.clone()),
            _ => None,
        }
    }
}

/// Read-only section/variable store.
pub trait KfStore {
    /// Location of the underlying file, used in error messages.
    fn path(&self) -> &Path;

    /// Reads `section%variable`.
    fn read(&self, section: &str, variable: &str) -> Result<&KfValue, KfError>;

    /// Lists all `(section, variable)` pairs.
    fn entries(&self) -> Vec<(&str, &str)>;

    /// `true` if `section%variable` exists.
    fn contains(&self, section: &str, variable: &str) -> bool {
        self.read(section, variable).is_ok()
    }

    /// Reads a number, widening integers.
    fn read_f64(&self, section: &str, variable: &str) -> Result<f64, KfError> {
        self.read(section, variable)?
            .as_f64()
            .ok_or_else(|| self.wrong_type(section, variable, "a number"))
    }

    /// Reads an integer.
    fn read_i64(&self, section: &str, variable: &str) -> Result<i64, KfError> {
        self.read(section, variable)?
            .as_i64()
            .ok_or_else(|| self.wrong_type(section, variable, "an integer"))
    }

    /// Reads character data.
    fn read_str(&self, section: &str, variable: &str) -> Result<&str, KfError> {
        self.read(section, variable)?
            .as_str()
            .ok_or_else(|| self.wrong_type(section, variable, "a string"))
    }

    /// Reads a numeric array.
    fn read_f64_vec(&self, section: &str, variable: &str) -> Result<Vec<f64>, KfError> {
        self.read(section, variable)?
            .as_f64_vec()
            .ok_or_else(|| self.wrong_type(section, variable, "a numeric array"))
    }

    /// Reads an integer array.
    fn read_i64_vec(&self, section: &str, variable: &str) -> Result<Vec<i64>, KfError> {
        self.read(section, variable)?
            .as_i64_vec()
            .ok_or_else(|| self.wrong_type(section, variable, "an integer array"))
    }

    /// Error for a variable holding an unexpected type.
    #[doc(hidden)]
    fn wrong_type(&self, section: &str, variable: &str, expected: &'static str) -> KfError {
        KfError::WrongType {
            section: section.to_string(),
            variable: variable.to_string(),
            path: self.path().to_path_buf(),
            expected,
        }
    }
}

/// In-memory KF store.
#[derive(Debug, Clone, Default)]
pub struct KfFile {
    path: PathBuf,
    sections: BTreeMap<String, BTreeMap<String, KfValue>>,
}

impl KfFile {
    /// Creates an empty store labelled with `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            sections: BTreeMap::new(),
        }
    }

    /// Loads a JSON dump.
    pub fn open(path: &Path) -> Result<Self, KfError> {
        let text = fs::read_to_string(path)?;
        let sections = serde_json::from_str(&text).map_err(|source| KfError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("Loaded KF dump {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            sections,
        })
    }

    /// Stores `section%variable`, replacing any previous value.
    pub fn insert(&mut self, section: &str, variable: &str, value: KfValue) -> &mut Self {
        self.sections
            .entry(section.to_string())
            .or_default()
            .insert(variable.to_string(), value);
        self
    }
}

impl KfStore for KfFile {
    fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self, section: &str, variable: &str) -> Result<&KfValue, KfError> {
        self.sections
            .get(section)
            .and_then(|vars| vars.get(variable))
            .ok_or_else(|| KfError::Missing {
                section: section.to_string(),
                variable: variable.to_string(),
                path: self.path.clone(),
            })
    }

    fn entries(&self) -> Vec<(&str, &str)> {
        self.sections
            .iter()
            .flat_map(|(s, vars)| vars.keys().map(move |v| (s.as_str(), v.as_str())))
            .collect()
    }
}
