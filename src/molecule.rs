//! Molecules, atoms and their free-form property bags.
//!
//! Coordinates are stored in angstrom. Properties are kept as JSON values so
//! that program-specific tags (ADF `fragment`/`block`, ORCA `charge` and
//! `multiplicity`) can be attached without a fixed schema.
//!
//! ```
//! use qmadapt::molecule::{Atom, Molecule};
//!
//! let mut mol = Molecule::new();
//! mol.add_atom(Atom::new("O", [0.0, 0.0, 0.0]));
//! mol.add_atom(Atom::new("H", [0.757, 0.586, 0.0]));
//! mol.set_property("charge", 0);
//! assert_eq!(mol.num_atoms(), 2);
//! assert_eq!(mol.int_property("charge"), Some(0));
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Free-form property bag.
pub type Properties = BTreeMap<String, serde_json::Value>;

/// A single atom.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Atom {
    /// Element symbol
    pub symbol: String,
    /// Cartesian coordinates in angstrom
    pub coords: [f64; 3],
    /// Per-atom properties
    #[serde(default)]
    pub properties: Properties,
}

impl Atom {
    /// Atom without properties.
    pub fn new(symbol: &str, coords: [f64; 3]) -> Self {
        Self {
            symbol: symbol.to_string(),
            coords,
            properties: Properties::new(),
        }
    }

    /// Formats the atom as `symbol x y z`.
    ///
    /// The symbol is right-aligned in a 5 character field and every coordinate
    /// occupies `space` characters with `decimal` digits after the point.
    pub fn format(&self, space: usize, decimal: usize) -> String {
        let mut line = format!("{:>5}", self.symbol);
        for c in self.coords {
            line.push_str(&format!("{:>width$.prec$}", c, width = space, prec = decimal));
        }
        line
    }

    /// Looks up `properties[group][key]`, e.g. `adf.fragment`.
    pub fn group_property(&self, group: &str, key: &str) -> Option<&serde_json::Value> {
        self.properties.get(group)?.get(key)
    }
}

/// An ordered collection of atoms plus molecule-level properties.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Molecule {
    /// Atoms in input order
    pub atoms: Vec<Atom>,
    /// Molecule-level properties such as `charge`
    #[serde(default)]
    pub properties: Properties,
}

impl Molecule {
    /// Empty molecule.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a molecule from parallel symbol and coordinate lists.
    pub fn from_parts(symbols: &[String], coords: &[[f64; 3]]) -> Self {
        let atoms = symbols
            .iter()
            .zip(coords)
            .map(|(s, c)| Atom::new(s, *c))
            .collect();
        Self {
            atoms,
            properties: Properties::new(),
        }
    }

    /// Appends an atom.
    pub fn add_atom(&mut self, atom: Atom) {
        self.atoms.push(atom);
    }

    /// Number of atoms.
    pub fn num_atoms(&self) -> usize {
        self.atoms.len()
    }

    /// `true` when there are no atoms.
    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    /// Sets a molecule-level property.
    pub fn set_property(&mut self, key: &str, value: impl Into<serde_json::Value>) {
        self.properties.insert(key.to_string(), value.into());
    }

    /// Returns a molecule property only if it holds an integer.
    pub fn int_property(&self, key: &str) -> Option<i64> {
        self.properties.get(key).and_then(serde_json::Value::as_i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atom_format_width_and_precision() {
        let atom = Atom::new("C", [0.0, -1.25, 10.123456]);
        assert_eq!(atom.format(11, 5), "    C    0.00000   -1.25000   10.12346");
    }

    #[test]
    fn test_int_property_rejects_non_integers() {
        let mut mol = Molecule::new();
        mol.set_property("charge", 1.5);
        mol.set_property("multiplicity", "triplet");
        assert_eq!(mol.int_property("charge"), None);
        assert_eq!(mol.int_property("multiplicity"), None);
        mol.set_property("charge", -1);
        assert_eq!(mol.int_property("charge"), Some(-1));
    }

    #[test]
    fn test_group_property() {
        let mut atom = Atom::new("O", [0.0; 3]);
        atom.properties
            .insert("adf".to_string(), serde_json::json!({"fragment": "water"}));
        assert_eq!(
            atom.group_property("adf", "fragment"),
            Some(&serde_json::json!("water"))
        );
        assert_eq!(atom.group_property("adf", "block"), None);
    }
}
