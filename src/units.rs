//! Unit conversion for energies, lengths, frequencies and dipole moments.
//!
//! Each physical quantity has a table of units expressed as "how many of this
//! unit make up one base unit". The base units are hartree (energy), angstrom
//! (length), debye-free atomic units (dipole) and cm^-1 (frequency).
//!
//! A conversion between two unit names succeeds when both appear in the same
//! table. Tables are searched in declaration order, so the ambiguous name
//! `"au"` resolves to hartree when paired with an energy unit and to bohr when
//! paired with a length unit.
//!
//! ```
//! use qmadapt::units::Units;
//!
//! let ev = Units::convert(1.0, "au", "eV").unwrap();
//! assert!((ev - 27.211386245988).abs() < 1e-9);
//! ```

use thiserror::Error;

/// Bohr radius in angstrom (CODATA 2018)
pub const BOHR_TO_ANGSTROM: f64 = 0.529177210903;
/// Inverse of [`BOHR_TO_ANGSTROM`]
pub const ANGSTROM_TO_BOHR: f64 = 1.0 / BOHR_TO_ANGSTROM;

const HARTREE_TO_EV: f64 = 27.211386245988;
const HARTREE_TO_KCALMOL: f64 = 627.509474063;
const HARTREE_TO_KJMOL: f64 = 2625.4996394799;
const HARTREE_TO_CM1: f64 = 219474.6313632;
const HARTREE_TO_KELVIN: f64 = 315775.02480407;
const AU_TO_DEBYE: f64 = 2.541746473;
const AU_TO_COULOMB_METRE: f64 = 8.478353552e-30;
const CM1_TO_HZ: f64 = 2.99792458e10;

/// Error type for unit conversion.
#[derive(Error, Debug, PartialEq)]
pub enum UnitsError {
    /// No quantity table contains both unit names
    #[error("cannot convert from '{from}' to '{to}'")]
    Incompatible {
        /// Source unit
        from: String,
        /// Target unit
        to: String,
    },
}

struct Quantity {
    name: &'static str,
    units: &'static [(&'static str, f64)],
}

const ENERGY: Quantity = Quantity {
    name: "energy",
    units: &[
        ("au", 1.0),
        ("a.u.", 1.0),
        ("hartree", 1.0),
        ("Hartree", 1.0),
        ("Ha", 1.0),
        ("eV", HARTREE_TO_EV),
        ("kcal/mol", HARTREE_TO_KCALMOL),
        ("kJ/mol", HARTREE_TO_KJMOL),
        ("cm^-1", HARTREE_TO_CM1),
        ("cm-1", HARTREE_TO_CM1),
        ("K", HARTREE_TO_KELVIN),
    ],
};

const LENGTH: Quantity = Quantity {
    name: "length",
    units: &[
        ("angstrom", 1.0),
        ("Angstrom", 1.0),
        ("A", 1.0),
        ("bohr", ANGSTROM_TO_BOHR),
        ("Bohr", ANGSTROM_TO_BOHR),
        ("a0", ANGSTROM_TO_BOHR),
        ("au", ANGSTROM_TO_BOHR),
        ("a.u.", ANGSTROM_TO_BOHR),
        ("nm", 0.1),
        ("pm", 100.0),
    ],
};

const DIPOLE: Quantity = Quantity {
    name: "dipole",
    units: &[
        ("au", 1.0),
        ("a.u.", 1.0),
        ("e*bohr", 1.0),
        ("Debye", AU_TO_DEBYE),
        ("D", AU_TO_DEBYE),
        ("C*m", AU_TO_COULOMB_METRE),
    ],
};

const FREQUENCY: Quantity = Quantity {
    name: "frequency",
    units: &[
        ("cm^-1", 1.0),
        ("cm-1", 1.0),
        ("Hz", CM1_TO_HZ),
        ("MHz", CM1_TO_HZ * 1e-6),
        ("GHz", CM1_TO_HZ * 1e-9),
        ("THz", CM1_TO_HZ * 1e-12),
    ],
};

const QUANTITIES: [&Quantity; 4] = [&ENERGY, &LENGTH, &DIPOLE, &FREQUENCY];

impl Quantity {
    fn factor(&self, unit: &str) -> Option<f64> {
        self.units
            .iter()
            .find(|(name, _)| *name == unit)
            .map(|(_, f)| *f)
    }
}

/// Namespace for unit conversions.
pub struct Units;

impl Units {
    /// Returns the factor that converts a value in `from` into `to`.
    pub fn conversion_ratio(from: &str, to: &str) -> Result<f64, UnitsError> {
        for quantity in QUANTITIES {
            if let (Some(f), Some(t)) = (quantity.factor(from), quantity.factor(to)) {
                log::trace!("converting {} -> {} as {}", from, to, quantity.name);
                return Ok(t / f);
            }
        }
        Err(UnitsError::Incompatible {
            from: from.to_string(),
            to: to.to_string(),
        })
    }

    /// Converts a single value.
    pub fn convert(value: f64, from: &str, to: &str) -> Result<f64, UnitsError> {
        Ok(value * Self::conversion_ratio(from, to)?)
    }

    /// Converts every element of a slice.
    pub fn convert_all(values: &[f64], from: &str, to: &str) -> Result<Vec<f64>, UnitsError> {
        let ratio = Self::conversion_ratio(from, to)?;
        Ok(values.iter().map(|v| v * ratio).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity() {
        assert_eq!(Units::conversion_ratio("au", "au").unwrap(), 1.0);
        assert_eq!(Units::conversion_ratio("bohr", "bohr").unwrap(), 1.0);
    }

    #[test]
    fn test_energy_conversions() {
        let kcal = Units::convert(1.0, "au", "kcal/mol").unwrap();
        assert!((kcal - 627.509474063).abs() < 1e-6);
        let back = Units::convert(kcal, "kcal/mol", "hartree").unwrap();
        assert!((back - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_length_conversions() {
        let a = Units::convert(1.0, "bohr", "angstrom").unwrap();
        assert!((a - BOHR_TO_ANGSTROM).abs() < 1e-12);
        let pm = Units::convert(1.0, "angstrom", "pm").unwrap();
        assert!((pm - 100.0).abs() < 1e-12);
    }

    #[test]
    fn test_au_resolves_by_partner() {
        assert!((Units::conversion_ratio("au", "eV").unwrap() - HARTREE_TO_EV).abs() < 1e-9);
        assert!(
            (Units::conversion_ratio("au", "angstrom").unwrap() - BOHR_TO_ANGSTROM).abs() < 1e-12
        );
        assert!((Units::conversion_ratio("au", "Debye").unwrap() - AU_TO_DEBYE).abs() < 1e-12);
    }

    #[test]
    fn test_frequency_in_energy_units() {
        let ev = Units::convert(8065.54, "cm^-1", "eV").unwrap();
        assert!((ev - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_incompatible_units() {
        assert_eq!(
            Units::conversion_ratio("eV", "angstrom"),
            Err(UnitsError::Incompatible {
                from: "eV".to_string(),
                to: "angstrom".to_string()
            })
        );
    }
}
