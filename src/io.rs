//! File I/O utilities for molecular geometries.
//!
//! Provides reading and writing of XYZ files, used for ORCA's final geometry
//! (`<jobname>.xyz`) and for loading molecules on the command line.

use crate::molecule::{Atom, Molecule};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Errors raised while reading geometry files.
#[derive(Error, Debug)]
pub enum IoError {
    /// File system error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Malformed file contents
    #[error("Parse error: {0}")]
    Parse(String),
}

type Result<T> = std::result::Result<T, IoError>;

/// Writes a molecule to an XYZ file.
///
/// The XYZ format consists of:
/// 1. Number of atoms
/// 2. A comment line (empty in this implementation)
/// 3. Lines for each atom: Element X Y Z (angstrom)
///
/// # Examples
///
/// ```
/// use qmadapt::io;
/// use qmadapt::molecule::{Atom, Molecule};
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let dir = std::env::temp_dir().join("qmadapt_doc_write_xyz.xyz");
///     let mut mol = Molecule::new();
///     mol.add_atom(Atom::new("H", [0.0, 0.0, 0.0]));
///     mol.add_atom(Atom::new("H", [0.74, 0.0, 0.0]));
///     io::write_xyz(&mol, &dir)?;
///     let back = io::read_xyz(&dir)?;
///     assert_eq!(back.num_atoms(), 2);
///     std::fs::remove_file(&dir)?;
///     Ok(())
/// }
/// ```
pub fn write_xyz(mol: &Molecule, path: &Path) -> Result<()> {
    fs::write(path, format_xyz(mol))?;
    Ok(())
}

/// Formats a molecule as XYZ text.
pub fn format_xyz(mol: &Molecule) -> String {
    let mut content = format!("{}\n\n", mol.num_atoms());
    for atom in &mol.atoms {
        content.push_str(&format!(
            "{}  {:.8}  {:.8}  {:.8}\n",
            atom.symbol, atom.coords[0], atom.coords[1], atom.coords[2]
        ));
    }
    content
}

/// Reads an XYZ file.
pub fn read_xyz(path: &Path) -> Result<Molecule> {
    let content = fs::read_to_string(path)?;
    parse_xyz(&content)
}

/// Parses XYZ text.
///
/// The atom count and comment lines are skipped; every line starting with a
/// letter and carrying at least three further fields is read as an atom.
/// When the file holds several frames only the first is returned.
pub fn parse_xyz(content: &str) -> Result<Molecule> {
    let mut lines = content.lines().peekable();
    let mut expected = None;

    // Optional header: atom count followed by a comment line
    if let Some(first) = lines.peek() {
        if let Ok(n) = first.trim().parse::<usize>() {
            expected = Some(n);
            lines.next();
            lines.next();
        }
    }

    let mut mol = Molecule::new();
    for line in lines {
        let line = line.trim();
        if expected.is_some_and(|n| mol.num_atoms() == n) {
            break;
        }
        if line.is_empty() || !line.chars().next().is_some_and(|c| c.is_alphabetic()) {
            continue;
        }
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 4 {
            continue;
        }
        let mut coords = [0.0; 3];
        for (slot, field) in coords.iter_mut().zip(&parts[1..4]) {
            *slot = field
                .parse()
                .map_err(|_| IoError::Parse(format!("Invalid coordinate in XYZ line: {}", line)))?;
        }
        mol.add_atom(Atom::new(parts[0], coords));
    }

    if let Some(n) = expected {
        if mol.num_atoms() != n {
            return Err(IoError::Parse(format!(
                "XYZ header announces {} atoms, found {}",
                n,
                mol.num_atoms()
            )));
        }
    }
    Ok(mol)
}
