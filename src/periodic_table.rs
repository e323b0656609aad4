//! Element symbol and atomic number lookups.

const SYMBOLS: [&str; 118] = [
    "H", "He", "Li", "Be", "B", "C", "N", "O", "F", "Ne", // 1-10
    "Na", "Mg", "Al", "Si", "P", "S", "Cl", "Ar", "K", "Ca", // 11-20
    "Sc", "Ti", "V", "Cr", "Mn", "Fe", "Co", "Ni", "Cu", "Zn", // 21-30
    "Ga", "Ge", "As", "Se", "Br", "Kr", "Rb", "Sr", "Y", "Zr", // 31-40
    "Nb", "Mo", "Tc", "Ru", "Rh", "Pd", "Ag", "Cd", "In", "Sn", // 41-50
    "Sb", "Te", "I", "Xe", "Cs", "Ba", "La", "Ce", "Pr", "Nd", // 51-60
    "Pm", "Sm", "Eu", "Gd", "Tb", "Dy", "Ho", "Er", "Tm", "Yb", // 61-70
    "Lu", "Hf", "Ta", "W", "Re", "Os", "Ir", "Pt", "Au", "Hg", // 71-80
    "Tl", "Pb", "Bi", "Po", "At", "Rn", "Fr", "Ra", "Ac", "Th", // 81-90
    "Pa", "U", "Np", "Pu", "Am", "Cm", "Bk", "Cf", "Es", "Fm", // 91-100
    "Md", "No", "Lr", "Rf", "Db", "Sg", "Bh", "Hs", "Mt", "Ds", // 101-110
    "Rg", "Cn", "Nh", "Fl", "Mc", "Lv", "Ts", "Og", // 111-118
];

/// Returns the element symbol for an atomic number, or `"X"` if unknown.
pub fn atomic_number_to_symbol(num: usize) -> &'static str {
    num.checked_sub(1)
        .and_then(|i| SYMBOLS.get(i))
        .copied()
        .unwrap_or("X")
}

/// Returns the atomic number for an element symbol.
///
/// Matching ignores case, so ADF atom type labels such as `"CL"` resolve.
/// Atom type labels carrying a suffix (`"C.1"`, `"H_a"`) are resolved by
/// their leading element symbol.
pub fn symbol_to_atomic_number(symbol: &str) -> Option<usize> {
    let element: String = symbol
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    SYMBOLS
        .iter()
        .position(|s| s.eq_ignore_ascii_case(&element))
        .map(|i| i + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_lookup() {
        assert_eq!(atomic_number_to_symbol(1), "H");
        assert_eq!(atomic_number_to_symbol(26), "Fe");
        assert_eq!(atomic_number_to_symbol(118), "Og");
        assert_eq!(atomic_number_to_symbol(0), "X");
        assert_eq!(atomic_number_to_symbol(119), "X");
    }

    #[test]
    fn test_atomic_number_lookup() {
        assert_eq!(symbol_to_atomic_number("C"), Some(6));
        assert_eq!(symbol_to_atomic_number("cl"), Some(17));
        assert_eq!(symbol_to_atomic_number("H.1"), Some(1));
        assert_eq!(symbol_to_atomic_number("Xx"), None);
    }
}
