use phf::{Map, phf_map};

#[rustfmt::skip]
static ELEMENT_SYMBOLS: Map<&'static str, &'static str> = phf_map! {
    "H" => "H", "D" => "H", "HE" => "He",
    "LI" => "Li", "BE" => "Be", "B" => "B", "C" => "C", "N" => "N", "O" => "O", "F" => "F", "NE" => "Ne",
    "NA" => "Na", "MG" => "Mg", "AL" => "Al", "SI" => "Si", "P" => "P", "S" => "S", "CL" => "Cl", "AR" => "Ar",
    "K" => "K", "CA" => "Ca", "MN" => "Mn", "FE" => "Fe", "CO" => "Co", "NI" => "Ni", "CU" => "Cu", "ZN" => "Zn",
    "GA" => "Ga", "GE" => "Ge", "AS" => "As", "SE" => "Se", "BR" => "Br", "KR" => "Kr",
    "RB" => "Rb", "SR" => "Sr", "MO" => "Mo", "AG" => "Ag", "CD" => "Cd", "SN" => "Sn", "TE" => "Te", "I" => "I", "XE" => "Xe",
    "CS" => "Cs", "BA" => "Ba", "PT" => "Pt", "AU" => "Au", "HG" => "Hg", "PB" => "Pb",
};

/// Returns the canonical capitalization of an element symbol, or `None` if it is not recognized.
pub fn canonical_element(raw: &str) -> Option<&'static str> {
    let key = raw.trim().to_ascii_uppercase();
    ELEMENT_SYMBOLS.get(key.as_str()).copied()
}

/// Guesses an element from an atom name by its leading letters (e.g. "CA" -> "C", "HB2" -> "H").
///
/// Single-letter elements win over two-letter ones, matching the usual biomolecular naming
/// where "CA" is an alpha carbon and not calcium.
pub fn guess_element_from_name(name: &str) -> Option<&'static str> {
    let letters: String = name
        .trim()
        .chars()
        .skip_while(|c| c.is_ascii_digit())
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    let first = letters.get(0..1)?;
    canonical_element(first).or_else(|| letters.get(0..2).and_then(canonical_element))
}
