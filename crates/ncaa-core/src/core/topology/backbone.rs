/// Canonical backbone atom names and the atom types they are forced to, in the order
/// the renaming pass applies them.
pub const BACKBONE_ATOM_TYPES: [(&str, &str); 6] = [
    ("N", "N"),
    ("H", "H"),
    ("CA", "CT"),
    ("HA", "H1"),
    ("C", "C"),
    ("O", "O"),
];

/// Rotatable dihedrals across the cap/residue peptide bonds. Their parameters come from the
/// standard backbone, so they are never refitted.
pub const PURE_BACKBONE_DIHEDRALS: [&str; 2] = ["CH3-C-N-CA", "CA-C-N-CH3"];

/// Returns the canonical atom type for a backbone atom name.
pub fn backbone_type_for(atom_name: &str) -> Option<&'static str> {
    BACKBONE_ATOM_TYPES
        .iter()
        .find(|(name, _)| *name == atom_name)
        .map(|(_, atom_type)| *atom_type)
}

/// The canonical backbone atom types, in table order.
pub fn backbone_atom_types() -> Vec<String> {
    BACKBONE_ATOM_TYPES
        .iter()
        .map(|(_, atom_type)| atom_type.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backbone_type_lookup_returns_canonical_types() {
        assert_eq!(backbone_type_for("CA"), Some("CT"));
        assert_eq!(backbone_type_for("HA"), Some("H1"));
        assert_eq!(backbone_type_for("N"), Some("N"));
        assert_eq!(backbone_type_for("CB"), None);
        assert_eq!(backbone_type_for("ca"), None);
    }

    #[test]
    fn backbone_atom_types_keep_table_order() {
        assert_eq!(backbone_atom_types(), vec!["N", "H", "CT", "H1", "C", "O"]);
    }
}
