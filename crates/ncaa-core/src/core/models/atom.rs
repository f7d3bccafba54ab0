use nalgebra::Point3;

/// Represents an atom of a residue structure with its identity, charges, and force field type.
///
/// Atoms are owned by a [`MolecularStructure`](super::structure::MolecularStructure), which
/// also records their order and the bonds between them.
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    /// The name of the atom (e.g., "CA", "N", "HB2").
    pub name: String,
    /// The chemical element symbol, canonically capitalized (e.g., "C", "Cl").
    pub element: String,
    /// The name of the residue this atom belongs to (e.g., "ALA", "ACE").
    pub residue_name: String,
    /// The integer formal charge of the atom.
    pub formal_charge: i32,
    /// The partial atomic charge in elementary charge units.
    pub partial_charge: f64,
    /// The 3D coordinates of the atom in Angstroms.
    pub position: Point3<f64>,
    /// The force field atom type (e.g., "c3", "CT"). Empty when unassigned.
    pub atom_type: String,
}

impl Atom {
    /// Creates a new `Atom` with zero charges and no atom type.
    ///
    /// # Arguments
    ///
    /// * `name` - The name of the atom.
    /// * `element` - The element symbol.
    /// * `residue_name` - The name of the parent residue.
    /// * `position` - The 3D coordinates of the atom.
    pub fn new(name: &str, element: &str, residue_name: &str, position: Point3<f64>) -> Self {
        Self {
            name: name.to_string(),
            element: element.to_string(),
            residue_name: residue_name.to_string(),
            formal_charge: 0,
            partial_charge: 0.0,
            position,
            atom_type: String::new(),
        }
    }

    /// Returns `true` if the atom is a hydrogen.
    pub fn is_hydrogen(&self) -> bool {
        self.element == "H"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_atom_has_expected_default_fields() {
        let atom = Atom::new("CA", "C", "ALA", Point3::new(1.0, 2.0, 3.0));

        assert_eq!(atom.name, "CA");
        assert_eq!(atom.element, "C");
        assert_eq!(atom.residue_name, "ALA");
        assert_eq!(atom.position, Point3::new(1.0, 2.0, 3.0));
        assert_eq!(atom.formal_charge, 0);
        assert_eq!(atom.partial_charge, 0.0);
        assert_eq!(atom.atom_type, "");
    }

    #[test]
    fn is_hydrogen_checks_element_not_name() {
        let h = Atom::new("HA", "H", "ALA", Point3::origin());
        let hg = Atom::new("HG", "Hg", "HGX", Point3::origin());
        assert!(h.is_hydrogen());
        assert!(!hg.is_hydrogen());
    }

    #[test]
    fn atom_equality_and_clone_works() {
        let mut atom1 = Atom::new("N", "N", "GLY", Point3::origin());
        atom1.formal_charge = 1;
        atom1.atom_type = "n4".to_string();
        let atom2 = atom1.clone();
        assert_eq!(atom1, atom2);
    }
}
