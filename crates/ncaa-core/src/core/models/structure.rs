use super::atom::Atom;
use super::ids::AtomId;
use super::topology::{Bond, BondOrder};
use slotmap::{SecondaryMap, SlotMap};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StructureError {
    #[error("Mask length {found} does not match atom count {expected}")]
    MaskLength { expected: usize, found: usize },
}

/// An ordered collection of atoms and the bonds between them.
///
/// Atoms are stored in a slot map so that identifiers stay valid across insertions and
/// removals, while `order` records the positional sequence used by file formats and by
/// index-based algorithms such as graph matching. Cloning produces a fully independent copy.
#[derive(Debug, Clone, Default)]
pub struct MolecularStructure {
    /// Primary storage for atoms.
    atoms: SlotMap<AtomId, Atom>,
    /// Positional order of the atoms.
    order: Vec<AtomId>,
    /// List of all bonds in the structure.
    bonds: Vec<Bond>,
    /// Cached adjacency list for bond connectivity, indexed by atom ID.
    bond_adjacency: SecondaryMap<AtomId, Vec<AtomId>>,
}

impl MolecularStructure {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of atoms in the structure.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn atom(&self, id: AtomId) -> Option<&Atom> {
        self.atoms.get(id)
    }

    pub fn atom_mut(&mut self, id: AtomId) -> Option<&mut Atom> {
        self.atoms.get_mut(id)
    }

    /// Retrieves the atom at a positional index.
    ///
    /// # Arguments
    ///
    /// * `index` - Zero-based position of the atom in the structure's atom order.
    ///
    /// # Return
    ///
    /// Returns `Some(&Atom)` if the index is in range, otherwise `None`.
    pub fn atom_at(&self, index: usize) -> Option<&Atom> {
        self.order.get(index).and_then(|&id| self.atoms.get(id))
    }

    pub fn atom_at_mut(&mut self, index: usize) -> Option<&mut Atom> {
        let id = *self.order.get(index)?;
        self.atoms.get_mut(id)
    }

    pub fn atom_id_at(&self, index: usize) -> Option<AtomId> {
        self.order.get(index).copied()
    }

    /// Returns the positional index of an atom, or `None` if it is not part of the structure.
    pub fn index_of(&self, id: AtomId) -> Option<usize> {
        self.order.iter().position(|&other| other == id)
    }

    /// Returns the atom IDs in positional order.
    pub fn atom_ids(&self) -> &[AtomId] {
        &self.order
    }

    /// Iterates over atoms in positional order.
    pub fn atoms_iter(&self) -> impl Iterator<Item = (AtomId, &Atom)> {
        self.order.iter().map(move |&id| (id, &self.atoms[id]))
    }

    /// Iterates mutably over all atoms. The iteration order is unspecified.
    pub fn atoms_iter_mut(&mut self) -> impl Iterator<Item = (AtomId, &mut Atom)> {
        self.atoms.iter_mut()
    }

    pub fn bonds(&self) -> &[Bond] {
        &self.bonds
    }

    /// Appends an atom at the end of the atom order.
    pub fn add_atom(&mut self, atom: Atom) -> AtomId {
        let atom_id = self.atoms.insert(atom);
        self.bond_adjacency.insert(atom_id, Vec::new());
        self.order.push(atom_id);
        atom_id
    }

    /// Adds a bond between two atoms.
    ///
    /// This method is idempotent; adding an existing bond succeeds without creating
    /// duplicates, and self-bonds are rejected.
    ///
    /// # Return
    ///
    /// Returns `Some(())` if the bond exists afterwards, otherwise `None` (e.g., if an atom
    /// doesn't exist).
    pub fn add_bond(&mut self, atom1_id: AtomId, atom2_id: AtomId, order: BondOrder) -> Option<()> {
        if atom1_id == atom2_id
            || !self.atoms.contains_key(atom1_id)
            || !self.atoms.contains_key(atom2_id)
        {
            return None;
        }

        if let Some(neighbors) = self.bond_adjacency.get(atom1_id) {
            if neighbors.contains(&atom2_id) {
                return Some(());
            }
        }

        self.bonds.push(Bond::new(atom1_id, atom2_id, order));
        self.bond_adjacency[atom1_id].push(atom2_id);
        self.bond_adjacency[atom2_id].push(atom1_id);
        Some(())
    }

    /// Removes an atom together with every bond that references it.
    pub fn remove_atom(&mut self, atom_id: AtomId) -> Option<Atom> {
        let atom = self.atoms.remove(atom_id)?;

        self.order.retain(|&id| id != atom_id);
        self.bonds.retain(|bond| !bond.contains(atom_id));

        let neighbors = self.bond_adjacency.remove(atom_id).unwrap_or_default();
        for neighbor_id in neighbors {
            if let Some(adjacency) = self.bond_adjacency.get_mut(neighbor_id) {
                adjacency.retain(|&id| id != atom_id);
            }
        }

        Some(atom)
    }

    pub fn get_bonded_neighbors(&self, atom_id: AtomId) -> Option<&[AtomId]> {
        self.bond_adjacency.get(atom_id).map(|v| v.as_slice())
    }

    /// Finds the first atom with the given name, in positional order.
    pub fn find_atom_by_name(&self, name: &str) -> Option<AtomId> {
        self.atoms_iter()
            .find(|(_, atom)| atom.name == name)
            .map(|(id, _)| id)
    }

    /// Inserts copies of all atoms and bonds of `other` so that its first atom lands at
    /// position `index`. Indices past the end append.
    ///
    /// # Return
    ///
    /// The IDs of the inserted atoms, in the order they appear in `other`.
    pub fn splice(&mut self, index: usize, other: &MolecularStructure) -> Vec<AtomId> {
        let mut id_map: HashMap<AtomId, AtomId> = HashMap::with_capacity(other.len());
        let mut inserted = Vec::with_capacity(other.len());

        for (old_id, atom) in other.atoms_iter() {
            let new_id = self.atoms.insert(atom.clone());
            self.bond_adjacency.insert(new_id, Vec::new());
            id_map.insert(old_id, new_id);
            inserted.push(new_id);
        }

        let at = index.min(self.order.len());
        self.order.splice(at..at, inserted.iter().copied());

        for bond in other.bonds() {
            if let (Some(&a), Some(&b)) = (id_map.get(&bond.atom1_id), id_map.get(&bond.atom2_id)) {
                self.add_bond(a, b, bond.order);
            }
        }

        inserted
    }

    /// Appends copies of all atoms and bonds of `other`.
    pub fn append(&mut self, other: &MolecularStructure) -> Vec<AtomId> {
        self.splice(self.order.len(), other)
    }

    /// Keeps only the atoms whose positional mask entry is `true`.
    pub fn retain_mask(&mut self, mask: &[bool]) -> Result<(), StructureError> {
        if mask.len() != self.order.len() {
            return Err(StructureError::MaskLength {
                expected: self.order.len(),
                found: mask.len(),
            });
        }

        let doomed: Vec<AtomId> = self
            .order
            .iter()
            .zip(mask)
            .filter(|(_, keep)| !**keep)
            .map(|(&id, _)| id)
            .collect();

        for id in doomed {
            self.remove_atom(id);
        }
        Ok(())
    }

    /// Returns every bond as a pair of positional indices.
    pub fn bonded_index_pairs(&self) -> Vec<(usize, usize)> {
        let index: HashMap<AtomId, usize> = self
            .order
            .iter()
            .enumerate()
            .map(|(i, &id)| (id, i))
            .collect();

        self.bonds
            .iter()
            .filter_map(|bond| Some((*index.get(&bond.atom1_id)?, *index.get(&bond.atom2_id)?)))
            .collect()
    }

    /// Returns, for each atom position, the sorted positions of its bonded neighbors.
    pub fn adjacency_by_index(&self) -> Vec<Vec<usize>> {
        let mut adjacency = vec![Vec::new(); self.order.len()];
        for (a, b) in self.bonded_index_pairs() {
            adjacency[a].push(b);
            adjacency[b].push(a);
        }
        for neighbors in &mut adjacency {
            neighbors.sort_unstable();
            neighbors.dedup();
        }
        adjacency
    }

    /// Sum of the formal charges of all atoms.
    pub fn net_formal_charge(&self) -> i32 {
        self.atoms.values().map(|atom| atom.formal_charge).sum()
    }

    /// The residue name of the first atom, if any.
    pub fn residue_name(&self) -> Option<&str> {
        self.atom_at(0).map(|atom| atom.residue_name.as_str())
    }

    /// Assigns `name` as the residue name of every atom.
    pub fn set_residue_name(&mut self, name: &str) {
        for atom in self.atoms.values_mut() {
            atom.residue_name = name.to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    fn atom(name: &str, element: &str) -> Atom {
        Atom::new(name, element, "TST", Point3::origin())
    }

    fn chain_of(names: &[&str]) -> MolecularStructure {
        let mut s = MolecularStructure::new();
        let ids: Vec<_> = names.iter().map(|n| s.add_atom(atom(n, "C"))).collect();
        for pair in ids.windows(2) {
            s.add_bond(pair[0], pair[1], BondOrder::Single);
        }
        s
    }

    #[test]
    fn add_atom_preserves_insertion_order() {
        let s = chain_of(&["A", "B", "C"]);
        let names: Vec<_> = s.atoms_iter().map(|(_, a)| a.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
        assert_eq!(s.len(), 3);
        assert_eq!(s.atom_at(1).unwrap().name, "B");
        assert!(s.atom_at(3).is_none());
    }

    #[test]
    fn add_bond_is_idempotent_and_rejects_self_bonds() {
        let mut s = MolecularStructure::new();
        let a = s.add_atom(atom("A", "C"));
        let b = s.add_atom(atom("B", "C"));
        assert!(s.add_bond(a, b, BondOrder::Single).is_some());
        assert!(s.add_bond(b, a, BondOrder::Double).is_some());
        assert!(s.add_bond(a, a, BondOrder::Single).is_none());
        assert_eq!(s.bonds().len(), 1);
        assert_eq!(s.get_bonded_neighbors(a).unwrap(), &[b]);
    }

    #[test]
    fn remove_atom_cleans_bonds_order_and_adjacency() {
        let mut s = chain_of(&["A", "B", "C"]);
        let b = s.find_atom_by_name("B").unwrap();
        let a = s.find_atom_by_name("A").unwrap();
        let removed = s.remove_atom(b).unwrap();
        assert_eq!(removed.name, "B");
        assert_eq!(s.len(), 2);
        assert!(s.bonds().is_empty());
        assert!(s.get_bonded_neighbors(a).unwrap().is_empty());
        assert_eq!(s.index_of(s.find_atom_by_name("C").unwrap()), Some(1));
    }

    #[test]
    fn splice_inserts_copies_at_position_with_bonds() {
        let mut s = chain_of(&["A", "B"]);
        let cap = chain_of(&["X", "Y"]);
        let inserted = s.splice(0, &cap);
        assert_eq!(inserted.len(), 2);
        let names: Vec<_> = s.atoms_iter().map(|(_, a)| a.name.as_str()).collect();
        assert_eq!(names, vec!["X", "Y", "A", "B"]);
        assert_eq!(s.bonds().len(), 2);
        assert_eq!(s.bonded_index_pairs(), vec![(2, 3), (0, 1)]);
        assert_eq!(cap.len(), 2);
    }

    #[test]
    fn append_places_atoms_at_the_end() {
        let mut s = chain_of(&["A"]);
        s.append(&chain_of(&["Z"]));
        assert_eq!(s.atom_at(1).unwrap().name, "Z");
    }

    #[test]
    fn retain_mask_removes_unmarked_atoms() {
        let mut s = chain_of(&["A", "B", "C", "D"]);
        s.retain_mask(&[false, true, true, false]).unwrap();
        let names: Vec<_> = s.atoms_iter().map(|(_, a)| a.name.as_str()).collect();
        assert_eq!(names, vec!["B", "C"]);
        assert_eq!(s.bonded_index_pairs(), vec![(0, 1)]);
    }

    #[test]
    fn retain_mask_rejects_wrong_length() {
        let mut s = chain_of(&["A", "B"]);
        assert_eq!(
            s.retain_mask(&[true]),
            Err(StructureError::MaskLength {
                expected: 2,
                found: 1
            })
        );
    }

    #[test]
    fn adjacency_by_index_is_symmetric_and_sorted() {
        let s = chain_of(&["A", "B", "C"]);
        assert_eq!(s.adjacency_by_index(), vec![vec![1], vec![0, 2], vec![1]]);
    }

    #[test]
    fn net_charge_and_residue_name_helpers() {
        let mut s = chain_of(&["N", "CA"]);
        s.atom_at_mut(0).unwrap().formal_charge = 1;
        assert_eq!(s.net_formal_charge(), 1);
        assert_eq!(s.residue_name(), Some("TST"));
        s.set_residue_name("XYZ");
        assert!(s.atoms_iter().all(|(_, a)| a.residue_name == "XYZ"));
    }

    #[test]
    fn clone_is_independent() {
        let s = chain_of(&["A", "B"]);
        let mut copy = s.clone();
        copy.atom_at_mut(0).unwrap().name = "Q".to_string();
        assert_eq!(s.atom_at(0).unwrap().name, "A");
    }
}
