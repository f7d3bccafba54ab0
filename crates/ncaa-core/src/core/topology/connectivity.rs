use crate::core::models::structure::MolecularStructure;
use crate::core::models::topology::BondOrder;
use std::collections::{HashSet, VecDeque};

/// A torsion around a freely rotatable bond, named by its four atom names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotatableDihedral {
    /// `"A-B-C-D"` built from the atom names.
    pub name: String,
    /// Positional indices of the four atoms.
    pub atoms: [usize; 4],
}

/// Lists every bond angle as positional index triples `[i, center, k]` with `i < k`.
pub fn angles(structure: &MolecularStructure) -> Vec<[usize; 3]> {
    let adjacency = structure.adjacency_by_index();
    let mut result = Vec::new();
    for (center, neighbors) in adjacency.iter().enumerate() {
        for (n, &i) in neighbors.iter().enumerate() {
            for &k in &neighbors[n + 1..] {
                result.push([i, center, k]);
            }
        }
    }
    result
}

/// Lists every proper dihedral `[i, j, k, l]` once, with the central bond oriented `j < k`.
pub fn dihedrals(structure: &MolecularStructure) -> Vec<[usize; 4]> {
    let adjacency = structure.adjacency_by_index();
    let mut result = Vec::new();
    for (j, neighbors) in adjacency.iter().enumerate() {
        for &k in neighbors.iter().filter(|&&k| j < k) {
            for &i in adjacency[j].iter().filter(|&&i| i != k) {
                for &l in adjacency[k].iter().filter(|&&l| l != j && l != i) {
                    result.push([i, j, k, l]);
                }
            }
        }
    }
    result
}

/// Returns the bonds that lie on at least one ring, as `(min, max)` index pairs.
///
/// A bond is cyclic when its two atoms remain connected after the bond is removed.
pub fn ring_bonds(structure: &MolecularStructure) -> HashSet<(usize, usize)> {
    let adjacency = structure.adjacency_by_index();
    let mut result = HashSet::new();

    for (a, b) in structure.bonded_index_pairs() {
        let (a, b) = (a.min(b), a.max(b));
        let mut visited = vec![false; adjacency.len()];
        let mut queue = VecDeque::from([a]);
        visited[a] = true;

        while let Some(current) = queue.pop_front() {
            if current == b {
                result.insert((a, b));
                break;
            }
            for &next in &adjacency[current] {
                if visited[next] || (current == a && next == b) {
                    continue;
                }
                visited[next] = true;
                queue.push_back(next);
            }
        }
    }
    result
}

/// Lists one representative dihedral per rotatable bond.
///
/// A bond is rotatable when it is a single (or amide) bond outside any ring and both of its
/// atoms carry at least one other neighbor that is not a terminal hydrogen-only group. Outer
/// atoms prefer heavy neighbors, lowest index first.
pub fn rotatable_dihedrals(structure: &MolecularStructure) -> Vec<RotatableDihedral> {
    let adjacency = structure.adjacency_by_index();
    let rings = ring_bonds(structure);
    let is_hydrogen =
        |index: usize| structure.atom_at(index).is_some_and(|atom| atom.is_hydrogen());

    let pick_outer = |center: usize, exclude: usize| -> Option<usize> {
        let others: Vec<usize> = adjacency[center]
            .iter()
            .copied()
            .filter(|&n| n != exclude)
            .collect();
        others
            .iter()
            .copied()
            .find(|&n| !is_hydrogen(n))
            .or_else(|| others.first().copied())
    };

    let only_hydrogens_beyond = |center: usize, exclude: usize| -> bool {
        adjacency[center]
            .iter()
            .filter(|&&n| n != exclude)
            .all(|&n| is_hydrogen(n))
    };

    let mut pairs: Vec<(usize, usize, BondOrder)> = Vec::new();
    for bond in structure.bonds() {
        let (Some(a), Some(b)) = (
            structure.index_of(bond.atom1_id),
            structure.index_of(bond.atom2_id),
        ) else {
            continue;
        };
        pairs.push((a.min(b), a.max(b), bond.order));
    }
    pairs.sort_unstable_by_key(|&(j, k, _)| (j, k));

    let mut seen_names = HashSet::new();
    let mut result = Vec::new();
    for (j, k, order) in pairs {
        if !matches!(order, BondOrder::Single | BondOrder::Amide | BondOrder::Unknown) {
            continue;
        }
        if rings.contains(&(j, k)) {
            continue;
        }
        if adjacency[j].len() < 2 || adjacency[k].len() < 2 {
            continue;
        }
        if only_hydrogens_beyond(j, k) || only_hydrogens_beyond(k, j) {
            continue;
        }
        let (Some(i), Some(l)) = (pick_outer(j, k), pick_outer(k, j)) else {
            continue;
        };

        let name = [i, j, k, l]
            .iter()
            .filter_map(|&idx| structure.atom_at(idx).map(|atom| atom.name.as_str()))
            .collect::<Vec<_>>()
            .join("-");
        if seen_names.insert(name.clone()) {
            result.push(RotatableDihedral {
                name,
                atoms: [i, j, k, l],
            });
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::atom::Atom;
    use nalgebra::Point3;

    fn build(atoms: &[(&str, &str)], bonds: &[(usize, usize)]) -> MolecularStructure {
        let mut s = MolecularStructure::new();
        let ids: Vec<_> = atoms
            .iter()
            .map(|(name, element)| s.add_atom(Atom::new(name, element, "TST", Point3::origin())))
            .collect();
        for &(a, b) in bonds {
            s.add_bond(ids[a], ids[b], BondOrder::Single);
        }
        s
    }

    fn butane() -> MolecularStructure {
        build(
            &[("C1", "C"), ("C2", "C"), ("C3", "C"), ("C4", "C")],
            &[(0, 1), (1, 2), (2, 3)],
        )
    }

    #[test]
    fn angles_enumerates_each_angle_once() {
        let s = butane();
        assert_eq!(angles(&s), vec![[0, 1, 2], [1, 2, 3]]);
    }

    #[test]
    fn dihedrals_enumerates_each_dihedral_once() {
        let s = butane();
        assert_eq!(dihedrals(&s), vec![[0, 1, 2, 3]]);
    }

    #[test]
    fn three_membered_ring_has_no_dihedrals() {
        let s = build(&[("A", "C"), ("B", "C"), ("C", "C")], &[(0, 1), (1, 2), (2, 0)]);
        assert!(dihedrals(&s).is_empty());
        assert_eq!(angles(&s).len(), 3);
    }

    #[test]
    fn ring_bonds_detects_cycle_members_only() {
        let s = build(
            &[("A", "C"), ("B", "C"), ("C", "C"), ("D", "C")],
            &[(0, 1), (1, 2), (2, 0), (2, 3)],
        );
        let rings = ring_bonds(&s);
        assert!(rings.contains(&(0, 1)));
        assert!(rings.contains(&(1, 2)));
        assert!(rings.contains(&(0, 2)));
        assert!(!rings.contains(&(2, 3)));
    }

    #[test]
    fn rotatable_dihedrals_skips_terminal_and_methyl_bonds() {
        // C1(H3)-C2-C3-O-H : the C2-C3 bond is rotatable, C3-O ends in a hydroxyl hydrogen.
        let s = build(
            &[
                ("C1", "C"),
                ("C2", "C"),
                ("C3", "C"),
                ("O", "O"),
                ("H1", "H"),
                ("H2", "H"),
                ("H3", "H"),
                ("HO", "H"),
            ],
            &[(0, 1), (1, 2), (2, 3), (0, 4), (0, 5), (0, 6), (3, 7)],
        );
        let names: Vec<_> = rotatable_dihedrals(&s).into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["C1-C2-C3-O"]);
    }

    #[test]
    fn rotatable_dihedrals_ignores_ring_bonds() {
        let s = build(
            &[("A", "C"), ("B", "C"), ("C", "C"), ("D", "C"), ("E", "C")],
            &[(0, 1), (1, 2), (2, 0), (2, 3), (3, 4)],
        );
        let names: Vec<_> = rotatable_dihedrals(&s).into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["A-C-D-E"]);
    }
}
