//! Labelled molecular graphs and atom correspondence between two structures.
//!
//! A [`LabeledGraph`] is the bond graph of a structure with each node carrying its element
//! symbol. [`matching::match_graphs`] pairs the atoms of two such graphs, which is how names
//! and charges are carried over to a structure that an external program renumbered.

pub mod matching;

use crate::core::models::structure::MolecularStructure;

/// Node-labelled undirected graph over positional atom indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledGraph {
    labels: Vec<String>,
    adjacency: Vec<Vec<usize>>,
}

impl LabeledGraph {
    /// Builds a graph from explicit labels and edges. Edges referencing missing nodes and
    /// self-loops are ignored.
    pub fn new(labels: Vec<String>, edges: &[(usize, usize)]) -> Self {
        let mut adjacency = vec![Vec::new(); labels.len()];
        for &(a, b) in edges {
            if a == b || a >= labels.len() || b >= labels.len() {
                continue;
            }
            adjacency[a].push(b);
            adjacency[b].push(a);
        }
        for neighbors in &mut adjacency {
            neighbors.sort_unstable();
            neighbors.dedup();
        }
        Self { labels, adjacency }
    }

    /// Nodes are the atoms in structure order, labelled by element.
    pub fn from_structure(structure: &MolecularStructure) -> Self {
        Self {
            labels: structure
                .atoms_iter()
                .map(|(_, atom)| atom.element.clone())
                .collect(),
            adjacency: structure.adjacency_by_index(),
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn label(&self, node: usize) -> Option<&str> {
        self.labels.get(node).map(String::as_str)
    }

    /// Sorted neighbor indices of `node`.
    pub fn neighbors(&self, node: usize) -> &[usize] {
        self.adjacency.get(node).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn are_adjacent(&self, a: usize, b: usize) -> bool {
        self.neighbors(a).binary_search(&b).is_ok()
    }

    #[cfg(test)]
    pub(crate) fn edge_count(&self) -> usize {
        self.adjacency.iter().map(Vec::len).sum::<usize>() / 2
    }
}
