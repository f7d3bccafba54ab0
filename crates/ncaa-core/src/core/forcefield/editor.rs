use super::params::{BondedParameterSet, ParameterTable};
use crate::core::models::structure::MolecularStructure;
use crate::core::topology::connectivity;
use std::collections::HashSet;
use tracing::debug;

/// Records which canonical atom types each engine-assigned atom type was overwritten with.
///
/// Keys and their target lists keep insertion order; a target is recorded at most once per key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenameHistory {
    entries: Vec<(String, Vec<String>)>,
}

impl RenameHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notes that atoms of type `original` were retyped to `canonical`.
    ///
    /// Identity renames carry no information and are ignored.
    pub fn record(&mut self, original: &str, canonical: &str) {
        if original == canonical {
            return;
        }
        match self.entries.iter_mut().find(|(old, _)| old == original) {
            Some((_, targets)) => {
                if !targets.iter().any(|t| t == canonical) {
                    targets.push(canonical.to_string());
                }
            }
            None => self
                .entries
                .push((original.to_string(), vec![canonical.to_string()])),
        }
    }

    pub fn get(&self, original: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(old, _)| old == original)
            .map(|(_, targets)| targets.as_slice())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(old, targets)| (old.as_str(), targets.as_slice()))
    }

    /// Every key obtainable by substituting, at each position independently, the current type or
    /// any of the canonical types it was renamed to.
    fn variants(&self, key: &[String]) -> Vec<Vec<String>> {
        let options: Vec<Vec<String>> = key
            .iter()
            .map(|atom_type| {
                let mut choices = self.get(atom_type).map(<[String]>::to_vec).unwrap_or_default();
                choices.push(atom_type.clone());
                choices
            })
            .collect();
        cartesian_product(&options)
    }
}

fn cartesian_product(options: &[Vec<String>]) -> Vec<Vec<String>> {
    options.iter().fold(vec![Vec::new()], |acc, choices| {
        acc.iter()
            .flat_map(|prefix| {
                choices.iter().map(move |choice| {
                    let mut next = prefix.clone();
                    next.push(choice.clone());
                    next
                })
            })
            .collect()
    })
}

fn duplicate_table<V: Clone>(table: &mut ParameterTable<V>, history: &RenameHistory) -> usize {
    let mut additions: Vec<(Vec<String>, V)> = Vec::new();
    for (key, value) in table.iter() {
        let variants = history.variants(key);
        if variants.len() == 1 {
            continue;
        }
        for variant in variants {
            additions.push((variant, value.clone()));
        }
    }

    let written = additions.len();
    for (key, value) in additions {
        table.insert(key.as_slice(), value);
    }
    written
}

/// Copies every bonded parameter whose key mentions a renamed atom type to all key variants
/// reachable through `history`.
///
/// Applies to bonds, angles, proper dihedrals and harmonic impropers; periodic impropers are left
/// untouched. Multi-term dihedrals are copied as a unit.
///
/// # Return
///
/// The number of entries written (including rewrites of already present keys).
pub fn duplicate_parameters(set: &mut BondedParameterSet, history: &RenameHistory) -> usize {
    if history.is_empty() {
        return 0;
    }
    let written = duplicate_table(&mut set.bonds, history)
        + duplicate_table(&mut set.angles, history)
        + duplicate_table(&mut set.dihedrals, history)
        + duplicate_table(&mut set.impropers, history);
    debug!(written, "Duplicated parameters for renamed atom types.");
    written
}

/// Atom-type tuples that actually occur in a structure's bonds, angles and dihedrals.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObservedTuples {
    pub bonds: HashSet<Vec<String>>,
    pub angles: HashSet<Vec<String>>,
    pub dihedrals: HashSet<Vec<String>>,
}

impl ObservedTuples {
    pub fn from_structure(structure: &MolecularStructure) -> Self {
        let type_of = |index: usize| -> String {
            structure
                .atom_at(index)
                .map(|atom| atom.atom_type.clone())
                .unwrap_or_default()
        };

        Self {
            bonds: structure
                .bonded_index_pairs()
                .into_iter()
                .map(|(a, b)| vec![type_of(a), type_of(b)])
                .collect(),
            angles: connectivity::angles(structure)
                .into_iter()
                .map(|angle| angle.iter().map(|&i| type_of(i)).collect())
                .collect(),
            dihedrals: connectivity::dihedrals(structure)
                .into_iter()
                .map(|dihedral| dihedral.iter().map(|&i| type_of(i)).collect())
                .collect(),
        }
    }
}

fn contains_either_direction(observed: &HashSet<Vec<String>>, key: &[String]) -> bool {
    let reversed: Vec<String> = key.iter().rev().cloned().collect();
    observed.contains(key) || observed.contains(&reversed)
}

/// The inputs that decide which parameters survive pruning.
#[derive(Debug, Clone)]
pub struct PruneContext {
    allowed: HashSet<String>,
    backbone: HashSet<String>,
    observed: ObservedTuples,
}

impl PruneContext {
    /// # Arguments
    ///
    /// * `sidechain_types` - Atom types carried by sidechain atoms.
    /// * `backbone_types` - Canonical backbone atom types.
    /// * `observed` - Type tuples of the full capped topology.
    pub fn new<S, B>(sidechain_types: S, backbone_types: B, observed: ObservedTuples) -> Self
    where
        S: IntoIterator,
        S::Item: Into<String>,
        B: IntoIterator,
        B::Item: Into<String>,
    {
        let backbone: HashSet<String> = backbone_types.into_iter().map(Into::into).collect();
        let mut allowed: HashSet<String> = sidechain_types.into_iter().map(Into::into).collect();
        allowed.extend(backbone.iter().cloned());
        Self {
            allowed,
            backbone,
            observed,
        }
    }

    fn all_allowed(&self, key: &[String]) -> bool {
        key.iter().all(|t| self.allowed.contains(t))
    }

    fn all_backbone(&self, key: &[String]) -> bool {
        key.iter().all(|t| self.backbone.contains(t))
    }
}

/// Number of entries removed from each table by [`prune_parameters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneSummary {
    pub atom_types: usize,
    pub bonds: usize,
    pub angles: usize,
    pub dihedrals: usize,
    pub impropers: usize,
    pub periodic_impropers: usize,
}

impl PruneSummary {
    pub fn total(&self) -> usize {
        self.atom_types
            + self.bonds
            + self.angles
            + self.dihedrals
            + self.impropers
            + self.periodic_impropers
    }
}

fn prune_observed_table<V>(
    table: &mut ParameterTable<V>,
    context: &PruneContext,
    observed: &HashSet<Vec<String>>,
) -> usize {
    let mut seen: HashSet<Vec<String>> = HashSet::new();
    let mut doomed: Vec<Vec<String>> = Vec::new();

    for (key, _) in table.iter() {
        let reversed: Vec<String> = key.iter().rev().cloned().collect();
        if !context.all_allowed(key)
            || context.all_backbone(key)
            || !contains_either_direction(observed, key)
            || seen.contains(&reversed)
        {
            doomed.push(key.to_vec());
        }
        seen.insert(key.to_vec());
    }

    for key in &doomed {
        table.remove(key.as_slice());
    }
    doomed.len()
}

fn prune_improper_table<V>(table: &mut ParameterTable<V>, context: &PruneContext) -> usize {
    let before = table.len();
    table.retain(|key, _| context.all_allowed(key) && !context.all_backbone(key));
    before - table.len()
}

/// Removes atom types and bonded parameters that are irrelevant to the residue's sidechain.
///
/// Bonds, angles and dihedrals are dropped when they mention a type outside the allowed set,
/// consist solely of backbone types, never occur in the observed topology, or repeat an entry
/// already visited in reverse. Impropers only get the first two checks.
pub fn prune_parameters(set: &mut BondedParameterSet, context: &PruneContext) -> PruneSummary {
    let atom_types_before = set.atom_types.len();
    set.atom_types
        .retain(|key, _| key.iter().all(|t| context.allowed.contains(t)));

    let summary = PruneSummary {
        atom_types: atom_types_before - set.atom_types.len(),
        bonds: prune_observed_table(&mut set.bonds, context, &context.observed.bonds),
        angles: prune_observed_table(&mut set.angles, context, &context.observed.angles),
        dihedrals: prune_observed_table(&mut set.dihedrals, context, &context.observed.dihedrals),
        impropers: prune_improper_table(&mut set.impropers, context),
        periodic_impropers: prune_improper_table(&mut set.periodic_impropers, context),
    };
    debug!(removed = summary.total(), "Pruned parameter set.");
    summary
}
