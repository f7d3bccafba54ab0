use std::collections::HashMap;

/// How two parameter keys relate to their reversed form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySymmetry {
    /// `(A, B, C)` and `(C, B, A)` address the same entry (bonds, angles, proper dihedrals).
    Reversible,
    /// The key order is significant (impropers, atom types).
    Directed,
}

#[derive(Debug, Clone, PartialEq)]
struct Entry<V> {
    key: Vec<String>,
    value: V,
}

/// An insertion-ordered table of bonded parameters keyed by tuples of atom-type names.
///
/// For [`KeySymmetry::Reversible`] tables every lookup, insertion and removal normalizes the
/// key, so a key and its reverse always address one entry. The orientation and position of the
/// first insertion are kept; later insertions under either orientation only replace the value.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterTable<V> {
    symmetry: KeySymmetry,
    entries: Vec<Entry<V>>,
    index: HashMap<Vec<String>, usize>,
}

impl<V> ParameterTable<V> {
    pub fn new(symmetry: KeySymmetry) -> Self {
        Self {
            symmetry,
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn symmetry(&self) -> KeySymmetry {
        self.symmetry
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn normalize<K: AsRef<str>>(&self, key: &[K]) -> Vec<String> {
        let forward: Vec<String> = key.iter().map(|k| k.as_ref().to_string()).collect();
        match self.symmetry {
            KeySymmetry::Directed => forward,
            KeySymmetry::Reversible => {
                let reversed: Vec<String> = forward.iter().rev().cloned().collect();
                if reversed < forward {
                    reversed
                } else {
                    forward
                }
            }
        }
    }

    pub fn get<K: AsRef<str>>(&self, key: &[K]) -> Option<&V> {
        self.index
            .get(&self.normalize(key))
            .map(|&pos| &self.entries[pos].value)
    }

    pub fn get_mut<K: AsRef<str>>(&mut self, key: &[K]) -> Option<&mut V> {
        let pos = *self.index.get(&self.normalize(key))?;
        Some(&mut self.entries[pos].value)
    }

    pub fn contains_key<K: AsRef<str>>(&self, key: &[K]) -> bool {
        self.index.contains_key(&self.normalize(key))
    }

    /// Inserts a value, returning the previous value stored under the key (or its reverse).
    pub fn insert<K: AsRef<str>>(&mut self, key: &[K], value: V) -> Option<V> {
        let normalized = self.normalize(key);
        if let Some(&pos) = self.index.get(&normalized) {
            return Some(std::mem::replace(&mut self.entries[pos].value, value));
        }
        self.index.insert(normalized, self.entries.len());
        self.entries.push(Entry {
            key: key.iter().map(|k| k.as_ref().to_string()).collect(),
            value,
        });
        None
    }

    pub fn remove<K: AsRef<str>>(&mut self, key: &[K]) -> Option<V> {
        let pos = self.index.remove(&self.normalize(key))?;
        let entry = self.entries.remove(pos);
        for slot in self.index.values_mut() {
            if *slot > pos {
                *slot -= 1;
            }
        }
        Some(entry.value)
    }

    /// Iterates entries in insertion order, yielding each key in its stored orientation.
    pub fn iter(&self) -> impl Iterator<Item = (&[String], &V)> {
        self.entries.iter().map(|e| (e.key.as_slice(), &e.value))
    }

    /// Snapshot of all stored keys in insertion order.
    pub fn keys(&self) -> Vec<Vec<String>> {
        self.entries.iter().map(|e| e.key.clone()).collect()
    }

    /// Keeps only the entries for which `keep` returns `true`, preserving order.
    pub fn retain(&mut self, mut keep: impl FnMut(&[String], &V) -> bool) {
        self.entries.retain(|e| keep(&e.key, &e.value));
        self.rebuild_index();
    }

    fn rebuild_index(&mut self) {
        let normalized: Vec<Vec<String>> =
            self.entries.iter().map(|e| self.normalize(&e.key)).collect();
        self.index = normalized
            .into_iter()
            .enumerate()
            .map(|(pos, key)| (key, pos))
            .collect();
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LennardJones {
    /// Van der Waals radius (R*) in Angstroms.
    pub radius: f64,
    /// Well depth in kcal/mol.
    pub well_depth: f64,
}

/// Per-atom-type parameters from the MASS and NONBON sections.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AtomTypeParams {
    pub mass: Option<f64>,
    pub polarizability: Option<f64>,
    pub lennard_jones: Option<LennardJones>,
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BondParams {
    /// Force constant in kcal/mol/A^2.
    pub force_constant: f64,
    /// Equilibrium length in Angstroms.
    pub equilibrium_length: f64,
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AngleParams {
    /// Force constant in kcal/mol/rad^2.
    pub force_constant: f64,
    /// Equilibrium angle in degrees.
    pub equilibrium_angle: f64,
    pub comment: String,
}

/// One Fourier term of a proper torsion.
#[derive(Debug, Clone, PartialEq)]
pub struct DihedralTerm {
    /// Barrier divisor (IDIVF).
    pub divider: f64,
    /// Barrier height (PK) in kcal/mol.
    pub barrier: f64,
    /// Phase in degrees.
    pub phase: f64,
    /// Periodicity, always stored positive.
    pub periodicity: f64,
    pub comment: String,
}

/// A proper torsion, possibly made of several Fourier terms.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DihedralParams {
    pub terms: Vec<DihedralTerm>,
}

/// A periodic (Amber-style) improper torsion.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodicImproperParams {
    pub barrier: f64,
    pub phase: f64,
    pub periodicity: f64,
    pub comment: String,
}

/// A harmonic (CHARMM-style) improper torsion.
#[derive(Debug, Clone, PartialEq)]
pub struct HarmonicImproperParams {
    pub force_constant: f64,
    pub equilibrium_angle: f64,
    pub comment: String,
}

/// A complete set of bonded parameters as read from, and written back to, a parameter file.
#[derive(Debug, Clone, PartialEq)]
pub struct BondedParameterSet {
    pub title: String,
    pub atom_types: ParameterTable<AtomTypeParams>,
    pub bonds: ParameterTable<BondParams>,
    pub angles: ParameterTable<AngleParams>,
    pub dihedrals: ParameterTable<DihedralParams>,
    pub impropers: ParameterTable<HarmonicImproperParams>,
    pub periodic_impropers: ParameterTable<PeriodicImproperParams>,
}

impl Default for BondedParameterSet {
    fn default() -> Self {
        Self {
            title: String::new(),
            atom_types: ParameterTable::new(KeySymmetry::Directed),
            bonds: ParameterTable::new(KeySymmetry::Reversible),
            angles: ParameterTable::new(KeySymmetry::Reversible),
            dihedrals: ParameterTable::new(KeySymmetry::Reversible),
            impropers: ParameterTable::new(KeySymmetry::Directed),
            periodic_impropers: ParameterTable::new(KeySymmetry::Directed),
        }
    }
}

impl BondedParameterSet {
    pub fn new() -> Self {
        Self::default()
    }
}
