use crate::core::io::cif::{CifError, CifFile};
use crate::core::io::traits::StructureFile;
use crate::core::models::structure::MolecularStructure;
use crate::core::models::topology::BondOrder;
use crate::core::utils::geometry::{AlignmentError, superpose};
use nalgebra::Point3;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

const ACE_CIF: &str = include_str!("../../../data/caps/ACE.cif");
const NME_CIF: &str = include_str!("../../../data/caps/NME.cif");

/// Residue atoms the ACE fragment is superposed on; they are dropped from the fragment after
/// the fit.
pub const ACE_ALIGNMENT_ATOMS: [&str; 3] = ["N", "H", "CA"];
/// Residue atoms the NME fragment is superposed on.
pub const NME_ALIGNMENT_ATOMS: [&str; 3] = ["CA", "C", "O"];

#[derive(Debug, Error)]
pub enum CappingError {
    #[error("Failed to load cap fragment '{name}': {source}")]
    BuiltinFragment {
        name: &'static str,
        #[source]
        source: CifError,
    },
    #[error("Failed to load cap fragment from '{path}': {source}")]
    FragmentFile {
        path: PathBuf,
        #[source]
        source: CifError,
    },
    #[error("Atom '{atom}' is missing from {structure}")]
    MissingAtom { structure: String, atom: String },
    #[error("Cap fragment {fragment} has only alignment atoms")]
    EmptyFragment { fragment: &'static str },
    #[error("Failed to superpose cap fragment: {0}")]
    Alignment(#[from] AlignmentError),
}

/// The acetyl and N-methylamide reference fragments.
///
/// Loaded once and shared read-only by every capping call.
#[derive(Debug, Clone)]
pub struct CapFragments {
    ace: MolecularStructure,
    nme: MolecularStructure,
}

impl CapFragments {
    /// Fragments bundled with the library, taken from an alanine dipeptide.
    pub fn builtin() -> Result<Self, CappingError> {
        let parse = |name: &'static str, text: &str| {
            CifFile::read_from(&mut Cursor::new(text.as_bytes()))
                .map_err(|source| CappingError::BuiltinFragment { name, source })
        };
        Self::new(parse("ACE", ACE_CIF)?, parse("NME", NME_CIF)?)
    }

    pub fn load(ace: &Path, nme: &Path) -> Result<Self, CappingError> {
        let read = |path: &Path| {
            CifFile::read_from_path(path).map_err(|source| CappingError::FragmentFile {
                path: path.to_path_buf(),
                source,
            })
        };
        Self::new(read(ace)?, read(nme)?)
    }

    /// Validates that each fragment carries its alignment atoms plus at least one cap atom.
    pub fn new(ace: MolecularStructure, nme: MolecularStructure) -> Result<Self, CappingError> {
        for (fragment, structure, alignment) in [
            ("ACE", &ace, ACE_ALIGNMENT_ATOMS),
            ("NME", &nme, NME_ALIGNMENT_ATOMS),
        ] {
            require_atoms(structure, fragment, &alignment)?;
            if structure.len() <= alignment.len() {
                return Err(CappingError::EmptyFragment { fragment });
            }
        }
        Ok(Self { ace, nme })
    }

    pub fn ace(&self) -> &MolecularStructure {
        &self.ace
    }

    pub fn nme(&self) -> &MolecularStructure {
        &self.nme
    }

    /// Atoms the ACE cap adds to a residue.
    pub fn ace_atom_count(&self) -> usize {
        self.ace.len() - ACE_ALIGNMENT_ATOMS.len()
    }

    /// Atoms the NME cap adds to a residue.
    pub fn nme_atom_count(&self) -> usize {
        self.nme.len() - NME_ALIGNMENT_ATOMS.len()
    }
}

fn require_atoms(
    structure: &MolecularStructure,
    label: &str,
    names: &[&str],
) -> Result<Vec<Point3<f64>>, CappingError> {
    names
        .iter()
        .map(|&name| {
            structure
                .find_atom_by_name(name)
                .and_then(|id| structure.atom(id))
                .map(|atom| atom.position)
                .ok_or_else(|| CappingError::MissingAtom {
                    structure: label.to_string(),
                    atom: name.to_string(),
                })
        })
        .collect()
}

/// Superposes `fragment` onto the residue's alignment atoms and removes them from the copy.
fn place_fragment(
    fragment: &MolecularStructure,
    fragment_name: &str,
    residue: &MolecularStructure,
    residue_label: &str,
    alignment: &[&str],
) -> Result<MolecularStructure, CappingError> {
    let mobile = require_atoms(fragment, fragment_name, alignment)?;
    let reference = require_atoms(residue, residue_label, alignment)?;
    let transform = superpose(&mobile, &reference)?;

    let mut placed = fragment.clone();
    for (_, atom) in placed.atoms_iter_mut() {
        atom.position = transform.apply(&atom.position);
    }
    for &name in alignment {
        if let Some(id) = placed.find_atom_by_name(name) {
            placed.remove_atom(id);
        }
    }
    Ok(placed)
}

/// Caps a residue with ACE before its first atom and NME after its last atom.
///
/// Each fragment is fitted onto the residue's backbone, its alignment atoms are removed, and
/// the two peptide bonds ACE C - residue N and NME N - residue C are added. The input is left
/// untouched.
pub fn cap_residue(
    residue: &MolecularStructure,
    caps: &CapFragments,
) -> Result<MolecularStructure, CappingError> {
    let label = residue.residue_name().unwrap_or("UNK").to_string();
    let missing = |atom: &str| CappingError::MissingAtom {
        structure: label.clone(),
        atom: atom.to_string(),
    };

    let ace = place_fragment(&caps.ace, "ACE", residue, &label, &ACE_ALIGNMENT_ATOMS)?;
    let nme = place_fragment(&caps.nme, "NME", residue, &label, &NME_ALIGNMENT_ATOMS)?;

    let mut capped = residue.clone();
    let residue_n = capped.find_atom_by_name("N").ok_or_else(|| missing("N"))?;
    let residue_c = capped.find_atom_by_name("C").ok_or_else(|| missing("C"))?;

    let ace_c = ace
        .find_atom_by_name("C")
        .and_then(|id| ace.index_of(id))
        .ok_or(CappingError::MissingAtom {
            structure: "ACE".to_string(),
            atom: "C".to_string(),
        })?;
    let nme_n = nme
        .find_atom_by_name("N")
        .and_then(|id| nme.index_of(id))
        .ok_or(CappingError::MissingAtom {
            structure: "NME".to_string(),
            atom: "N".to_string(),
        })?;

    let ace_ids = capped.splice(0, &ace);
    let nme_ids = capped.append(&nme);
    capped.add_bond(nme_ids[nme_n], residue_c, BondOrder::Single);
    capped.add_bond(ace_ids[ace_c], residue_n, BondOrder::Single);

    debug!(
        residue = %label,
        atoms = capped.len(),
        bonds = capped.bonds().len(),
        "Capped residue."
    );
    Ok(capped)
}
