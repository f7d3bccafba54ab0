use super::error::EngineError;
use super::progress::ProgressReporter;
use super::tools::TemplateToolchain;
use crate::core::building::caps::CapFragments;
use crate::core::forcefield::editor::{
    ObservedTuples, PruneContext, PruneSummary, RenameHistory, duplicate_parameters,
    prune_parameters,
};
use crate::core::graph::LabeledGraph;
use crate::core::graph::matching::match_graphs;
use crate::core::io::cif::CifFile;
use crate::core::io::frcmod::FrcmodFile;
use crate::core::io::mol2::Mol2File;
use crate::core::io::prepi;
use crate::core::io::traits::StructureFile;
use crate::core::models::structure::MolecularStructure;
use crate::core::topology::backbone::{backbone_atom_types, backbone_type_for};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// Locations of the per-residue files read and written while post-processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResidueFiles {
    /// Engine structure staged into the working directory (`<resn>.cif`).
    pub engine_structure: PathBuf,
    /// Sidechain structure handed to the connectivity generator (`<resn>.mol2`).
    pub sidechain: PathBuf,
    pub connectivity: PathBuf,
    pub main_chain: PathBuf,
    /// Final parameter file (`<resn>.frcmod`), edited in place.
    pub parameters: PathBuf,
    /// Final residue template (`<resn>.prepi`).
    pub template: PathBuf,
}

impl ResidueFiles {
    pub fn new(work_dir: &Path, output_dir: &Path, residue_name: &str) -> Self {
        Self {
            engine_structure: work_dir.join(format!("{residue_name}.cif")),
            sidechain: work_dir.join(format!("{residue_name}.mol2")),
            connectivity: work_dir.join(format!("{residue_name}_mod.ac")),
            main_chain: work_dir.join(format!("mainchain.{}", residue_name.to_lowercase())),
            parameters: output_dir.join(format!("{residue_name}.frcmod")),
            template: output_dir.join(format!("{residue_name}.prepi")),
        }
    }
}

/// What post-processing produced for one residue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostprocessOutcome {
    pub parameters: PathBuf,
    pub template: PathBuf,
    pub matched_atoms: usize,
    pub sidechain_atoms: usize,
    pub duplicated: usize,
    pub pruned: PruneSummary,
    pub capitalization_fixes: usize,
}

/// Restores the input naming on the engine's structure and gives backbone atoms their
/// canonical types.
///
/// Returns the number of matched atoms and the rename history of the retyped atoms.
fn restore_naming(
    capped: &MolecularStructure,
    reloaded: &mut MolecularStructure,
    residue_name: &str,
    tolerance: f64,
) -> Result<(usize, RenameHistory), EngineError> {
    let correspondence = match_graphs(
        &LabeledGraph::from_structure(capped),
        &LabeledGraph::from_structure(reloaded),
        tolerance,
    )
    .map_err(|e| EngineError::mismatch(residue_name, e))?;

    for (original, engine) in correspondence.iter() {
        let (Some(source), Some(target)) = (capped.atom_at(original), reloaded.atom_at_mut(engine))
        else {
            continue;
        };
        target.name.clone_from(&source.name);
        target.formal_charge = source.formal_charge;
    }

    let mut history = RenameHistory::new();
    for (_, atom) in reloaded.atoms_iter_mut() {
        if let Some(canonical) = backbone_type_for(&atom.name) {
            history.record(&atom.atom_type, canonical);
            atom.atom_type = canonical.to_string();
        }
    }
    Ok((correspondence.len(), history))
}

/// Everything but the leading ACE atoms and the trailing NME atoms, by position.
fn sidechain_mask(
    structure: &MolecularStructure,
    caps: &CapFragments,
    residue_name: &str,
) -> Result<Vec<bool>, EngineError> {
    let (head, tail) = (caps.ace_atom_count(), caps.nme_atom_count());
    let len = structure.len();
    if len <= head + tail {
        return Err(EngineError::mismatch(
            residue_name,
            format!("engine structure has {len} atoms, caps alone contribute {}", head + tail),
        ));
    }
    Ok((0..len).map(|i| i >= head && i < len - tail).collect())
}

fn edit_parameters(
    reloaded: &MolecularStructure,
    mask: &[bool],
    history: &RenameHistory,
    path: &Path,
) -> Result<(usize, PruneSummary), EngineError> {
    let parameters_error = |source| EngineError::Parameters {
        path: path.to_path_buf(),
        source,
    };
    let mut set = FrcmodFile::read_from_path(path).map_err(parameters_error)?;

    let duplicated = duplicate_parameters(&mut set, history);
    let sidechain_types: BTreeSet<String> = reloaded
        .atoms_iter()
        .zip(mask)
        .filter(|(_, keep)| **keep)
        .map(|((_, atom), _)| atom.atom_type.clone())
        .collect();
    let context = PruneContext::new(
        sidechain_types,
        backbone_atom_types(),
        ObservedTuples::from_structure(reloaded),
    );
    let pruned = prune_parameters(&mut set, &context);

    FrcmodFile::write_to_path(&set, path).map_err(parameters_error)?;
    Ok((duplicated, pruned))
}

/// Turns the engine output of one capped residue into the final parameter and template files.
///
/// Expects the engine structure staged at `<work_dir>/<resn>.cif` and the engine parameters at
/// `<output_dir>/<resn>.frcmod`.
///
/// # Arguments
///
/// * `capped` - The capped structure given to the engine; its atom names and formal charges
///   are authoritative.
/// * `caps` - The fragments used for capping, which fix how many atoms each cap contributes.
/// * `toolchain` - Generates the connectivity and template files.
/// * `tolerance` - Largest fraction of atoms allowed to stay unmatched.
///
/// # Errors
///
/// Fails when the engine's structure cannot be matched to `capped`, when a file is missing or
/// malformed, or when an external tool fails.
#[instrument(skip_all, name = "postprocess", fields(residue = residue_name))]
#[allow(clippy::too_many_arguments)]
pub fn postprocess(
    capped: &MolecularStructure,
    caps: &CapFragments,
    work_dir: &Path,
    output_dir: &Path,
    residue_name: &str,
    toolchain: &dyn TemplateToolchain,
    tolerance: f64,
    reporter: &ProgressReporter,
) -> Result<PostprocessOutcome, EngineError> {
    let files = ResidueFiles::new(work_dir, output_dir, residue_name);

    reporter.stage("Matching engine structure");
    let mut reloaded = CifFile::read_from_path(&files.engine_structure)
        .map_err(|e| EngineError::structure(&files.engine_structure, e))?;
    let (matched_atoms, history) = restore_naming(capped, &mut reloaded, residue_name, tolerance)?;
    debug!(matched_atoms, total = reloaded.len(), "Restored input atom names.");

    reporter.stage("Editing parameters");
    let mask = sidechain_mask(&reloaded, caps, residue_name)?;
    let (duplicated, pruned) = edit_parameters(&reloaded, &mask, &history, &files.parameters)?;
    info!(
        duplicated,
        pruned = pruned.total(),
        "Reconciled parameters with the canonical backbone types."
    );

    reporter.stage("Building residue template");
    let mut sidechain = reloaded;
    sidechain
        .retain_mask(&mask)
        .map_err(|e| EngineError::mismatch(residue_name, e))?;
    Mol2File::write_to_path(&sidechain, &files.sidechain)
        .map_err(|e| EngineError::structure(&files.sidechain, e))?;

    let net_charge = sidechain.net_formal_charge();
    toolchain.generate_connectivity(&files.sidechain, &files.connectivity, net_charge)?;
    prepi::write_main_chain_file(&files.main_chain, net_charge).map_err(|source| {
        EngineError::Template {
            path: files.main_chain.clone(),
            source,
        }
    })?;
    toolchain.generate_template(
        &files.connectivity,
        &files.main_chain,
        &files.template,
        residue_name,
    )?;

    let capitalization_fixes = prepi::fix_atom_name_capitalization(&sidechain, &files.template)
        .map_err(|source| EngineError::Template {
            path: files.template.clone(),
            source,
        })?;

    Ok(PostprocessOutcome {
        parameters: files.parameters,
        template: files.template,
        matched_atoms,
        sidechain_atoms: sidechain.len(),
        duplicated,
        pruned,
        capitalization_fixes,
    })
}
