use crate::core::building::caps::{CapFragments, cap_residue};
use crate::core::io::cif::CifFile;
use crate::core::io::mol2::Mol2File;
use crate::core::io::traits::StructureFile;
use crate::core::models::structure::MolecularStructure;
use crate::core::topology::backbone::PURE_BACKBONE_DIHEDRALS;
use crate::core::topology::connectivity::rotatable_dihedrals;
use crate::engine::config::{FailurePolicy, ParameterizationConfig};
use crate::engine::error::EngineError;
use crate::engine::postprocess::{PostprocessOutcome, postprocess};
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::tools::{
    AmberTools, EngineRequest, ParameterizationEngine, ParameterizeCli, TemplateToolchain,
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

/// A residue whose parameter and template files were written.
#[derive(Debug, Clone)]
pub struct ResidueResult {
    pub input: PathBuf,
    pub residue_name: String,
    pub outcome: PostprocessOutcome,
}

/// A residue that could not be parameterized.
#[derive(Debug)]
pub struct ResidueFailure {
    pub input: PathBuf,
    pub error: EngineError,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub succeeded: Vec<ResidueResult>,
    pub failed: Vec<ResidueFailure>,
}

impl BatchReport {
    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Locates the command-line engine and AmberTools programs named in `config`.
///
/// Runs before any residue is touched, so a missing program is reported as
/// [`EngineError::MissingDependency`] up front.
pub fn locate_tools(
    config: &ParameterizationConfig,
) -> Result<(ParameterizeCli, AmberTools), EngineError> {
    let engine = ParameterizeCli::locate(&config.tools, config.tool_timeout)?;
    let toolchain = AmberTools::locate(&config.tools, config.tool_timeout)?;
    Ok((engine, toolchain))
}

fn read_residue(path: &Path) -> Result<MolecularStructure, EngineError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    let structure = match extension.as_deref() {
        Some("cif") => CifFile::read_from_path(path).map_err(|e| EngineError::structure(path, e)),
        Some("mol2") => {
            Mol2File::read_from_path(path).map_err(|e| EngineError::structure(path, e))
        }
        _ => Err(EngineError::structure(
            path,
            "unsupported structure format (expected .cif or .mol2)",
        )),
    }?;
    if structure.is_empty() {
        return Err(EngineError::structure(path, "structure contains no atoms"));
    }
    Ok(structure)
}

/// Names of the capped residue's rotatable dihedrals, without the two that lie entirely in the
/// peptide backbone of the caps.
fn fittable_dihedrals(capped: &MolecularStructure) -> Vec<String> {
    rotatable_dihedrals(capped)
        .into_iter()
        .map(|dihedral| dihedral.name)
        .filter(|name| !PURE_BACKBONE_DIHEDRALS.contains(&name.as_str()))
        .collect()
}

fn stage_file(from: &Path, to: &Path) -> Result<(), EngineError> {
    fs::copy(from, to).map_err(|e| EngineError::io(from, e))?;
    Ok(())
}

#[instrument(skip_all, fields(file = %path.display()))]
fn parameterize_residue(
    path: &Path,
    config: &ParameterizationConfig,
    engine: &dyn ParameterizationEngine,
    toolchain: &dyn TemplateToolchain,
    caps: &CapFragments,
    reporter: &ProgressReporter,
) -> Result<ResidueResult, EngineError> {
    reporter.stage("Reading residue");
    let mut residue = read_residue(path)?;
    let residue_name = residue
        .residue_name()
        .filter(|name| !name.trim().is_empty())
        .map(|name| name.trim().to_string())
        .ok_or_else(|| EngineError::structure(path, "atoms carry no residue name"))?;

    for (_, atom) in residue.atoms_iter_mut() {
        if atom.name == "N" {
            atom.formal_charge = 0;
        }
    }

    reporter.stage("Capping");
    let mut capped =
        cap_residue(&residue, caps).map_err(|e| EngineError::mismatch(&residue_name, e))?;
    capped.set_residue_name(&residue_name);
    let dihedrals = fittable_dihedrals(&capped);

    let work_dir = tempfile::Builder::new()
        .prefix("ncaa-")
        .tempdir()
        .map_err(|e| EngineError::io(std::env::temp_dir(), e))?;
    let capped_file = work_dir.path().join(format!("{residue_name}-capped.mol2"));
    Mol2File::write_to_path(&capped, &capped_file)
        .map_err(|e| EngineError::structure(&capped_file, e))?;

    reporter.stage("Running parameterization engine");
    let request = EngineRequest::new(&capped, &capped_file, &residue_name, work_dir.path())
        .with_dihedrals(&dihedrals, config.method.fits_dihedrals())
        .with_calculator(config.calculator.as_ref());
    info!(
        residue = %residue_name,
        net_charge = request.net_charge,
        dihedrals = dihedrals.len(),
        method = %config.method,
        "Running parameterization engine."
    );
    let outputs = engine.parameterize(&request)?;

    stage_file(
        &outputs.structure,
        &work_dir.path().join(format!("{residue_name}.cif")),
    )?;
    stage_file(
        &outputs.parameters,
        &config.output_dir.join(format!("{residue_name}.frcmod")),
    )?;

    let outcome = postprocess(
        &capped,
        caps,
        work_dir.path(),
        &config.output_dir,
        &residue_name,
        toolchain,
        config.match_tolerance,
        reporter,
    )?;

    Ok(ResidueResult {
        input: path.to_path_buf(),
        residue_name,
        outcome,
    })
}

/// Parameterizes every residue structure in `files`, in order.
///
/// Each residue runs in its own temporary working directory, removed however the residue
/// ends. Under [`FailurePolicy::FailFast`] the first failure is returned and the remaining
/// files are not processed; under [`FailurePolicy::Continue`] failures are collected in the
/// report.
///
/// # Errors
///
/// Returns an error if the output directory cannot be created, or the first residue failure
/// when failing fast.
#[instrument(skip_all, name = "parameterize_workflow")]
pub fn run(
    files: &[PathBuf],
    config: &ParameterizationConfig,
    engine: &dyn ParameterizationEngine,
    toolchain: &dyn TemplateToolchain,
    caps: &CapFragments,
    reporter: &ProgressReporter,
) -> Result<BatchReport, EngineError> {
    fs::create_dir_all(&config.output_dir).map_err(|e| EngineError::io(&config.output_dir, e))?;
    info!(
        residues = files.len(),
        output_dir = %config.output_dir.display(),
        "Starting parameterization batch."
    );

    reporter.report(Progress::BatchStart {
        total_residues: files.len() as u64,
    });
    let mut report = BatchReport::default();

    for (index, path) in files.iter().enumerate() {
        reporter.report(Progress::ResidueStart {
            index,
            path: path.clone(),
        });
        let result = parameterize_residue(path, config, engine, toolchain, caps, reporter);
        reporter.report(Progress::ResidueFinish {
            succeeded: result.is_ok(),
        });

        match result {
            Ok(done) => {
                info!(
                    residue = %done.residue_name,
                    parameters = %done.outcome.parameters.display(),
                    template = %done.outcome.template.display(),
                    "Residue parameterized."
                );
                report.succeeded.push(done);
            }
            Err(error) => match config.failure_policy {
                FailurePolicy::FailFast => {
                    reporter.report(Progress::BatchFinish);
                    return Err(error);
                }
                FailurePolicy::Continue => {
                    warn!(file = %path.display(), %error, "Residue failed; continuing with the batch.");
                    report.failed.push(ResidueFailure {
                        input: path.clone(),
                        error,
                    });
                }
            },
        }
    }

    reporter.report(Progress::BatchFinish);
    info!(
        succeeded = report.succeeded.len(),
        failed = report.failed.len(),
        "Parameterization batch finished."
    );
    Ok(report)
}
