use super::config::{NnpCalculator, ToolPaths};
use crate::core::models::structure::MolecularStructure;
use std::env;
use std::ffi::{OsStr, OsString};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, instrument, trace};

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Subdirectory of the engine output directory holding its GAFF2 results.
pub const ENGINE_FORCEFIELD_DIR: &str = "GAFF2";

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Program '{0}' was not found on PATH")]
    NotFound(String),
    #[error("Failed to launch '{program}': {source}")]
    Launch {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("'{program}' exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },
    #[error("'{program}' did not finish within {seconds:.1} s")]
    TimedOut { program: String, seconds: f64 },
    #[error("'{program}' did not produce the expected file '{path}'")]
    MissingOutput { program: String, path: PathBuf },
    #[error("I/O error while running an external program: {0}")]
    Io(#[from] io::Error),
}

/// Result of looking an external program up before any work is started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolAvailability {
    Available(PathBuf),
    Missing { program: String },
}

impl ToolAvailability {
    /// Resolves `program` against the process `PATH`.
    pub fn check(program: &str) -> Self {
        Self::check_in(program, env::var_os("PATH").as_deref())
    }

    /// Resolves `program` against an explicit search path.
    ///
    /// Names containing a directory component are checked as given.
    pub fn check_in(program: &str, search_path: Option<&OsStr>) -> Self {
        let candidate = Path::new(program);
        if candidate.components().count() > 1 {
            return if is_executable(candidate) {
                Self::Available(candidate.to_path_buf())
            } else {
                Self::Missing {
                    program: program.to_string(),
                }
            };
        }

        search_path
            .into_iter()
            .flat_map(env::split_paths)
            .flat_map(|dir| executable_names(program).map(move |name| dir.join(name)))
            .find(|path| is_executable(path))
            .map_or_else(
                || Self::Missing {
                    program: program.to_string(),
                },
                Self::Available,
            )
    }

    pub fn require(self) -> Result<PathBuf, ToolError> {
        match self {
            Self::Available(path) => Ok(path),
            Self::Missing { program } => Err(ToolError::NotFound(program)),
        }
    }
}

fn executable_names(program: &str) -> impl Iterator<Item = String> {
    let mut names = vec![program.to_string()];
    if cfg!(windows) && Path::new(program).extension().is_none() {
        names.push(format!("{program}.exe"));
    }
    names.into_iter()
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

fn display_name(program: &Path) -> String {
    program
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| program.display().to_string())
}

fn drain<R: Read + Send + 'static>(mut reader: R) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn collect(handle: Option<JoinHandle<String>>) -> String {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}

fn wait(child: &mut Child, program: &str, timeout: Option<Duration>) -> Result<ExitStatus, ToolError> {
    let Some(limit) = timeout else {
        return Ok(child.wait()?);
    };
    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        if start.elapsed() >= limit {
            let _ = child.kill();
            let _ = child.wait();
            return Err(ToolError::TimedOut {
                program: program.to_string(),
                seconds: limit.as_secs_f64(),
            });
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Runs an external program to completion in `cwd`.
///
/// A non-zero exit status is a [`ToolError::Failed`] carrying the program's stderr. With a
/// timeout, the child is killed once the limit elapses.
#[instrument(skip_all, fields(program = %program.display()))]
pub fn run_tool(
    program: &Path,
    args: &[OsString],
    cwd: &Path,
    timeout: Option<Duration>,
) -> Result<(), ToolError> {
    let name = display_name(program);
    debug!(?args, cwd = %cwd.display(), "Launching external program.");

    let mut child = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| ToolError::Launch {
            program: name.clone(),
            source,
        })?;

    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);
    let status = wait(&mut child, &name, timeout)?;
    let stdout = collect(stdout);
    let stderr = collect(stderr);
    trace!(%stdout, "External program output.");

    if status.success() {
        Ok(())
    } else {
        Err(ToolError::Failed {
            program: name,
            status: status.to_string(),
            stderr: stderr.trim().to_string(),
        })
    }
}

fn require_output(program: &Path, path: &Path) -> Result<(), ToolError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(ToolError::MissingOutput {
            program: display_name(program),
            path: path.to_path_buf(),
        })
    }
}

/// Everything the parameterization engine needs for one capped residue.
#[derive(Debug, Clone)]
pub struct EngineRequest<'a> {
    pub structure: &'a MolecularStructure,
    /// The capped structure as written to disk for out-of-process engines.
    pub structure_file: &'a Path,
    pub residue_name: &'a str,
    pub net_charge: i32,
    pub forcefield: &'static str,
    pub charge_method: &'static str,
    pub min_method: &'static str,
    pub dihedral_fit_method: &'static str,
    pub dihedral_opt_method: &'static str,
    /// Rotatable dihedrals to fit, named `A-B-C-D` by atom names.
    pub dihedrals: &'a [String],
    pub fit_dihedrals: bool,
    pub calculator: Option<&'a NnpCalculator>,
    pub output_dir: &'a Path,
}

impl<'a> EngineRequest<'a> {
    pub fn new(
        structure: &'a MolecularStructure,
        structure_file: &'a Path,
        residue_name: &'a str,
        output_dir: &'a Path,
    ) -> Self {
        Self {
            structure,
            structure_file,
            residue_name,
            net_charge: structure.net_formal_charge(),
            forcefield: "GAFF2",
            charge_method: "AM1-BCC",
            min_method: "mm",
            dihedral_fit_method: "iterative",
            dihedral_opt_method: "mm",
            dihedrals: &[],
            fit_dihedrals: false,
            calculator: None,
            output_dir,
        }
    }

    pub fn with_dihedrals(mut self, dihedrals: &'a [String], fit: bool) -> Self {
        self.dihedrals = dihedrals;
        self.fit_dihedrals = fit;
        self
    }

    pub fn with_calculator(mut self, calculator: Option<&'a NnpCalculator>) -> Self {
        self.calculator = calculator;
        self
    }
}

/// Files the engine leaves behind for one residue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOutputs {
    /// The re-parameterized capped structure (`<resn>-orig.cif`).
    pub structure: PathBuf,
    /// The force field modification file (`<resn>.frcmod`).
    pub parameters: PathBuf,
}

impl EngineOutputs {
    /// Paths at which the engine writes its results below `output_dir`.
    pub fn expected(output_dir: &Path, residue_name: &str) -> Self {
        let dir = output_dir.join("parameters").join(ENGINE_FORCEFIELD_DIR);
        Self {
            structure: dir.join(format!("{residue_name}-orig.cif")),
            parameters: dir.join(format!("{residue_name}.frcmod")),
        }
    }
}

/// Derives atom types, partial charges and bonded parameters for a capped residue.
pub trait ParameterizationEngine {
    fn parameterize(&self, request: &EngineRequest<'_>) -> Result<EngineOutputs, ToolError>;
}

/// Generates the Amber connectivity record and residue template files.
pub trait TemplateToolchain {
    /// Converts a mol2 structure into an antechamber connectivity (`.ac`) file.
    fn generate_connectivity(&self, mol2: &Path, ac: &Path, net_charge: i32)
    -> Result<(), ToolError>;

    /// Builds the prep template for `residue_name` from a connectivity file and a main-chain
    /// control file.
    fn generate_template(
        &self,
        ac: &Path,
        main_chain: &Path,
        prepi: &Path,
        residue_name: &str,
    ) -> Result<(), ToolError>;
}

/// The `parameterize` command-line engine.
#[derive(Debug, Clone)]
pub struct ParameterizeCli {
    program: PathBuf,
    timeout: Option<Duration>,
}

impl ParameterizeCli {
    pub fn new(program: PathBuf, timeout: Option<Duration>) -> Self {
        Self { program, timeout }
    }

    pub fn locate(tools: &ToolPaths, timeout: Option<Duration>) -> Result<Self, ToolError> {
        let program = ToolAvailability::check(&tools.parameterize).require()?;
        Ok(Self::new(program, timeout))
    }

    fn arguments(request: &EngineRequest<'_>) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            request.structure_file.into(),
            "--charge".into(),
            request.net_charge.to_string().into(),
            "--forcefield".into(),
            request.forcefield.into(),
            "--charge-type".into(),
            request.charge_method.into(),
            "--min-type".into(),
            request.min_method.into(),
            "--dihed-fit-type".into(),
            request.dihedral_fit_method.into(),
            "--dihed-opt-type".into(),
            request.dihedral_opt_method.into(),
        ];
        for dihedral in request.dihedrals {
            args.push("--dihedral".into());
            args.push(dihedral.into());
        }
        if !request.fit_dihedrals {
            args.push("--no-dihed".into());
        }
        if let Some(calculator) = request.calculator {
            args.push("--nnp".into());
            args.push(calculator.name.as_str().into());
        }
        args.push("--outdir".into());
        args.push(request.output_dir.into());
        args
    }
}

impl ParameterizationEngine for ParameterizeCli {
    fn parameterize(&self, request: &EngineRequest<'_>) -> Result<EngineOutputs, ToolError> {
        run_tool(
            &self.program,
            &Self::arguments(request),
            request.output_dir,
            self.timeout,
        )?;
        let outputs = EngineOutputs::expected(request.output_dir, request.residue_name);
        require_output(&self.program, &outputs.structure)?;
        require_output(&self.program, &outputs.parameters)?;
        Ok(outputs)
    }
}

/// antechamber and prepgen from AmberTools.
#[derive(Debug, Clone)]
pub struct AmberTools {
    antechamber: PathBuf,
    prepgen: PathBuf,
    timeout: Option<Duration>,
}

impl AmberTools {
    pub fn new(antechamber: PathBuf, prepgen: PathBuf, timeout: Option<Duration>) -> Self {
        Self {
            antechamber,
            prepgen,
            timeout,
        }
    }

    pub fn locate(tools: &ToolPaths, timeout: Option<Duration>) -> Result<Self, ToolError> {
        Ok(Self::new(
            ToolAvailability::check(&tools.antechamber).require()?,
            ToolAvailability::check(&tools.prepgen).require()?,
            timeout,
        ))
    }

    fn connectivity_arguments(mol2: &Path, ac: &Path, net_charge: i32) -> Vec<OsString> {
        let mut args: Vec<OsString> = ["-fi", "mol2", "-fo", "ac", "-i"]
            .into_iter()
            .map(OsString::from)
            .collect();
        args.push(mol2.into());
        args.push("-o".into());
        args.push(ac.into());
        args.extend(
            ["-dr", "n", "-j", "0", "-nc"]
                .into_iter()
                .map(OsString::from),
        );
        args.push(net_charge.to_string().into());
        args.extend(["-an", "n", "-pf", "y"].into_iter().map(OsString::from));
        args
    }

    fn template_arguments(
        ac: &Path,
        main_chain: &Path,
        prepi: &Path,
        residue_name: &str,
    ) -> Vec<OsString> {
        vec![
            "-i".into(),
            ac.into(),
            "-o".into(),
            prepi.into(),
            "-f".into(),
            "prepi".into(),
            "-m".into(),
            main_chain.into(),
            "-rn".into(),
            residue_name.into(),
        ]
    }
}

fn working_dir(path: &Path) -> &Path {
    path.parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

impl TemplateToolchain for AmberTools {
    fn generate_connectivity(
        &self,
        mol2: &Path,
        ac: &Path,
        net_charge: i32,
    ) -> Result<(), ToolError> {
        run_tool(
            &self.antechamber,
            &Self::connectivity_arguments(mol2, ac, net_charge),
            working_dir(ac),
            self.timeout,
        )?;
        require_output(&self.antechamber, ac)
    }

    fn generate_template(
        &self,
        ac: &Path,
        main_chain: &Path,
        prepi: &Path,
        residue_name: &str,
    ) -> Result<(), ToolError> {
        run_tool(
            &self.prepgen,
            &Self::template_arguments(ac, main_chain, prepi, residue_name),
            working_dir(ac),
            self.timeout,
        )?;
        require_output(&self.prepgen, prepi)
    }
}
