use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "Tony Kan",
    version,
    about = "ncaa - Amber force-field parameters and residue templates for non-canonical amino acids.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Parameterize one or more residue structures.
    Run(RunArgs),
}

/// Arguments for the `run` subcommand.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Residue structure files (.cif or .mol2), processed in order.
    #[arg(required = true, value_name = "FILES")]
    pub files: Vec<PathBuf>,

    /// Directory receiving the .frcmod and .prepi files.
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Parameterization method: 'gaff2' or 'ani-2x'.
    #[arg(short, long, value_name = "METHOD")]
    pub method: Option<String>,

    /// Neural network potential used for dihedral fitting (required by 'ani-2x').
    #[arg(long, value_name = "NAME")]
    pub nnp: Option<String>,

    /// Path to a configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Keep processing the remaining residues after one fails.
    #[arg(long)]
    pub keep_going: bool,

    /// Kill an external program that runs longer than this many seconds.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Largest fraction of atoms allowed to stay unmatched when pairing engine output with the input.
    #[arg(long, value_name = "FLOAT")]
    pub match_tolerance: Option<f64>,

    /// ACE cap fragment (chem-comp CIF) replacing the bundled one.
    #[arg(long, value_name = "PATH", requires = "nme_cap")]
    pub ace_cap: Option<PathBuf>,

    /// NME cap fragment (chem-comp CIF) replacing the bundled one.
    #[arg(long, value_name = "PATH", requires = "ace_cap")]
    pub nme_cap: Option<PathBuf>,
}
