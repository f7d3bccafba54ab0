use crate::cli::RunArgs;
use crate::error::{CliError, Result};
use ncaaparam::engine::config::{
    FailurePolicy, NnpCalculator, ParameterizationConfig, ParameterizationConfigBuilder,
    ParameterizationMethod, ToolPaths,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct FileToolsConfig {
    parameterize: Option<String>,
    antechamber: Option<String>,
    prepgen: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct FileCapsConfig {
    ace: Option<PathBuf>,
    nme: Option<PathBuf>,
}

/// The TOML configuration file. Every key is optional; command-line flags take precedence.
#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileConfig {
    method: Option<ParameterizationMethod>,
    nnp: Option<String>,
    output_dir: Option<PathBuf>,
    failure_policy: Option<FailurePolicy>,
    timeout_secs: Option<u64>,
    match_tolerance: Option<f64>,
    tools: Option<FileToolsConfig>,
    caps: Option<FileCapsConfig>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    fn from_toml(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

/// Custom ACE and NME cap fragment files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapPaths {
    pub ace: PathBuf,
    pub nme: PathBuf,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub core: ParameterizationConfig,
    pub caps: Option<CapPaths>,
}

/// Merges the optional configuration file with the command-line flags.
pub fn build_config(args: &RunArgs) -> Result<AppConfig> {
    let file = match &args.config {
        Some(path) => FileConfig::from_file(path)?,
        None => FileConfig::default(),
    };
    merge(file, args)
}

fn merge(file: FileConfig, args: &RunArgs) -> Result<AppConfig> {
    let method = match &args.method {
        Some(name) => name.parse::<ParameterizationMethod>()?,
        None => file.method.unwrap_or(ParameterizationMethod::Gaff2),
    };

    let output_dir = args
        .output_dir
        .clone()
        .or(file.output_dir)
        .ok_or_else(|| {
            CliError::Config(
                "no output directory given; pass --output-dir or set 'output-dir'".to_string(),
            )
        })?;

    let failure_policy = if args.keep_going {
        FailurePolicy::Continue
    } else {
        file.failure_policy.unwrap_or_default()
    };

    let file_tools = file.tools.unwrap_or_default();
    let defaults = ToolPaths::default();
    let tools = ToolPaths {
        parameterize: file_tools.parameterize.unwrap_or(defaults.parameterize),
        antechamber: file_tools.antechamber.unwrap_or(defaults.antechamber),
        prepgen: file_tools.prepgen.unwrap_or(defaults.prepgen),
    };

    let mut builder = ParameterizationConfigBuilder::new()
        .method(method)
        .output_dir(output_dir)
        .failure_policy(failure_policy)
        .tools(tools);
    if let Some(name) = args.nnp.clone().or(file.nnp) {
        builder = builder.calculator(NnpCalculator::new(name));
    }
    if let Some(secs) = args.timeout.or(file.timeout_secs) {
        builder = builder.tool_timeout(Duration::from_secs(secs));
    }
    if let Some(tolerance) = args.match_tolerance.or(file.match_tolerance) {
        builder = builder.match_tolerance(tolerance);
    }
    let core = builder.build()?;

    let file_caps = file.caps.unwrap_or_default();
    let caps = match (
        args.ace_cap.clone().or(file_caps.ace),
        args.nme_cap.clone().or(file_caps.nme),
    ) {
        (Some(ace), Some(nme)) => Some(CapPaths { ace, nme }),
        (None, None) => None,
        _ => {
            return Err(CliError::Config(
                "custom cap fragments need both an ACE and an NME file".to_string(),
            ));
        }
    };

    Ok(AppConfig { core, caps })
}
