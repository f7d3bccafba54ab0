use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Default unmatched fraction tolerated when pairing engine output atoms with the input.
pub const DEFAULT_MATCH_TOLERANCE: f64 = 0.5;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Unknown parameterization method '{0}' (expected 'gaff2' or 'ani-2x')")]
    UnknownMethod(String),
    #[error("Method '{0}' requires a neural network potential calculator")]
    MissingCalculator(ParameterizationMethod),
    #[error("Invalid value for {parameter}: {reason}")]
    InvalidValue {
        parameter: &'static str,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParameterizationMethod {
    /// GAFF2 atom types and charges without dihedral refitting.
    #[serde(rename = "gaff2")]
    Gaff2,
    /// GAFF2 with dihedrals fitted against the ANI-2x neural network potential.
    #[serde(rename = "ani-2x")]
    Ani2x,
}

impl ParameterizationMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gaff2 => "gaff2",
            Self::Ani2x => "ani-2x",
        }
    }

    pub fn requires_calculator(self) -> bool {
        matches!(self, Self::Ani2x)
    }

    /// Dihedral fitting runs for every method except plain GAFF2.
    pub fn fits_dihedrals(self) -> bool {
        self != Self::Gaff2
    }
}

impl FromStr for ParameterizationMethod {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gaff2" => Ok(Self::Gaff2),
            "ani-2x" => Ok(Self::Ani2x),
            _ => Err(ConfigError::UnknownMethod(s.to_string())),
        }
    }
}

impl fmt::Display for ParameterizationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Neural network potential the engine evaluates during dihedral fitting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NnpCalculator {
    pub name: String,
}

impl NnpCalculator {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// What happens to the rest of a batch when one residue fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Stop at the first failing residue and return its error.
    #[default]
    FailFast,
    /// Record the failure and continue with the next residue.
    Continue,
}

/// Executable names of the external programs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    pub parameterize: String,
    pub antechamber: String,
    pub prepgen: String,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            parameterize: "parameterize".to_string(),
            antechamber: "antechamber".to_string(),
            prepgen: "prepgen".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParameterizationConfig {
    pub method: ParameterizationMethod,
    pub calculator: Option<NnpCalculator>,
    pub output_dir: PathBuf,
    pub failure_policy: FailurePolicy,
    pub tool_timeout: Option<Duration>,
    pub match_tolerance: f64,
    pub tools: ToolPaths,
}

#[derive(Default)]
pub struct ParameterizationConfigBuilder {
    method: Option<ParameterizationMethod>,
    calculator: Option<NnpCalculator>,
    output_dir: Option<PathBuf>,
    failure_policy: Option<FailurePolicy>,
    tool_timeout: Option<Duration>,
    match_tolerance: Option<f64>,
    tools: Option<ToolPaths>,
}

impl ParameterizationConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: ParameterizationMethod) -> Self {
        self.method = Some(method);
        self
    }
    pub fn calculator(mut self, calculator: NnpCalculator) -> Self {
        self.calculator = Some(calculator);
        self
    }
    pub fn output_dir(mut self, path: PathBuf) -> Self {
        self.output_dir = Some(path);
        self
    }
    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = Some(policy);
        self
    }
    pub fn tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = Some(timeout);
        self
    }
    pub fn match_tolerance(mut self, tolerance: f64) -> Self {
        self.match_tolerance = Some(tolerance);
        self
    }
    pub fn tools(mut self, tools: ToolPaths) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn build(self) -> Result<ParameterizationConfig, ConfigError> {
        let method = self.method.unwrap_or(ParameterizationMethod::Gaff2);
        if method.requires_calculator() && self.calculator.is_none() {
            return Err(ConfigError::MissingCalculator(method));
        }

        let match_tolerance = self.match_tolerance.unwrap_or(DEFAULT_MATCH_TOLERANCE);
        if !(0.0..=1.0).contains(&match_tolerance) {
            return Err(ConfigError::InvalidValue {
                parameter: "match_tolerance",
                reason: format!("{match_tolerance} is outside [0, 1]"),
            });
        }
        if self.tool_timeout.is_some_and(|t| t.is_zero()) {
            return Err(ConfigError::InvalidValue {
                parameter: "tool_timeout",
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(ParameterizationConfig {
            method,
            calculator: self.calculator,
            output_dir: self
                .output_dir
                .ok_or(ConfigError::MissingParameter("output_dir"))?,
            failure_policy: self.failure_policy.unwrap_or_default(),
            tool_timeout: self.tool_timeout,
            match_tolerance,
            tools: self.tools.unwrap_or_default(),
        })
    }
}
