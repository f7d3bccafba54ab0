use std::io;
use std::path::PathBuf;
use thiserror::Error;

use super::config::ConfigError;
use super::tools::ToolError;
use crate::core::io::frcmod::FrcmodError;
use crate::core::io::prepi::TemplateError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Required external program '{program}' is not available")]
    MissingDependency { program: String },

    #[error("Structural mismatch in residue {residue}: {reason}")]
    StructuralMismatch { residue: String, reason: String },

    #[error("External tool failure: {0}")]
    ExternalTool(ToolError),

    #[error("I/O error at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to process structure file '{path}': {message}")]
    Structure { path: PathBuf, message: String },

    #[error("Failed to process parameter file '{path}': {source}")]
    Parameters {
        path: PathBuf,
        #[source]
        source: FrcmodError,
    },

    #[error("Failed to process residue template '{path}': {source}")]
    Template {
        path: PathBuf,
        #[source]
        source: TemplateError,
    },
}

impl EngineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn structure(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Structure {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub(crate) fn mismatch(residue: &str, reason: impl ToString) -> Self {
        Self::StructuralMismatch {
            residue: residue.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<ToolError> for EngineError {
    fn from(err: ToolError) -> Self {
        match err {
            ToolError::NotFound(program) => Self::MissingDependency { program },
            other => Self::ExternalTool(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_program_becomes_missing_dependency() {
        let err: EngineError = ToolError::NotFound("parameterize".to_string()).into();
        assert!(matches!(
            err,
            EngineError::MissingDependency { program } if program == "parameterize"
        ));
    }

    #[test]
    fn other_tool_errors_stay_external_tool_failures() {
        let err: EngineError = ToolError::MissingOutput {
            program: "prepgen".to_string(),
            path: PathBuf::from("XYZ.prepi"),
        }
        .into();
        assert!(matches!(err, EngineError::ExternalTool(ToolError::MissingOutput { .. })));
    }
}
