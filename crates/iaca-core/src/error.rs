//! Analysis errors.

use std::path::PathBuf;
use std::process::ExitStatus;

use iaca_targets::TargetError;
use thiserror::Error;

/// Errors that abort an analysis.
///
/// Every stage fails fast; nothing is retried.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Target(#[from] TargetError),

    #[error("'{function}' is a builtin and cannot be specialized")]
    NotSpecializable { function: String },

    #[error("no applicable method for {function}{signature}")]
    NoApplicableMethod { function: String, signature: String },

    #[error("IR generation failed for {function}{signature}: {message}")]
    IrGenerationFailed {
        function: String,
        signature: String,
        message: String,
    },

    #[error("no call wrapper with prefix '{prefix}' among definitions [{definitions}]")]
    NoWrapperFound { prefix: String, definitions: String },

    #[error("multiple call wrappers with prefix '{prefix}': [{candidates}]")]
    AmbiguousWrapper { prefix: String, candidates: String },

    #[error("'{name}' does not match '{prefix}<tag>_<n>'")]
    UnparsableName { name: String, prefix: String },

    #[error("module has no definition left to use as the entry for tag '{tag}'")]
    NoEntryFound { tag: String },

    #[error("linking dependency module '{module}' failed: {message}")]
    LinkConflict { module: String, message: String },

    #[error("optimization pipeline '{pipeline}' failed: {message}")]
    OptimizationFailed { pipeline: String, message: String },

    #[error("object emission to {} failed: {message}", path.display())]
    EmissionFailed { path: PathBuf, message: String },

    #[error("analyzer executable not found: {reason}")]
    ExecutableNotFound { reason: String },

    #[error("analyzer exited with {status}: {stderr}")]
    AnalyzerFailed { status: ExitStatus, stderr: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for analysis operations.
pub type Result<T> = std::result::Result<T, AnalysisError>;
