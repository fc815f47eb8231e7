//! Invocation of the external IACA binary.

use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

use iaca_targets::ArchTag;

use crate::error::{AnalysisError, Result};

/// Environment variable overriding the analyzer executable.
pub const IACA_PATH_ENV: &str = "IACA_PATH";
/// Executable looked up on `PATH` when no override is set.
pub const DEFAULT_ANALYZER: &str = "iaca";

/// Where an executable override came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PathSource {
    /// Set by the caller.
    #[default]
    Explicit,
    /// Read from [`IACA_PATH_ENV`].
    Environment,
}

/// Where to find the analyzer and what to pass it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalyzerConfig {
    /// Explicit executable (path or bare name); `None` means [`DEFAULT_ANALYZER`].
    pub path_override: Option<OsString>,
    pub source: PathSource,
    /// Extra arguments placed before the object path.
    pub extra_args: Vec<String>,
}

/// What the analyzer printed.
#[derive(Debug, Clone)]
pub struct AnalyzerOutput {
    pub program: PathBuf,
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl AnalyzerConfig {
    /// Configuration from `IACA_PATH`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var_os(key))
    }

    /// Configuration from `IACA_PATH` as reported by `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<OsString>) -> Self {
        let path_override = lookup(IACA_PATH_ENV);
        let source = match path_override {
            Some(_) => PathSource::Environment,
            None => PathSource::Explicit,
        };
        Self {
            path_override,
            source,
            extra_args: Vec::new(),
        }
    }

    pub fn with_path(path: impl Into<OsString>) -> Self {
        Self {
            path_override: Some(path.into()),
            source: PathSource::Explicit,
            extra_args: Vec::new(),
        }
    }

    /// Reject an override that is set but empty.
    pub fn validate(&self) -> Result<()> {
        match &self.path_override {
            Some(path) if path.is_empty() => Err(AnalysisError::ExecutableNotFound {
                reason: match self.source {
                    PathSource::Environment => format!("{IACA_PATH_ENV} is set but empty"),
                    PathSource::Explicit => "analyzer path override is empty".to_string(),
                },
            }),
            _ => Ok(()),
        }
    }

    /// Resolve the executable to run.
    pub fn resolve(&self) -> Result<PathBuf> {
        self.validate()?;
        let candidate = self
            .path_override
            .clone()
            .unwrap_or_else(|| OsString::from(DEFAULT_ANALYZER));
        which::which(&candidate).map_err(|e| AnalysisError::ExecutableNotFound {
            reason: format!("{}: {e}", candidate.to_string_lossy()),
        })
    }

    /// Run the analyzer over `object` for `arch`, blocking until it exits.
    pub fn run(&self, arch: ArchTag, object: &Path) -> Result<AnalyzerOutput> {
        let program = self.resolve()?;
        log::debug!(
            "running {} -arch {arch} {}",
            program.display(),
            object.display()
        );

        let output = Command::new(&program)
            .arg("-arch")
            .arg(arch.as_str())
            .args(&self.extra_args)
            .arg(object)
            .output()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound | ErrorKind::PermissionDenied => {
                    AnalysisError::ExecutableNotFound {
                        reason: format!("{}: {e}", program.display()),
                    }
                }
                _ => AnalysisError::Io(e),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if !output.status.success() {
            return Err(AnalysisError::AnalyzerFailed {
                status: output.status,
                stderr,
            });
        }

        Ok(AnalyzerOutput {
            program,
            status: output.status,
            stdout,
            stderr,
        })
    }
}
