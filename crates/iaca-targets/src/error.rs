//! Error types for target resolution.

/// Errors that can occur while resolving or instantiating a target.
#[derive(Debug, thiserror::Error)]
pub enum TargetError {
    /// The architecture tag is not one IACA can analyze.
    #[error("unsupported architecture '{tag}' (expected one of: {supported})")]
    UnsupportedArchitecture {
        /// The rejected tag.
        tag: String,
        /// Comma-separated list of accepted tags.
        supported: String,
    },

    /// LLVM has no registered target for the triple.
    #[error("LLVM target initialization failed for {triple}: {message}")]
    TargetInit {
        /// The target triple.
        triple: String,
        /// LLVM's diagnostic.
        message: String,
    },

    /// LLVM refused to build a target machine for the configuration.
    #[error("failed to create target machine for {triple} (cpu {cpu})")]
    MachineCreation {
        /// The target triple.
        triple: String,
        /// The CPU model string.
        cpu: String,
    },
}

/// Result type for target operations.
pub type Result<T> = std::result::Result<T, TargetError>;
