//! Target machine configuration and scoped construction.

use inkwell::targets::{
    CodeModel, InitializationConfig, RelocMode, Target, TargetMachine, TargetTriple,
};
use inkwell::OptimizationLevel;

use crate::arch::ArchTag;
use crate::error::TargetError;

/// Triple used when the host is not an x86-64 machine.
pub const DEFAULT_TRIPLE: &str = "x86_64-unknown-linux-gnu";

/// `(triple, cpu, features)` for one analysis.
///
/// Built fresh per call from an [`ArchTag`]; never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetMachineConfig {
    /// LLVM target triple.
    pub triple: String,
    /// LLVM CPU model string.
    pub cpu: String,
    /// LLVM feature string.
    pub features: String,
}

impl TargetMachineConfig {
    /// Configuration for `arch` on the host's x86-64 triple.
    pub fn for_arch(arch: ArchTag) -> Self {
        let (cpu, features) = arch.codegen();
        Self {
            triple: host_x86_triple(),
            cpu: cpu.into(),
            features: features.into(),
        }
    }
}

/// The host triple when it is x86-64, otherwise [`DEFAULT_TRIPLE`].
///
/// The analysis markers are x86 instructions, so other hosts still
/// cross-compile for x86-64.
pub fn host_x86_triple() -> String {
    let host = TargetMachine::get_default_triple();
    let host = host.as_str().to_string_lossy();
    if host.starts_with("x86_64") {
        host.into_owned()
    } else {
        DEFAULT_TRIPLE.to_string()
    }
}

/// Create a target machine for `config` and run `f` with it.
///
/// The machine is dropped, releasing its native handle, when this function
/// returns, whether `f` succeeded, failed or panicked.
pub fn with_target_machine<R, E, F>(
    config: &TargetMachineConfig,
    opt_level: OptimizationLevel,
    f: F,
) -> Result<R, E>
where
    F: FnOnce(&TargetMachine) -> Result<R, E>,
    E: From<TargetError>,
{
    Target::initialize_x86(&InitializationConfig::default());

    let triple = TargetTriple::create(&config.triple);
    let target = Target::from_triple(&triple).map_err(|e| TargetError::TargetInit {
        triple: config.triple.clone(),
        message: e.to_string(),
    })?;

    let machine = target
        .create_target_machine(
            &triple,
            &config.cpu,
            &config.features,
            opt_level,
            RelocMode::PIC,
            CodeModel::Default,
        )
        .ok_or_else(|| TargetError::MachineCreation {
            triple: config.triple.clone(),
            cpu: config.cpu.clone(),
        })?;

    f(&machine)
}
