//! Optimization stage.

use std::fmt;
use std::str::FromStr;

use inkwell::module::Module;
use inkwell::passes::PassBuilderOptions;
use inkwell::targets::TargetMachine;
use inkwell::OptimizationLevel;

use crate::error::{AnalysisError, Result};

/// Environment variable holding the ambient optimization level (0-3).
pub const OPT_LEVEL_ENV: &str = "IACA_OPT_LEVEL";

/// Optimization level, as in `-O0` .. `-O3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum OptLevel {
    O0,
    O1,
    #[default]
    O2,
    O3,
}

impl OptLevel {
    pub fn number(self) -> u8 {
        match self {
            OptLevel::O0 => 0,
            OptLevel::O1 => 1,
            OptLevel::O2 => 2,
            OptLevel::O3 => 3,
        }
    }

    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            0 => Some(OptLevel::O0),
            1 => Some(OptLevel::O1),
            2 => Some(OptLevel::O2),
            3 => Some(OptLevel::O3),
            _ => None,
        }
    }

    /// Level from `IACA_OPT_LEVEL`, or the default.
    pub fn ambient() -> Self {
        Self::from_setting(std::env::var(OPT_LEVEL_ENV).ok().as_deref())
    }

    fn from_setting(value: Option<&str>) -> Self {
        match value {
            None => Self::default(),
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                log::warn!("ignoring {OPT_LEVEL_ENV}={raw:?}; using {}", Self::default());
                Self::default()
            }),
        }
    }

    /// The new pass manager's default pipeline for this level.
    pub fn pipeline(self) -> String {
        format!("default<O{}>", self.number())
    }

    /// Code generator level for the target machine.
    pub fn codegen_level(self) -> OptimizationLevel {
        match self {
            OptLevel::O0 => OptimizationLevel::None,
            OptLevel::O1 => OptimizationLevel::Less,
            OptLevel::O2 => OptimizationLevel::Default,
            OptLevel::O3 => OptimizationLevel::Aggressive,
        }
    }
}

impl fmt::Display for OptLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "O{}", self.number())
    }
}

impl FromStr for OptLevel {
    type Err = String;

    /// Accepts `2`, `O2` and `-O2`.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let digits = s.trim().trim_start_matches('-').trim_start_matches(['O', 'o']);
        digits
            .parse::<u8>()
            .ok()
            .and_then(Self::from_number)
            .ok_or_else(|| format!("invalid optimization level '{s}' (expected 0-3)"))
    }
}

/// Optimizes a linked module in place.
pub trait Optimizer {
    fn optimize(&self, machine: &TargetMachine, module: &Module<'_>) -> Result<()>;
}

impl<F> Optimizer for F
where
    F: Fn(&TargetMachine, &Module<'_>) -> Result<()>,
{
    fn optimize(&self, machine: &TargetMachine, module: &Module<'_>) -> Result<()> {
        self(machine, module)
    }
}

/// LLVM's standard pipeline at a given level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HostOptimizer {
    pub level: OptLevel,
}

impl HostOptimizer {
    pub fn new(level: OptLevel) -> Self {
        Self { level }
    }

    pub fn ambient() -> Self {
        Self::new(OptLevel::ambient())
    }
}

impl Optimizer for HostOptimizer {
    fn optimize(&self, machine: &TargetMachine, module: &Module<'_>) -> Result<()> {
        run_pipeline(machine, module, &self.level.pipeline())
    }
}

/// An explicit textual pass pipeline, e.g. `"instcombine,simplifycfg"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassPipeline {
    pub passes: String,
}

impl PassPipeline {
    pub fn new(passes: impl Into<String>) -> Self {
        Self {
            passes: passes.into(),
        }
    }
}

impl Optimizer for PassPipeline {
    fn optimize(&self, machine: &TargetMachine, module: &Module<'_>) -> Result<()> {
        run_pipeline(machine, module, &self.passes)
    }
}

/// Run `passes` over `module` with the machine's data layout and TTI.
pub fn run_pipeline(machine: &TargetMachine, module: &Module<'_>, passes: &str) -> Result<()> {
    module.set_triple(&machine.get_triple());
    module.set_data_layout(&machine.get_target_data().get_data_layout());

    log::debug!("running pass pipeline '{passes}'");
    module
        .run_passes(passes, machine, PassBuilderOptions::create())
        .map_err(|e| AnalysisError::OptimizationFailed {
            pipeline: passes.to_string(),
            message: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use iaca_targets::{with_target_machine, ArchTag, TargetMachineConfig};
    use inkwell::context::Context;
    use inkwell::memory_buffer::MemoryBuffer;

    const REDUNDANT: &str = "define i64 @julia_f_1(i64 %x) {\n  %a = add i64 %x, 0\n  %b = mul i64 %a, 1\n  ret i64 %b\n}\n";

    fn with_module<R>(
        ir: &str,
        level: OptLevel,
        f: impl FnOnce(&TargetMachine, &Module<'_>) -> Result<R>,
    ) -> Result<R> {
        let context = Context::create();
        let buffer = MemoryBuffer::create_from_memory_range_copy(ir.as_bytes(), "opt");
        let module = context.create_module_from_ir(buffer).unwrap();
        let config = TargetMachineConfig::for_arch(ArchTag::Skl);
        with_target_machine(&config, level.codegen_level(), |machine| f(machine, &module))
    }

    #[test]
    fn level_parsing() {
        assert_eq!("3".parse::<OptLevel>().unwrap(), OptLevel::O3);
        assert_eq!("O1".parse::<OptLevel>().unwrap(), OptLevel::O1);
        assert_eq!("-O0".parse::<OptLevel>().unwrap(), OptLevel::O0);
        assert!("4".parse::<OptLevel>().is_err());
        assert!("fast".parse::<OptLevel>().is_err());
    }

    #[test]
    fn ambient_setting_falls_back() {
        assert_eq!(OptLevel::from_setting(None), OptLevel::O2);
        assert_eq!(OptLevel::from_setting(Some("0")), OptLevel::O0);
        assert_eq!(OptLevel::from_setting(Some("bogus")), OptLevel::O2);
    }

    #[test]
    fn pipeline_names() {
        assert_eq!(OptLevel::O0.pipeline(), "default<O0>");
        assert_eq!(OptLevel::O3.to_string(), "O3");
        assert_eq!(OptLevel::O1.codegen_level(), OptimizationLevel::Less);
    }

    #[test]
    fn host_optimizer_simplifies() {
        let ir = with_module(REDUNDANT, OptLevel::O2, |machine, module| {
            HostOptimizer::new(OptLevel::O2).optimize(machine, module)?;
            Ok(module.print_to_string().to_string())
        })
        .unwrap();
        assert!(!ir.contains("add i64"));
        assert!(!ir.contains("mul i64"));
        assert!(ir.contains("target datalayout"));
    }

    #[test]
    fn level_zero_keeps_instructions() {
        let ir = with_module(REDUNDANT, OptLevel::O0, |machine, module| {
            HostOptimizer::new(OptLevel::O0).optimize(machine, module)?;
            Ok(module.print_to_string().to_string())
        })
        .unwrap();
        assert!(ir.contains("add i64 %x, 0"));
    }

    #[test]
    fn custom_pipeline_runs() {
        let ir = with_module(REDUNDANT, OptLevel::O0, |machine, module| {
            PassPipeline::new("instcombine").optimize(machine, module)?;
            Ok(module.print_to_string().to_string())
        })
        .unwrap();
        assert!(!ir.contains("mul i64"));
    }

    #[test]
    fn bad_pipeline_is_an_error() {
        let err = with_module(REDUNDANT, OptLevel::O0, |machine, module| {
            PassPipeline::new("no-such-pass").optimize(machine, module)
        })
        .unwrap_err();
        assert!(matches!(err, AnalysisError::OptimizationFailed { ref pipeline, .. } if pipeline == "no-such-pass"));
    }

    #[test]
    fn closures_are_optimizers() {
        let seen = std::cell::Cell::new(false);
        let closure = |_: &TargetMachine, module: &Module<'_>| -> Result<()> {
            seen.set(module.get_function("julia_f_1").is_some());
            Ok(())
        };
        with_module(REDUNDANT, OptLevel::O0, |machine, module| closure.optimize(machine, module))
            .unwrap();
        assert!(seen.get());
    }
}
