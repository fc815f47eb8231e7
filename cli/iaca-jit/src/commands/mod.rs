//! CLI command implementations.

pub mod analyze;
pub mod doctor;
pub mod emit;
pub mod targets;

use anyhow::{anyhow, Result};
use iaca_core::{AnalyzeOptions, HostOptimizer, OptLevel, Optimizer, PassPipeline, Signature};

use crate::CompileArgs;

impl CompileArgs {
    /// Parsed argument signature.
    pub fn signature(&self) -> Signature {
        match self.signature.parse() {
            Ok(signature) => signature,
            Err(never) => match never {},
        }
    }

    /// Options with this command's arch and level over the environment defaults.
    pub fn options(&self) -> Result<AnalyzeOptions> {
        let mut options = AnalyzeOptions {
            arch: self.arch.clone(),
            ..AnalyzeOptions::default()
        };
        if let Some(level) = &self.opt_level {
            options.opt_level = level.parse::<OptLevel>().map_err(|e| anyhow!(e))?;
        }
        Ok(options)
    }

    pub fn optimizer(&self, level: OptLevel) -> Box<dyn Optimizer> {
        match &self.passes {
            Some(passes) => Box::new(PassPipeline::new(passes.clone())),
            None => Box::new(HostOptimizer::new(level)),
        }
    }
}
