//! `iaca-jit doctor` — environment diagnostics.

use std::ffi::OsString;
use std::io::Write;

use anyhow::Result;
use iaca_core::{AnalyzerConfig, OptLevel, IACA_PATH_ENV, OPT_LEVEL_ENV};
use iaca_targets::{with_target_machine, ArchTag, TargetError, TargetMachineConfig};

/// Print analyzer and LLVM status.
pub fn run() -> Result<()> {
    report(
        &mut std::io::stdout().lock(),
        std::env::var_os(IACA_PATH_ENV),
        OptLevel::ambient(),
    )
}

fn report(out: &mut impl Write, iaca_path: Option<OsString>, level: OptLevel) -> Result<()> {
    writeln!(out, "=== iaca-jit doctor ===")?;
    writeln!(out)?;
    writeln!(out, "Version: {}", env!("CARGO_PKG_VERSION"))?;
    writeln!(out)?;

    writeln!(out, "--- Analyzer ---")?;
    match &iaca_path {
        Some(value) => writeln!(out, "  {IACA_PATH_ENV}: {}", value.to_string_lossy())?,
        None => writeln!(out, "  {IACA_PATH_ENV}: (unset)")?,
    }
    match AnalyzerConfig::from_lookup(|_| iaca_path.clone()).resolve() {
        Ok(path) => writeln!(out, "  executable: {}", path.display())?,
        Err(e) => writeln!(out, "  executable: {e}")?,
    }
    writeln!(out)?;

    writeln!(out, "--- Optimization ---")?;
    writeln!(out, "  {OPT_LEVEL_ENV}: {level}")?;
    writeln!(out)?;

    writeln!(out, "--- LLVM targets ---")?;
    for arch in ArchTag::ALL {
        let config = TargetMachineConfig::for_arch(arch);
        let status =
            with_target_machine::<_, TargetError, _>(&config, level.codegen_level(), |_| Ok(()));
        match status {
            Ok(()) => writeln!(out, "  {arch}: {} on {}", config.cpu, config.triple)?,
            Err(e) => writeln!(out, "  {arch}: unavailable ({e})")?,
        }
    }

    Ok(())
}
