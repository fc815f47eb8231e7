//! `iaca-jit targets` — supported architecture tags.

use std::io::Write;

use anyhow::Result;
use iaca_targets::{ArchTag, TargetMachineConfig};

pub fn run() -> Result<()> {
    list(&mut std::io::stdout().lock())
}

fn list(out: &mut impl Write) -> Result<()> {
    writeln!(out, "Supported architectures:")?;
    writeln!(out)?;
    for arch in ArchTag::ALL {
        let config = TargetMachineConfig::for_arch(arch);
        let marker = if arch == ArchTag::default() { " (default)" } else { "" };
        writeln!(out, "  {:<5} {:<16} {}{marker}", arch, config.cpu, config.features)?;
    }
    writeln!(out)?;
    writeln!(
        out,
        "Triple: {}",
        TargetMachineConfig::for_arch(ArchTag::default()).triple
    )?;
    Ok(())
}
