//! `iaca-jit emit` — write the object (or IR) that would be analyzed.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use iaca_core::{build_llvm_ir, build_object};

use crate::{table, CompileArgs};

pub fn run(args: &CompileArgs, output: Option<&Path>, llvm_ir: bool) -> Result<()> {
    let methods = table::load(&args.table)?;
    let function = table::function(&methods, &args.function)?;
    let signature = args.signature();
    let options = args.options()?;
    let optimizer = args.optimizer(options.opt_level);

    if llvm_ir {
        let (ir, entry) =
            build_llvm_ir(&methods, &function, &signature, &options, optimizer.as_ref())
                .with_context(|| format!("compiling {}{signature} failed", args.function))?;
        match output {
            Some(path) => std::fs::write(path, &ir)
                .with_context(|| format!("failed to write {}", path.display()))?,
            None => print!("{ir}"),
        }
        eprintln!("entry: {entry}");
        return Ok(());
    }

    let path = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(format!("{}.o", args.function)));
    let artifact = build_object(
        &methods,
        &function,
        &signature,
        &options,
        optimizer.as_ref(),
        &path,
    )
    .with_context(|| format!("compiling {}{signature} failed", args.function))?;

    if artifact.wrapper_uses > 0 {
        eprintln!(
            "warning: {} reference(s) to the call wrapper were replaced with null",
            artifact.wrapper_uses
        );
    }
    println!(
        "{} ({} bytes, {}, entry {})",
        artifact.path.display(),
        artifact.size_bytes,
        artifact.arch,
        artifact.entry_symbol
    );
    Ok(())
}
