//! The end-to-end analysis pipeline.

use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::sync::Arc;

use iaca_targets::{with_target_machine, ArchTag, TargetMachineConfig};
use inkwell::context::Context;
use inkwell::module::Module;
use inkwell::targets::TargetMachine;

use crate::analyzer::AnalyzerConfig;
use crate::emit::{emit_llvm_ir, emit_object};
use crate::entry::{resolve_entry, EntryMatch, NamingConvention};
use crate::error::Result;
use crate::extract::extract;
use crate::link::{assign_unique_name, link_dependencies, SymbolCounter};
use crate::optimize::{HostOptimizer, OptLevel, Optimizer};
use crate::specialize::{FunctionRef, Signature, Specializer};

/// Settings for one analysis.
#[derive(Debug, Clone)]
pub struct AnalyzeOptions {
    /// IACA architecture tag; checked before any other work.
    pub arch: String,
    /// Level for the default optimizer and for code generation.
    pub opt_level: OptLevel,
    pub naming: NamingConvention,
    pub analyzer: AnalyzerConfig,
    /// Parent of the scratch directory; the system temp dir if `None`.
    pub scratch_root: Option<PathBuf>,
    /// Counter for entry names; the process-wide one if `None`.
    pub symbols: Option<Arc<SymbolCounter>>,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        Self {
            arch: ArchTag::default().to_string(),
            opt_level: OptLevel::ambient(),
            naming: NamingConvention::default(),
            analyzer: AnalyzerConfig::from_env(),
            scratch_root: None,
            symbols: None,
        }
    }
}

impl AnalyzeOptions {
    fn symbols(&self) -> &SymbolCounter {
        self.symbols
            .as_deref()
            .unwrap_or_else(|| SymbolCounter::global())
    }
}

/// An object file produced for one method instance.
#[derive(Debug, Clone)]
pub struct ObjectArtifact {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub arch: ArchTag,
    /// Final, process-unique entry symbol.
    pub entry_symbol: String,
    pub entry_match: EntryMatch,
    /// IR references to the call wrapper that were nulled out.
    pub wrapper_uses: usize,
}

/// Outcome of a successful analysis.
#[derive(Debug, Clone)]
pub struct AnalysisReport {
    pub arch: ArchTag,
    pub entry_symbol: String,
    pub entry_match: EntryMatch,
    pub wrapper_uses: usize,
    pub status: ExitStatus,
    /// The analyzer's report.
    pub stdout: String,
    pub stderr: String,
}

/// A linked, uniquely named entry ready for the target machine.
struct Linked {
    entry_symbol: String,
    entry_match: EntryMatch,
    wrapper_uses: usize,
}

/// Run extraction, entry resolution, linking and optimization, then hand
/// the module to `finish` while the target machine is still alive.
fn with_optimized_module<S, R, F>(
    arch: ArchTag,
    specializer: &S,
    function: &FunctionRef,
    signature: &Signature,
    options: &AnalyzeOptions,
    optimizer: &dyn Optimizer,
    finish: F,
) -> Result<(Linked, R)>
where
    S: Specializer + ?Sized,
    F: FnOnce(&TargetMachine, &Module<'_>) -> Result<R>,
{
    let context = Context::create();
    let raw = extract(specializer, &context, function, signature)?;
    let resolution = resolve_entry(&raw.module, &options.naming)?;
    link_dependencies(&raw.module, raw.dependencies)?;
    let entry_symbol = assign_unique_name(resolution.entry, options.symbols());

    let config = TargetMachineConfig::for_arch(arch);
    let result = with_target_machine(&config, options.opt_level.codegen_level(), |machine| {
        optimizer.optimize(machine, &raw.module)?;
        finish(machine, &raw.module)
    })?;

    let linked = Linked {
        entry_symbol,
        entry_match: resolution.matched,
        wrapper_uses: resolution.wrapper_uses,
    };
    Ok((linked, result))
}

/// Compile `function` for `signature` down to an object file at `output`.
///
/// Runs every stage except the analyzer.
pub fn build_object<S>(
    specializer: &S,
    function: &FunctionRef,
    signature: &Signature,
    options: &AnalyzeOptions,
    optimizer: &dyn Optimizer,
    output: &Path,
) -> Result<ObjectArtifact>
where
    S: Specializer + ?Sized,
{
    let arch: ArchTag = options.arch.parse()?;
    object_for_arch(arch, specializer, function, signature, options, optimizer, output)
}

fn object_for_arch<S>(
    arch: ArchTag,
    specializer: &S,
    function: &FunctionRef,
    signature: &Signature,
    options: &AnalyzeOptions,
    optimizer: &dyn Optimizer,
    output: &Path,
) -> Result<ObjectArtifact>
where
    S: Specializer + ?Sized,
{
    let (linked, size_bytes) = with_optimized_module(
        arch,
        specializer,
        function,
        signature,
        options,
        optimizer,
        |machine, module| emit_object(machine, module, output),
    )?;

    Ok(ObjectArtifact {
        path: output.to_path_buf(),
        size_bytes,
        arch,
        entry_symbol: linked.entry_symbol,
        entry_match: linked.entry_match,
        wrapper_uses: linked.wrapper_uses,
    })
}

/// Textual IR of the linked and optimized module, with its entry symbol.
pub fn build_llvm_ir<S>(
    specializer: &S,
    function: &FunctionRef,
    signature: &Signature,
    options: &AnalyzeOptions,
    optimizer: &dyn Optimizer,
) -> Result<(String, String)>
where
    S: Specializer + ?Sized,
{
    let arch: ArchTag = options.arch.parse()?;
    let (linked, ir) = with_optimized_module(
        arch,
        specializer,
        function,
        signature,
        options,
        optimizer,
        |_, module| Ok(emit_llvm_ir(module)),
    )?;
    Ok((ir, linked.entry_symbol))
}

/// Analyze `function` for `signature` with the default optimizer.
pub fn analyze<S>(
    specializer: &S,
    function: &FunctionRef,
    signature: &Signature,
    options: &AnalyzeOptions,
) -> Result<AnalysisReport>
where
    S: Specializer + ?Sized,
{
    analyze_with(
        specializer,
        function,
        signature,
        options,
        &HostOptimizer::new(options.opt_level),
    )
}

/// Analyze `function` for `signature`, optimizing with `optimizer`.
///
/// The object file lives in a scratch directory that is removed when this
/// returns, on success and on failure.
pub fn analyze_with<S>(
    specializer: &S,
    function: &FunctionRef,
    signature: &Signature,
    options: &AnalyzeOptions,
    optimizer: &dyn Optimizer,
) -> Result<AnalysisReport>
where
    S: Specializer + ?Sized,
{
    let arch: ArchTag = options.arch.parse()?;
    options.analyzer.validate()?;

    let mut scratch = tempfile::Builder::new();
    scratch.prefix("iaca-");
    let scratch = match &options.scratch_root {
        Some(root) => scratch.tempdir_in(root)?,
        None => scratch.tempdir()?,
    };
    let object = scratch.path().join("entry.o");

    let artifact = object_for_arch(
        arch,
        specializer,
        function,
        signature,
        options,
        optimizer,
        &object,
    )?;
    let output = options.analyzer.run(arch, &artifact.path)?;

    Ok(AnalysisReport {
        arch,
        entry_symbol: artifact.entry_symbol,
        entry_match: artifact.entry_match,
        wrapper_uses: artifact.wrapper_uses,
        status: output.status,
        stdout: output.stdout,
        stderr: output.stderr,
    })
}
