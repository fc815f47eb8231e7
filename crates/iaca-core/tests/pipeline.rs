//! End-to-end tests for the extraction and analysis pipeline.

use std::cell::Cell;
use std::path::Path;
use std::sync::Arc;

use iaca_core::markers::{marker_span, END_MARKER_IR, START_MARKER_BYTES, START_MARKER_IR};
use iaca_core::{
    analyze, analyze_with, build_llvm_ir, build_object, AnalysisError, AnalyzeOptions,
    AnalyzerConfig, CompileError, EntryMatch, FunctionRef, HostOptimizer, MethodDef,
    MethodInstance, MethodMatch, MethodTable, ModuleSink, OptLevel, Signature, Specializer,
    SymbolCounter,
};
use iaca_targets::{ArchTag, TargetError};
use inkwell::context::Context;
use inkwell::memory_buffer::MemoryBuffer;
use inkwell::module::Module;
use inkwell::targets::TargetMachine;

fn sig(s: &str) -> Signature {
    s.parse().unwrap()
}

fn table() -> MethodTable {
    let mut table = MethodTable::new();
    table
        .define(
            "kernel",
            MethodDef::new(
                sig(""),
                "void",
                format!("{START_MARKER_IR}\n{END_MARKER_IR}\n  ret void"),
            ),
        )
        .define(
            "helper",
            MethodDef::new(sig("Int64"), "i64", "  %r = mul i64 %arg0, 3\n  ret i64 %r"),
        )
        .define(
            "caller",
            MethodDef::new(
                sig("Int64"),
                "i64",
                format!(
                    "{START_MARKER_IR}\n  %r = call i64 {{callee0}}(i64 %arg0)\n{END_MARKER_IR}\n  ret i64 %r"
                ),
            )
            .calling("helper", sig("Int64")),
        );
    table
}

fn options(arch: &str, level: OptLevel) -> AnalyzeOptions {
    AnalyzeOptions {
        arch: arch.into(),
        opt_level: level,
        analyzer: AnalyzerConfig::default(),
        symbols: Some(Arc::new(SymbolCounter::new())),
        ..AnalyzeOptions::default()
    }
}

/// Counts every call into the host.
struct Counting<'a> {
    inner: &'a MethodTable,
    calls: Cell<usize>,
}

impl Specializer for Counting<'_> {
    fn resolve(&self, function: &FunctionRef, signature: &Signature) -> Option<MethodMatch> {
        self.calls.set(self.calls.get() + 1);
        self.inner.resolve(function, signature)
    }

    fn compile<'ctx>(
        &self,
        context: &'ctx Context,
        instance: &MethodInstance,
        sink: &mut dyn ModuleSink<'ctx>,
    ) -> Result<Module<'ctx>, CompileError> {
        self.calls.set(self.calls.get() + 1);
        self.inner.compile(context, instance, sink)
    }
}

/// Hands back a fixed module, as a host that leaks wrapper references would.
struct FixedIr(&'static str);

impl Specializer for FixedIr {
    fn resolve(&self, function: &FunctionRef, signature: &Signature) -> Option<MethodMatch> {
        Some(MethodMatch {
            function: function.name.clone(),
            method: 0,
            declared: signature.clone(),
        })
    }

    fn compile<'ctx>(
        &self,
        context: &'ctx Context,
        instance: &MethodInstance,
        _sink: &mut dyn ModuleSink<'ctx>,
    ) -> Result<Module<'ctx>, CompileError> {
        let buffer = MemoryBuffer::create_from_memory_range_copy(self.0.as_bytes(), "fixed");
        context
            .create_module_from_ir(buffer)
            .map_err(|e| CompileError::InvalidIr {
                symbol: instance.function.clone(),
                message: e.to_string(),
            })
    }
}

fn is_empty_dir(path: &Path) -> bool {
    std::fs::read_dir(path).unwrap().next().is_none()
}

#[test]
fn markers_survive_level_zero() {
    let table = table();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kernel.o");
    let opts = options("SKL", OptLevel::O0);

    let artifact = build_object(
        &table,
        &FunctionRef::generic("kernel"),
        &sig(""),
        &opts,
        &HostOptimizer::new(opts.opt_level),
        &path,
    )
    .unwrap();

    assert_eq!(artifact.arch, ArchTag::Skl);
    assert_eq!(artifact.entry_match, EntryMatch::Unique);
    assert_eq!(artifact.entry_symbol, "julia_kernel_1");

    let bytes = std::fs::read(&path).unwrap();
    let (start, end) = marker_span(&bytes).expect("both markers, in order");
    assert_eq!(end, start + START_MARKER_BYTES.len(), "nothing between the markers");
}

#[test]
fn markers_survive_full_optimization() {
    let table = table();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("caller.o");
    let opts = options("SKX", OptLevel::O3);

    build_object(
        &table,
        &FunctionRef::generic("caller"),
        &sig("Int64"),
        &opts,
        &HostOptimizer::new(opts.opt_level),
        &path,
    )
    .unwrap();

    assert!(marker_span(&std::fs::read(&path).unwrap()).is_some());
}

#[test]
fn every_arch_produces_an_object() {
    let table = table();
    let dir = tempfile::tempdir().unwrap();
    for arch in ArchTag::ALL {
        let path = dir.path().join(format!("{arch}.o"));
        let opts = options(arch.as_str(), OptLevel::O2);
        let artifact = build_object(
            &table,
            &FunctionRef::generic("kernel"),
            &sig(""),
            &opts,
            &HostOptimizer::new(opts.opt_level),
            &path,
        )
        .unwrap();
        assert!(artifact.size_bytes > 0);
        assert_eq!(artifact.arch, arch);
    }
}

#[test]
fn repeated_extraction_gets_fresh_names() {
    let table = table();
    let dir = tempfile::tempdir().unwrap();
    let opts = options("HSW", OptLevel::O1);
    let counter = opts.symbols.clone().unwrap();

    let names: Vec<String> = (0..2)
        .map(|i| {
            build_object(
                &table,
                &FunctionRef::generic("caller"),
                &sig("Int64"),
                &opts,
                &HostOptimizer::new(opts.opt_level),
                &dir.path().join(format!("{i}.o")),
            )
            .unwrap()
            .entry_symbol
        })
        .collect();

    assert_eq!(names, vec!["julia_caller_1", "julia_caller_2"]);
    assert_eq!(counter.current(), 2);
}

#[test]
fn dependencies_are_linked_before_optimization() {
    let table = table();
    let dir = tempfile::tempdir().unwrap();
    let opts = options("SKL", OptLevel::O0);
    let linked = Cell::new(false);

    let inspect = |_: &TargetMachine, module: &Module<'_>| -> iaca_core::Result<()> {
        linked.set(module.get_functions().any(|f| {
            f.get_name().to_string_lossy().starts_with("julia_helper_") && f.count_basic_blocks() > 0
        }));
        assert!(module.get_functions().all(|f| !f
            .get_name()
            .to_string_lossy()
            .starts_with("jfptr_")));
        Ok(())
    };

    build_object(
        &table,
        &FunctionRef::generic("caller"),
        &sig("Int64"),
        &opts,
        &inspect,
        &dir.path().join("caller.o"),
    )
    .unwrap();
    assert!(linked.get());
}

#[test]
fn rendered_ir_has_renamed_entry_and_no_wrapper() {
    let table = table();
    let opts = options("SKL", OptLevel::O0);
    let (ir, entry) = build_llvm_ir(
        &table,
        &FunctionRef::generic("caller"),
        &sig("Int64"),
        &opts,
        &HostOptimizer::new(opts.opt_level),
    )
    .unwrap();

    assert_eq!(entry, "julia_caller_1");
    assert!(ir.contains("define i64 @julia_caller_1(i64 %arg0)"));
    assert!(ir.contains("define i64 @julia_helper_"));
    assert!(!ir.contains("jfptr_"));
    assert!(ir.contains("target triple"));
}

#[test]
fn referenced_wrapper_is_dropped_and_reported() {
    let host = FixedIr(
        r#"
define ptr @jfptr_leaky_2(ptr %f, ptr %args, i32 %n) {
top:
  ret ptr null
}

define ptr @julia_leaky_1() {
top:
  ret ptr @jfptr_leaky_2
}
"#,
    );
    let opts = options("SKL", OptLevel::O0);
    let (ir, entry) = build_llvm_ir(
        &host,
        &FunctionRef::generic("leaky"),
        &sig(""),
        &opts,
        &HostOptimizer::new(opts.opt_level),
    )
    .unwrap();
    assert_eq!(entry, "julia_leaky_1");
    assert!(!ir.contains("jfptr_"));

    let dir = tempfile::tempdir().unwrap();
    let artifact = build_object(
        &host,
        &FunctionRef::generic("leaky"),
        &sig(""),
        &opts,
        &HostOptimizer::new(opts.opt_level),
        &dir.path().join("leaky.o"),
    )
    .unwrap();
    assert_eq!(artifact.wrapper_uses, 1);
    assert_eq!(artifact.entry_match, EntryMatch::Unique);
}

#[test]
fn optimizer_failures_propagate() {
    let table = table();
    let dir = tempfile::tempdir().unwrap();
    let opts = options("SKL", OptLevel::O2);
    let failing = |_: &TargetMachine, _: &Module<'_>| -> iaca_core::Result<()> {
        Err(AnalysisError::OptimizationFailed {
            pipeline: "custom".into(),
            message: "refused".into(),
        })
    };
    let path = dir.path().join("never.o");

    let err = build_object(
        &table,
        &FunctionRef::generic("kernel"),
        &sig(""),
        &opts,
        &failing,
        &path,
    )
    .unwrap_err();
    assert!(matches!(err, AnalysisError::OptimizationFailed { .. }));
    assert!(!path.exists());
}

#[test]
fn unsupported_arch_fails_before_extraction() {
    let table = table();
    let host = Counting {
        inner: &table,
        calls: Cell::new(0),
    };
    let opts = options("ZEN4", OptLevel::O2);

    let err = analyze(&host, &FunctionRef::generic("kernel"), &sig(""), &opts).unwrap_err();
    assert!(matches!(
        err,
        AnalysisError::Target(TargetError::UnsupportedArchitecture { .. })
    ));
    assert_eq!(host.calls.get(), 0);
}

#[test]
fn empty_analyzer_path_fails_before_extraction() {
    let table = table();
    let host = Counting {
        inner: &table,
        calls: Cell::new(0),
    };
    let opts = AnalyzeOptions {
        analyzer: AnalyzerConfig::with_path(""),
        ..options("SKL", OptLevel::O2)
    };

    let err = analyze(&host, &FunctionRef::generic("kernel"), &sig(""), &opts).unwrap_err();
    assert!(matches!(err, AnalysisError::ExecutableNotFound { .. }));
    assert_eq!(host.calls.get(), 0);
}

#[test]
fn missing_analyzer_leaves_no_scratch_files() {
    let table = table();
    let scratch = tempfile::tempdir().unwrap();
    let opts = AnalyzeOptions {
        analyzer: AnalyzerConfig::with_path(scratch.path().join("no-such-iaca")),
        scratch_root: Some(scratch.path().to_path_buf()),
        ..options("SKL", OptLevel::O0)
    };

    let err = analyze(&table, &FunctionRef::generic("kernel"), &sig(""), &opts).unwrap_err();
    assert!(matches!(err, AnalysisError::ExecutableNotFound { .. }));
    assert!(is_empty_dir(scratch.path()));
}

#[test]
fn builtin_is_not_specializable() {
    let mut table = table();
    table.define_builtin("+");
    let opts = options("SKL", OptLevel::O0);
    let err = analyze(&table, &table.function("+").unwrap(), &sig("Int64, Int64"), &opts)
        .unwrap_err();
    assert!(matches!(err, AnalysisError::NotSpecializable { .. }));
}

#[cfg(unix)]
#[test]
fn analyzer_report_is_returned() {
    use std::os::unix::fs::PermissionsExt;

    let table = table();
    let tools = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let fake = tools.path().join("iaca");
    std::fs::write(
        &fake,
        "#!/bin/sh\necho \"Intel(R) Architecture Code Analyzer\"\necho \"arch: $2\"\ntest -s \"$3\" && echo \"object ok\"\n",
    )
    .unwrap();
    std::fs::set_permissions(&fake, std::fs::Permissions::from_mode(0o755)).unwrap();

    let opts = AnalyzeOptions {
        analyzer: AnalyzerConfig::with_path(&fake),
        scratch_root: Some(scratch.path().to_path_buf()),
        ..options("BDW", OptLevel::O2)
    };
    let report = analyze_with(
        &table,
        &FunctionRef::generic("caller"),
        &sig("Int64"),
        &opts,
        &HostOptimizer::new(OptLevel::O2),
    )
    .unwrap();

    assert!(report.status.success());
    assert_eq!(report.arch, ArchTag::Bdw);
    assert!(report.stdout.contains("arch: BDW"));
    assert!(report.stdout.contains("object ok"));
    assert_eq!(report.entry_symbol, "julia_caller_1");
    assert_eq!(report.wrapper_uses, 0);
    assert!(is_empty_dir(scratch.path()));
}
