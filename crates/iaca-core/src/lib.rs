//! Extract, link, optimize and analyze the JIT-compiled body of one method.
//!
//! The pipeline, in order:
//!
//! 1. resolve the architecture tag ([`iaca_targets`]),
//! 2. ask the host [`Specializer`] for raw IR plus dependency modules ([`extract`]),
//! 3. pick the entry function and drop the call wrapper ([`entry`]),
//! 4. link dependencies and give the entry a unique name ([`link`]),
//! 5. optimize ([`optimize`]) and emit an object file ([`emit`]),
//! 6. run IACA over the object ([`analyzer`]).
//!
//! [`analyze`] drives all of it.

pub mod analyzer;
pub mod emit;
pub mod entry;
pub mod error;
pub mod extract;
pub mod link;
pub mod markers;
pub mod optimize;
pub mod pipeline;
pub mod specialize;

pub use analyzer::{
    AnalyzerConfig, AnalyzerOutput, PathSource, DEFAULT_ANALYZER, IACA_PATH_ENV,
};
pub use entry::{resolve_entry, EntryMatch, EntryResolution, NamingConvention};
pub use error::{AnalysisError, Result};
pub use extract::{extract, RawUnit};
pub use link::{link_dependencies, SymbolCounter};
pub use optimize::{HostOptimizer, OptLevel, Optimizer, PassPipeline, OPT_LEVEL_ENV};
pub use pipeline::{
    analyze, analyze_with, build_llvm_ir, build_object, AnalysisReport, AnalyzeOptions,
    ObjectArtifact,
};
pub use specialize::{
    CallSite, CompileError, DependencyCollector, FunctionKind, FunctionRef, GenericFunction,
    MethodDef, MethodInstance, MethodMatch, MethodTable, ModuleSink, Signature, Specializer,
    TypeSpec,
};
