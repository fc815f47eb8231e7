//! The seam to the host's method resolution and JIT compiler.
//!
//! The rest of the pipeline only talks to a [`Specializer`]. [`MethodTable`]
//! is a self-contained host that compiles methods from textual IR templates.

mod collector;
mod signature;
mod table;

use inkwell::context::Context;
use inkwell::module::Module;
use thiserror::Error;

pub use collector::{DependencyCollector, ModuleSink};
pub use signature::{Signature, TypeSpec};
pub use table::{CallSite, GenericFunction, MethodDef, MethodTable};

/// Whether a callable can be specialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    /// A generic function dispatching over methods.
    Generic,
    /// A primitive with no IR of its own.
    Builtin,
}

/// A callable known to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionRef {
    pub name: String,
    pub kind: FunctionKind,
}

impl FunctionRef {
    pub fn generic(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FunctionKind::Generic,
        }
    }

    pub fn builtin(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FunctionKind::Builtin,
        }
    }
}

/// The most specific method for a call, as chosen by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodMatch {
    pub function: String,
    /// Host-specific method index.
    pub method: usize,
    /// The method's declared signature.
    pub declared: Signature,
}

/// A fully instantiated method: what the compiler is asked to lower.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodInstance {
    pub function: String,
    pub method: usize,
    pub signature: Signature,
}

/// Failures inside the host compiler.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("no method #{method} on '{function}'")]
    UnknownMethod { function: String, method: usize },

    #[error("call to {function}{signature} has no applicable method")]
    UnresolvedCallee { function: String, signature: String },

    #[error("generated IR for '{symbol}' is invalid: {message}")]
    InvalidIr { symbol: String, message: String },
}

/// Host method resolution plus raw IR generation.
pub trait Specializer {
    /// Most specific method of `function` applicable to `signature`.
    fn resolve(&self, function: &FunctionRef, signature: &Signature) -> Option<MethodMatch>;

    /// Unoptimized IR for `instance`.
    ///
    /// Functions compiled along the way are passed to `sink`, each in its own
    /// module, before this returns.
    fn compile<'ctx>(
        &self,
        context: &'ctx Context,
        instance: &MethodInstance,
        sink: &mut dyn ModuleSink<'ctx>,
    ) -> Result<Module<'ctx>, CompileError>;
}
