//! A table-driven host compiler.
//!
//! Methods are IR templates: the body of the entry block, with parameters
//! named `%arg0`, `%arg1`… and callees referenced as `{callee0}`,
//! `{callee1}`… in the order of [`MethodDef::calls`]. Every compiled body gets
//! a fresh, host-numbered symbol (`julia_<fn>_<n>`), and the requested instance
//! also gets a call wrapper (`jfptr_<fn>_<n>`), the way a JIT lays out its
//! output.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use inkwell::context::Context;
use inkwell::memory_buffer::MemoryBuffer;
use inkwell::module::Module;
use serde::{Deserialize, Serialize};

use super::{
    CompileError, FunctionKind, FunctionRef, MethodInstance, MethodMatch, ModuleSink, Signature,
    Specializer, TypeSpec,
};
use crate::entry::NamingConvention;

/// A call from a method body to another generic function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSite {
    pub function: String,
    #[serde(default)]
    pub signature: Signature,
}

/// One method of a generic function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodDef {
    pub signature: Signature,
    /// LLVM return type.
    #[serde(default = "void")]
    pub returns: String,
    /// Instructions of the entry block (and any further blocks).
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub calls: Vec<CallSite>,
}

fn void() -> String {
    "void".to_string()
}

impl MethodDef {
    pub fn new(signature: Signature, returns: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            signature,
            returns: returns.into(),
            body: body.into(),
            calls: Vec::new(),
        }
    }

    /// Add a callee, referenced from the body as `{calleeN}`.
    pub fn calling(mut self, function: impl Into<String>, signature: Signature) -> Self {
        self.calls.push(CallSite {
            function: function.into(),
            signature,
        });
        self
    }
}

/// A named generic function and its methods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenericFunction {
    pub name: String,
    #[serde(default, rename = "method")]
    pub methods: Vec<MethodDef>,
}

/// In-process host: a method table plus a template-based JIT.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct MethodTable {
    #[serde(default, rename = "function")]
    functions: Vec<GenericFunction>,
    #[serde(default)]
    builtins: Vec<String>,
    #[serde(skip)]
    naming: NamingConvention,
    #[serde(skip)]
    next_id: AtomicU64,
}

impl MethodTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different mangling scheme for generated symbols.
    pub fn with_naming(mut self, naming: NamingConvention) -> Self {
        self.naming = naming;
        self
    }

    /// Add a method to `name`, creating the function if needed.
    pub fn define(&mut self, name: impl Into<String>, method: MethodDef) -> &mut Self {
        let name = name.into();
        match self.functions.iter_mut().find(|f| f.name == name) {
            Some(function) => function.methods.push(method),
            None => self.functions.push(GenericFunction {
                name,
                methods: vec![method],
            }),
        }
        self
    }

    pub fn define_builtin(&mut self, name: impl Into<String>) -> &mut Self {
        self.builtins.push(name.into());
        self
    }

    /// Look a callable up by name.
    pub fn function(&self, name: &str) -> Option<FunctionRef> {
        if self.functions.iter().any(|f| f.name == name) {
            Some(FunctionRef::generic(name))
        } else if self.builtins.iter().any(|b| b == name) {
            Some(FunctionRef::builtin(name))
        } else {
            None
        }
    }

    /// Names of all generic functions, in definition order.
    pub fn function_names(&self) -> impl Iterator<Item = &str> {
        self.functions.iter().map(|f| f.name.as_str())
    }

    pub fn method(&self, function: &str, index: usize) -> Option<&MethodDef> {
        self.functions
            .iter()
            .find(|f| f.name == function)
            .and_then(|f| f.methods.get(index))
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn instantiate(&self, call: &CallSite) -> Result<MethodInstance, CompileError> {
        let unresolved = || CompileError::UnresolvedCallee {
            function: call.function.clone(),
            signature: call.signature.to_string(),
        };
        let function = self
            .function(&call.function)
            .filter(|f| f.kind == FunctionKind::Generic)
            .ok_or_else(unresolved)?;
        let found = self
            .resolve(&function, &call.signature)
            .ok_or_else(unresolved)?;
        let signature = call
            .signature
            .intersect(&found.declared)
            .ok_or_else(unresolved)?;
        Ok(MethodInstance {
            function: found.function,
            method: found.method,
            signature,
        })
    }

    /// Lower one instance into its own module.
    ///
    /// `seen` maps already-lowered (or in-progress) instances to their symbol
    /// and declaration so repeated and recursive calls share one body.
    fn lower<'ctx>(
        &self,
        context: &'ctx Context,
        instance: &MethodInstance,
        with_wrapper: bool,
        sink: &mut dyn ModuleSink<'ctx>,
        seen: &mut HashMap<MethodInstance, (String, String)>,
    ) -> Result<Module<'ctx>, CompileError> {
        let def = self
            .method(&instance.function, instance.method)
            .ok_or_else(|| CompileError::UnknownMethod {
                function: instance.function.clone(),
                method: instance.method,
            })?;

        let params: Vec<&str> = instance
            .signature
            .types()
            .iter()
            .map(TypeSpec::llvm_type)
            .collect();
        let symbol = format!(
            "{}{}_{}",
            self.naming.entry_prefix,
            instance.function,
            self.next_id()
        );
        let declaration = format!(
            "declare {} @\"{symbol}\"({})",
            def.returns,
            params.join(", ")
        );
        seen.insert(instance.clone(), (symbol.clone(), declaration));

        let mut callees = Vec::with_capacity(def.calls.len());
        let mut declarations: Vec<String> = Vec::new();
        for call in &def.calls {
            let callee = self.instantiate(call)?;
            if !seen.contains_key(&callee) {
                let module = self.lower(context, &callee, false, sink, seen)?;
                sink.on_module(module);
            }
            let (callee_symbol, callee_decl) = &seen[&callee];
            if *callee_symbol != symbol && !declarations.contains(callee_decl) {
                declarations.push(callee_decl.clone());
            }
            callees.push(callee_symbol.clone());
        }

        let mut body = if def.body.trim().is_empty() {
            "  ret void".to_string()
        } else {
            def.body.clone()
        };
        for (i, callee) in callees.iter().enumerate() {
            body = body.replace(&format!("{{callee{i}}}"), &format!("@\"{callee}\""));
        }

        let args = params
            .iter()
            .enumerate()
            .map(|(i, ty)| format!("{ty} %arg{i}"))
            .collect::<Vec<_>>()
            .join(", ");

        let mut ir = format!("source_filename = \"{}\"\n\n", instance.function);
        ir.push_str(&format!(
            "define {} @\"{symbol}\"({args}) {{\ntop:\n{body}\n}}\n",
            def.returns
        ));
        for decl in &declarations {
            ir.push_str(&format!("\n{decl}\n"));
        }
        if with_wrapper {
            let wrapper = format!(
                "{}{}_{}",
                self.naming.wrapper_prefix,
                instance.function,
                self.next_id()
            );
            let poison = params
                .iter()
                .map(|ty| format!("{ty} poison"))
                .collect::<Vec<_>>()
                .join(", ");
            let call = if def.returns == "void" {
                format!("call void @\"{symbol}\"({poison})")
            } else {
                format!("%result = call {} @\"{symbol}\"({poison})", def.returns)
            };
            ir.push_str(&format!(
                "\ndefine ptr @\"{wrapper}\"(ptr %function, ptr %args, i32 %nargs) {{\ntop:\n  {call}\n  ret ptr null\n}}\n"
            ));
        }

        log::trace!("generated IR for {symbol}:\n{ir}");

        let buffer = MemoryBuffer::create_from_memory_range_copy(ir.as_bytes(), &symbol);
        context
            .create_module_from_ir(buffer)
            .map_err(|e| CompileError::InvalidIr {
                symbol,
                message: e.to_string(),
            })
    }
}

impl Specializer for MethodTable {
    fn resolve(&self, function: &FunctionRef, signature: &Signature) -> Option<MethodMatch> {
        let generic = self.functions.iter().find(|f| f.name == function.name)?;
        let applicable: Vec<(usize, &MethodDef)> = generic
            .methods
            .iter()
            .enumerate()
            .filter(|(_, m)| signature.is_subtype_of(&m.signature))
            .collect();

        let mut most_specific = applicable.iter().filter(|(_, m)| {
            applicable
                .iter()
                .all(|(_, other)| m.signature.is_subtype_of(&other.signature))
        });
        let (index, method) = most_specific.next()?;
        if most_specific.next().is_some() {
            log::debug!("ambiguous methods for {}{signature}", function.name);
            return None;
        }
        Some(MethodMatch {
            function: generic.name.clone(),
            method: *index,
            declared: method.signature.clone(),
        })
    }

    fn compile<'ctx>(
        &self,
        context: &'ctx Context,
        instance: &MethodInstance,
        sink: &mut dyn ModuleSink<'ctx>,
    ) -> Result<Module<'ctx>, CompileError> {
        let mut seen = HashMap::new();
        self.lower(context, instance, true, sink, &mut seen)
    }
}
