//! IR extraction from the host specializer.

use inkwell::context::Context;
use inkwell::module::Module;

use crate::error::{AnalysisError, Result};
use crate::specialize::{
    DependencyCollector, FunctionKind, FunctionRef, MethodInstance, Signature, Specializer,
};

/// Raw compiler output for one method instance.
pub struct RawUnit<'ctx> {
    /// Module holding the entry and its call wrapper.
    pub module: Module<'ctx>,
    /// Modules compiled on the side, in the order the host produced them.
    pub dependencies: Vec<Module<'ctx>>,
    pub instance: MethodInstance,
}

/// Resolve, instantiate and compile `function` for `signature`.
pub fn extract<'ctx, S>(
    specializer: &S,
    context: &'ctx Context,
    function: &FunctionRef,
    signature: &Signature,
) -> Result<RawUnit<'ctx>>
where
    S: Specializer + ?Sized,
{
    if function.kind != FunctionKind::Generic {
        return Err(AnalysisError::NotSpecializable {
            function: function.name.clone(),
        });
    }

    let no_method = || AnalysisError::NoApplicableMethod {
        function: function.name.clone(),
        signature: signature.to_string(),
    };
    let found = specializer
        .resolve(function, signature)
        .ok_or_else(no_method)?;
    let specialization = signature.intersect(&found.declared).ok_or_else(no_method)?;
    let instance = MethodInstance {
        function: found.function,
        method: found.method,
        signature: specialization,
    };
    log::debug!(
        "compiling {}{} (method #{})",
        instance.function,
        instance.signature,
        instance.method
    );

    let mut collector = DependencyCollector::new();
    let module = specializer
        .compile(context, &instance, &mut collector)
        .map_err(|e| AnalysisError::IrGenerationFailed {
            function: function.name.clone(),
            signature: signature.to_string(),
            message: e.to_string(),
        })?;
    if !collector.is_empty() {
        log::debug!("dependency modules: {}", collector.names().join(", "));
    }

    Ok(RawUnit {
        module,
        dependencies: collector.into_modules(),
        instance,
    })
}
