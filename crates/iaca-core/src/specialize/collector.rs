//! Collection of modules the host compiler emits as a side effect.

use inkwell::module::Module;

/// Receives every auxiliary module produced while compiling a method instance.
pub trait ModuleSink<'ctx> {
    fn on_module(&mut self, module: Module<'ctx>);
}

/// Owns dependency modules in the order the compiler produced them.
#[derive(Default)]
pub struct DependencyCollector<'ctx> {
    modules: Vec<Module<'ctx>>,
}

impl<'ctx> DependencyCollector<'ctx> {
    pub fn new() -> Self {
        Self {
            modules: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Module identifiers, in collection order.
    pub fn names(&self) -> Vec<String> {
        self.modules
            .iter()
            .map(|m| m.get_name().to_string_lossy().into_owned())
            .collect()
    }

    pub fn into_modules(self) -> Vec<Module<'ctx>> {
        self.modules
    }
}

impl<'ctx> ModuleSink<'ctx> for DependencyCollector<'ctx> {
    fn on_module(&mut self, module: Module<'ctx>) {
        log::debug!(
            "collected dependency module '{}'",
            module.get_name().to_string_lossy()
        );
        self.modules.push(module);
    }
}
