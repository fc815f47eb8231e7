//! Dependency linking and unique entry naming.

use std::sync::atomic::{AtomicU64, Ordering};

use inkwell::module::Module;
use inkwell::values::FunctionValue;

use crate::error::{AnalysisError, Result};

/// Monotonic counter used to suffix entry symbols.
///
/// Starts at zero and is never reset. [`SymbolCounter::global`] is shared by
/// every analysis in the process; a session can bring its own instead.
#[derive(Debug, Default)]
pub struct SymbolCounter {
    value: AtomicU64,
}

impl SymbolCounter {
    pub const fn new() -> Self {
        Self {
            value: AtomicU64::new(0),
        }
    }

    /// The process-wide counter.
    pub fn global() -> &'static SymbolCounter {
        static GLOBAL: SymbolCounter = SymbolCounter::new();
        &GLOBAL
    }

    /// Increment and return the new value.
    pub fn next(&self) -> u64 {
        self.value.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn current(&self) -> u64 {
        self.value.load(Ordering::SeqCst)
    }
}

/// `name` without a trailing `_<digits>` group.
pub fn strip_numeric_suffix(name: &str) -> &str {
    match name.rsplit_once('_') {
        Some((stem, digits)) if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) => {
            stem
        }
        _ => name,
    }
}

/// Merge every dependency module into `module`, in order.
pub fn link_dependencies<'ctx>(module: &Module<'ctx>, dependencies: Vec<Module<'ctx>>) -> Result<()> {
    for dependency in dependencies {
        let name = dependency.get_name().to_string_lossy().into_owned();
        log::debug!("linking dependency module '{name}'");
        module
            .link_in_module(dependency)
            .map_err(|e| AnalysisError::LinkConflict {
                module: name,
                message: e.to_string(),
            })?;
    }
    Ok(())
}

/// Replace the entry's numeric suffix with the counter's next value.
///
/// Returns the symbol the entry ends up with.
pub fn assign_unique_name(entry: FunctionValue<'_>, counter: &SymbolCounter) -> String {
    let current = entry.get_name().to_string_lossy().into_owned();
    let unique = format!("{}_{}", strip_numeric_suffix(&current), counter.next());
    entry.as_global_value().as_pointer_value().set_name(&unique);

    let assigned = entry.get_name().to_string_lossy().into_owned();
    log::debug!("renamed entry {current} -> {assigned}");
    assigned
}
