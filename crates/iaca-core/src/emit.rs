//! Object file emission.

use std::path::Path;

use inkwell::module::Module;
use inkwell::targets::{FileType, TargetMachine};

use crate::error::{AnalysisError, Result};

/// Lower `module` to a relocatable object at `path`.
///
/// Returns the size of the written file in bytes.
pub fn emit_object(machine: &TargetMachine, module: &Module<'_>, path: &Path) -> Result<u64> {
    module.set_triple(&machine.get_triple());
    module.set_data_layout(&machine.get_target_data().get_data_layout());

    let failed = |message: String| AnalysisError::EmissionFailed {
        path: path.to_path_buf(),
        message,
    };

    machine
        .write_to_file(module, FileType::Object, path)
        .map_err(|e| failed(e.to_string()))?;

    let size = std::fs::metadata(path)
        .map(|m| m.len())
        .map_err(|e| failed(e.to_string()))?;
    log::debug!("wrote {size} byte object to {}", path.display());
    Ok(size)
}

/// Textual IR of `module`.
pub fn emit_llvm_ir(module: &Module<'_>) -> String {
    module.print_to_string().to_string()
}
