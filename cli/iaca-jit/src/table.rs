//! Method table files.
//!
//! ```toml
//! builtins = ["+"]
//!
//! [[function]]
//! name = "axpy"
//!
//! [[function.method]]
//! signature = ["Float64", "Float64", "Float64"]
//! returns = "double"
//! body = """
//!   %m = fmul double %arg0, %arg1
//!   %r = fadd double %m, %arg2
//!   ret double %r
//! """
//! ```

use std::path::Path;

use anyhow::{bail, Context, Result};
use iaca_core::{FunctionRef, MethodTable};

/// Read and parse a method table.
pub fn load(path: &Path) -> Result<MethodTable> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read method table {}", path.display()))?;
    toml::from_str(&text)
        .with_context(|| format!("failed to parse method table {}", path.display()))
}

/// Look `name` up, listing what is available if it is missing.
pub fn function(table: &MethodTable, name: &str) -> Result<FunctionRef> {
    match table.function(name) {
        Some(f) => Ok(f),
        None => {
            let known: Vec<&str> = table.function_names().collect();
            bail!(
                "unknown function '{name}' (table defines: {})",
                if known.is_empty() {
                    "nothing".to_string()
                } else {
                    known.join(", ")
                }
            )
        }
    }
}
