//! Entry resolution: find the one function a JIT module was compiled for.
//!
//! The host emits the method body as `<entry_prefix><tag>_<n>` and a call
//! wrapper around it as `<wrapper_prefix><tag>_<m>`. The wrapper is unique
//! per module and carries the tag; the entry is found by matching that tag.
//! Everything that depends on the host's mangling scheme lives here.

use inkwell::module::Module;
use inkwell::values::{BasicValue, FunctionValue, PointerValue};

use crate::error::{AnalysisError, Result};

/// Symbol prefixes of the host's mangling scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamingConvention {
    /// Prefix of compiler-generated call wrappers.
    pub wrapper_prefix: String,
    /// Prefix of compiled method bodies.
    pub entry_prefix: String,
}

impl NamingConvention {
    pub fn new(wrapper_prefix: impl Into<String>, entry_prefix: impl Into<String>) -> Self {
        Self {
            wrapper_prefix: wrapper_prefix.into(),
            entry_prefix: entry_prefix.into(),
        }
    }
}

impl Default for NamingConvention {
    fn default() -> Self {
        Self::new("jfptr_", "julia_")
    }
}

/// Split `prefix + tag + "_" + digits` into `(tag, digits)`.
///
/// The tag may contain underscores; the suffix is the last `_digits` group.
pub fn split_mangled<'a>(name: &'a str, prefix: &str) -> Option<(&'a str, &'a str)> {
    let rest = name.strip_prefix(prefix)?;
    let (tag, suffix) = rest.rsplit_once('_')?;
    if tag.is_empty() || suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((tag, suffix))
}

/// How the entry function was chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryMatch {
    /// Exactly one definition carried the wrapper's tag.
    Unique,
    /// Several definitions matched; the first in module order was taken.
    FirstOfMany { candidates: Vec<String> },
    /// Nothing matched; the first remaining definition was taken.
    NoMatch { fallback: String },
}

/// The chosen entry and how it was found.
#[derive(Debug)]
pub struct EntryResolution<'ctx> {
    pub entry: FunctionValue<'ctx>,
    /// Tag parsed from the wrapper's name.
    pub tag: String,
    /// Name of the wrapper that was removed.
    pub wrapper: String,
    /// References to the wrapper that were replaced with null before removal.
    pub wrapper_uses: usize,
    pub matched: EntryMatch,
}

fn name_of(function: &FunctionValue<'_>) -> String {
    function.get_name().to_string_lossy().into_owned()
}

fn count_uses(pointer: PointerValue<'_>) -> usize {
    std::iter::successors(pointer.get_first_use(), |u| u.get_next_use()).count()
}

fn definitions<'ctx>(module: &Module<'ctx>) -> Vec<FunctionValue<'ctx>> {
    module
        .get_functions()
        .filter(|f| f.count_basic_blocks() > 0)
        .collect()
}

/// Remove the call wrapper from `module` and return the entry function.
///
/// More than one or zero tag matches is not an error: the result's
/// [`EntryMatch`] says which fallback was taken, and a warning is logged.
/// The wrapper is always removed; IR references to it become null and are
/// counted in [`EntryResolution::wrapper_uses`].
pub fn resolve_entry<'ctx>(
    module: &Module<'ctx>,
    naming: &NamingConvention,
) -> Result<EntryResolution<'ctx>> {
    let defs = definitions(module);
    let wrappers: Vec<FunctionValue<'ctx>> = defs
        .iter()
        .filter(|f| name_of(f).starts_with(&naming.wrapper_prefix))
        .copied()
        .collect();

    let wrapper = match wrappers.as_slice() {
        [] => {
            return Err(AnalysisError::NoWrapperFound {
                prefix: naming.wrapper_prefix.clone(),
                definitions: defs.iter().map(name_of).collect::<Vec<_>>().join(", "),
            })
        }
        [single] => *single,
        many => {
            return Err(AnalysisError::AmbiguousWrapper {
                prefix: naming.wrapper_prefix.clone(),
                candidates: many.iter().map(name_of).collect::<Vec<_>>().join(", "),
            })
        }
    };

    let wrapper_name = name_of(&wrapper);
    let tag = split_mangled(&wrapper_name, &naming.wrapper_prefix)
        .map(|(tag, _)| tag.to_string())
        .ok_or_else(|| AnalysisError::UnparsableName {
            name: wrapper_name.clone(),
            prefix: naming.wrapper_prefix.clone(),
        })?;

    let pointer = wrapper.as_global_value().as_pointer_value();
    let wrapper_uses = count_uses(pointer);
    if wrapper_uses > 0 {
        log::warn!(
            "call wrapper {wrapper_name} is referenced {wrapper_uses} time(s) from IR; \
             replacing the references with null"
        );
        pointer.replace_all_uses_with(pointer.get_type().const_null());
    }
    // SAFETY: the wrapper has no uses left in the module, and no other
    // handle to it outlives this function.
    unsafe { wrapper.delete() };

    let remaining = definitions(module);
    let candidates: Vec<FunctionValue<'ctx>> = remaining
        .iter()
        .filter(|f| {
            let name = name_of(f);
            split_mangled(&name, &naming.entry_prefix).is_some_and(|(t, _)| t == tag)
        })
        .copied()
        .collect();

    let (entry, matched) = match candidates.as_slice() {
        [single] => (*single, EntryMatch::Unique),
        [first, ..] => {
            let names: Vec<String> = candidates.iter().map(name_of).collect();
            log::warn!(
                "{} definitions match tag '{tag}' ({}); using {}",
                names.len(),
                names.join(", "),
                names[0]
            );
            (*first, EntryMatch::FirstOfMany { candidates: names })
        }
        [] => {
            let fallback = remaining
                .first()
                .copied()
                .ok_or_else(|| AnalysisError::NoEntryFound { tag: tag.clone() })?;
            let fallback_name = name_of(&fallback);
            log::warn!(
                "no definition matches '{}{tag}_<n>'; falling back to {fallback_name}",
                naming.entry_prefix
            );
            (
                fallback,
                EntryMatch::NoMatch {
                    fallback: fallback_name,
                },
            )
        }
    };

    log::debug!("entry for tag '{tag}' is {}", name_of(&entry));

    Ok(EntryResolution {
        entry,
        tag,
        wrapper: wrapper_name,
        wrapper_uses,
        matched,
    })
}
