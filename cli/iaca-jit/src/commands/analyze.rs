//! `iaca-jit analyze` — compile a method and print IACA's report.

use std::path::Path;

use anyhow::{Context, Result};
use iaca_core::{analyze_with, AnalyzerConfig, EntryMatch};

use crate::{table, CompileArgs};

pub fn run(args: &CompileArgs, iaca: Option<&Path>, iaca_args: &[String]) -> Result<()> {
    let methods = table::load(&args.table)?;
    let function = table::function(&methods, &args.function)?;
    let signature = args.signature();

    let mut options = args.options()?;
    if let Some(path) = iaca {
        options.analyzer = AnalyzerConfig::with_path(path);
    }
    options.analyzer.extra_args = iaca_args.to_vec();
    let optimizer = args.optimizer(options.opt_level);

    let report = analyze_with(&methods, &function, &signature, &options, optimizer.as_ref())
        .with_context(|| format!("analysis of {}{signature} failed", args.function))?;

    match &report.entry_match {
        EntryMatch::Unique => {}
        EntryMatch::FirstOfMany { candidates } => eprintln!(
            "warning: {} candidate entries ({}); analyzed {}",
            candidates.len(),
            candidates.join(", "),
            report.entry_symbol
        ),
        EntryMatch::NoMatch { fallback } => {
            eprintln!("warning: no entry matched the call wrapper; analyzed {fallback}")
        }
    }

    if report.wrapper_uses > 0 {
        eprintln!(
            "warning: {} reference(s) to the call wrapper were replaced with null",
            report.wrapper_uses
        );
    }

    print!("{}", report.stdout);
    if !report.stderr.is_empty() {
        eprint!("{}", report.stderr);
    }
    Ok(())
}
