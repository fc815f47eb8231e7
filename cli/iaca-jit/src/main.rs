//! iaca-jit CLI — analyze the JIT-compiled body of one method with IACA.

mod commands;
mod table;

use std::path::PathBuf;
use std::process;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "iaca-jit",
    version,
    about = "Extract a method's JIT IR and analyze it with Intel's Architecture Code Analyzer"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Which method to compile, and how.
#[derive(Args, Debug, Clone)]
pub struct CompileArgs {
    /// Method table (TOML)
    pub table: PathBuf,
    /// Generic function to compile
    pub function: String,
    /// Argument types, comma separated (e.g. Int64,Float64)
    #[arg(long, default_value = "")]
    pub signature: String,
    /// Architecture tag (HSW, BDW, SKL, SKX)
    #[arg(long, default_value = "SKL")]
    pub arch: String,
    /// Optimization level 0-3 (default: $IACA_OPT_LEVEL or 2)
    #[arg(long)]
    pub opt_level: Option<String>,
    /// Explicit pass pipeline instead of the default<On> pipeline
    #[arg(long)]
    pub passes: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a method and run IACA over the result
    Analyze {
        #[command(flatten)]
        compile: CompileArgs,
        /// Analyzer executable (default: $IACA_PATH, then `iaca` on PATH)
        #[arg(long)]
        iaca: Option<PathBuf>,
        /// Extra arguments passed to the analyzer
        #[arg(last = true)]
        iaca_args: Vec<String>,
    },
    /// Compile a method and write the object file (or IR) without analyzing it
    Emit {
        #[command(flatten)]
        compile: CompileArgs,
        /// Output path (default: <function>.o)
        #[arg(long, short)]
        output: Option<PathBuf>,
        /// Print the linked, optimized IR instead of writing an object
        #[arg(long)]
        llvm_ir: bool,
    },
    /// List supported architecture tags
    Targets,
    /// Check analyzer and LLVM availability
    Doctor,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Analyze {
            compile,
            iaca,
            iaca_args,
        } => commands::analyze::run(&compile, iaca.as_deref(), &iaca_args),
        Commands::Emit {
            compile,
            output,
            llvm_ir,
        } => commands::emit::run(&compile, output.as_deref(), llvm_ir),
        Commands::Targets => commands::targets::run(),
        Commands::Doctor => commands::doctor::run(),
    }
}
