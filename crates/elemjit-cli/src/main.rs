//! elemjit CLI - generate, build and time elementwise kernels.
//!
//! # Commands
//!
//! - `elemjit codegen <kernel.toml>` - Print or write the generated C source
//! - `elemjit run <kernel.toml>` - Build a kernel and time sequential and parallel runs
//! - `elemjit types` - List the supported element types
//!
//! # Examples
//!
//! ```bash
//! # Show the C translation unit for a kernel description
//! elemjit codegen kernels/poly.toml
//!
//! # Time a million-element polynomial in place on four threads
//! elemjit run kernels/poly.toml --len 1000000 --threads 4 --in-place
//! ```

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod commands;
mod error;

use commands::{codegen, run, types};
use elemjit::PartitionMode;

/// elemjit CLI - JIT-compiled elementwise kernels
#[derive(Parser)]
#[command(name = "elemjit")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the generated C source for a kernel description
    Codegen {
        /// Kernel description (TOML)
        file: PathBuf,

        /// Write the source here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Build a kernel and time sequential and parallel runs
    Run {
        /// Kernel description (TOML)
        file: PathBuf,

        /// Number of elements
        #[arg(short, long, default_value = "1000000")]
        len: usize,

        /// Worker threads for parallel runs (default: available parallelism)
        #[arg(short, long)]
        threads: Option<usize>,

        /// Partition mode for parallel runs (stride or chunk; default: both)
        #[arg(short, long)]
        mode: Option<PartitionMode>,

        /// Write results into the first input
        #[arg(long)]
        in_place: bool,
    },

    /// List the supported element types
    Types,
}

fn setup_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let result = match cli.command {
        Commands::Codegen { file, output } => codegen::execute(&file, output.as_deref()),

        Commands::Run {
            file,
            len,
            threads,
            mode,
            in_place,
        } => run::execute(&file, len, threads, mode, in_place),

        Commands::Types => types::execute(),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}
