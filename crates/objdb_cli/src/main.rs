//! ObjDB CLI
//!
//! Command-line tools for ObjDB stores.
//!
//! # Commands
//!
//! - `demo` - Run the sample Person/Dog/Cat scenarios
//! - `inspect` - Display per-type object counts and the committed sequence

mod commands;
mod sample;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// ObjDB command-line tools.
#[derive(Parser)]
#[command(name = "objdb")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the sample scenarios (in memory unless --path is given)
    Demo {
        /// Seed for generated ages and deletion order
        #[arg(short, long)]
        seed: Option<u64>,
    },

    /// Display store statistics
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Demo { seed } => {
            commands::demo::run(cli.path.as_deref(), seed)?;
        }
        Commands::Inspect { format } => {
            let path = cli.path.ok_or("Store path required for inspect")?;
            commands::inspect::run(&path, &format)?;
        }
        Commands::Version => {
            println!("ObjDB CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("ObjDB Core v{}", objdb_core::VERSION);
        }
    }

    Ok(())
}
