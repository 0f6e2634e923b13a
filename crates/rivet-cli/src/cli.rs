//! CLI argument definitions for Rivet.
//!
//! Uses `clap` derive macros to define the command surface. Each command
//! corresponds to a handler in the [`super::commands`] module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "rivet",
    version,
    about = "Restore package dependencies into a deterministic lock file",
    long_about = "Rivet resolves a project's package dependencies per target framework and \
                  runtime identifier, nearest version first, and records the result in \
                  rivet.lock.json."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve dependencies and write rivet.lock.json
    Restore {
        /// Restore even if the lock file is up to date
        #[arg(long)]
        force: bool,
        /// Additional runtime identifier to restore for (repeatable)
        #[arg(short, long = "runtime", value_name = "RID")]
        runtimes: Vec<String>,
        /// Additional package feed directory (repeatable)
        #[arg(short, long = "source", value_name = "DIR")]
        sources: Vec<PathBuf>,
    },

    /// Display a resolved dependency graph
    Tree {
        /// Target framework to show (defaults to the first declared)
        #[arg(short, long)]
        framework: Option<String>,
        /// Show the graph for a runtime identifier
        #[arg(short, long)]
        runtime: Option<String>,
        /// Show why a package is included
        #[arg(long)]
        why: Option<String>,
        /// Show version conflicts
        #[arg(long)]
        conflicts: bool,
        /// Maximum depth
        #[arg(short, long)]
        depth: Option<u32>,
    },

    /// Print the fallback chain of a runtime identifier
    Runtimes {
        /// Runtime identifier, such as win7-x86
        rid: String,
    },
}

pub fn parse() -> Cli {
    Cli::parse()
}
