//! Command dispatch and handler modules.

mod restore;
mod runtimes;
mod tree;

use miette::Result;

use crate::cli::{Cli, Command};

/// Route a parsed CLI invocation to the appropriate command handler.
pub async fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Restore {
            force,
            runtimes,
            sources,
        } => restore::exec(force, runtimes, sources, cli.verbose).await,
        Command::Tree {
            framework,
            runtime,
            why,
            conflicts,
            depth,
        } => tree::exec(framework, runtime, why, conflicts, depth).await,
        Command::Runtimes { rid } => runtimes::exec(&rid).await,
    }
}

/// The project containing the current directory.
fn current_project() -> Result<std::path::PathBuf> {
    let cwd = std::env::current_dir().map_err(rivet_util::errors::RivetError::Io)?;
    rivet_ops::project::find_project_root(&cwd)
}
