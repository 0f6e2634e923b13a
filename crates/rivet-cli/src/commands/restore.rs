//! Handler for `rivet restore`.

use std::path::PathBuf;

use miette::Result;

use rivet_ops::ops_restore::{self, RestoreOptions};

pub async fn exec(force: bool, runtimes: Vec<String>, sources: Vec<PathBuf>, verbose: bool) -> Result<()> {
    let project_root = super::current_project()?;
    let cwd = std::env::current_dir().map_err(rivet_util::errors::RivetError::Io)?;

    let opts = RestoreOptions {
        force,
        runtimes,
        sources: sources.into_iter().map(|s| cwd.join(s)).collect(),
        verbose,
    };
    ops_restore::restore(&project_root, &opts).await?;
    Ok(())
}
