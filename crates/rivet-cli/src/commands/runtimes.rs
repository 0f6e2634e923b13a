//! Handler for `rivet runtimes`.

use miette::Result;

use rivet_core::manifest::MANIFEST_FILE;
use rivet_ops::ops_runtimes;

pub async fn exec(rid: &str) -> Result<()> {
    let cwd = std::env::current_dir().map_err(rivet_util::errors::RivetError::Io)?;
    let project_root = rivet_util::fs::find_ancestor_with(&cwd, MANIFEST_FILE);
    if project_root.is_none() {
        tracing::info!("No project found, using the built-in runtime graph");
    }
    ops_runtimes::runtimes(project_root.as_deref(), rid).await
}
