//! Handler for `rivet tree`.

use miette::Result;

use rivet_ops::ops_tree::{self, TreeOptions};

pub async fn exec(
    framework: Option<String>,
    runtime: Option<String>,
    why: Option<String>,
    conflicts: bool,
    depth: Option<u32>,
) -> Result<()> {
    let project_root = super::current_project()?;

    let opts = TreeOptions {
        framework,
        runtime,
        why,
        conflicts,
        depth: depth.map(|d| d as usize),
    };

    ops_tree::tree(&project_root, &opts).await
}
