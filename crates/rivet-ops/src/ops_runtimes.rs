//! Operation: print the fallback chain of a RID.

use std::path::Path;

use rivet_core::runtime_graph::RuntimeGraph;
use rivet_resolver::runtime::fallback_chain;

use crate::project::Project;

/// Print the fallback chain of `rid`.
///
/// Inside a project the chain comes from the merged graph of a restore for
/// that RID, so package `runtime.json` files count. Outside one the built-in
/// graph is used.
pub async fn runtimes(project_root: Option<&Path>, rid: &str) -> miette::Result<()> {
    let graph = match project_root {
        Some(root) => {
            let project = Project::load(root, &[rid.to_string()], &[])?;
            project.resolve().await?.runtime_graph
        }
        None => RuntimeGraph::host_default(),
    };
    print!("{}", render_chain(&graph, rid));
    Ok(())
}

/// One RID per line, nearest first. A RID the graph does not declare is
/// marked as such.
pub fn render_chain(graph: &RuntimeGraph, rid: &str) -> String {
    let mut output = String::new();
    if graph.get(rid).is_none() {
        output.push_str(&format!("{rid} (not declared in the runtime graph)\n"));
        return output;
    }
    for entry in fallback_chain(graph, rid) {
        output.push_str(&entry);
        output.push('\n');
    }
    output
}
