//! Operation: display a target graph.

use std::path::Path;

use rivet_core::framework::Framework;
use rivet_resolver::graph::RestoreTargetGraph;
use rivet_resolver::RestoreResult;
use rivet_util::errors::RivetError;

use crate::project::Project;

/// Options for `rivet tree`.
#[derive(Debug, Clone, Default)]
pub struct TreeOptions {
    /// Framework to show. Defaults to the first declared one.
    pub framework: Option<String>,
    /// Show the graph for this RID instead of the RID-less one.
    pub runtime: Option<String>,
    /// Show the path from the project to this package.
    pub why: Option<String>,
    /// Show version conflicts.
    pub conflicts: bool,
    /// Maximum tree depth to display.
    pub depth: Option<usize>,
}

/// Resolve the project and print the selected target graph.
pub async fn tree(project_root: &Path, opts: &TreeOptions) -> miette::Result<()> {
    let runtimes: Vec<String> = opts.runtime.iter().cloned().collect();
    let project = Project::load(project_root, &runtimes, &[])?;
    let result = project.resolve().await?;
    let framework = select_framework(&project, opts)?;
    print!("{}", render(&result, &framework, opts)?);
    Ok(())
}

fn select_framework(project: &Project, opts: &TreeOptions) -> miette::Result<Framework> {
    match &opts.framework {
        Some(name) => Ok(Framework::parse(name)?),
        None => project
            .request
            .frameworks
            .first()
            .map(|fr| fr.framework)
            .ok_or_else(|| {
                RivetError::Request {
                    message: "no target frameworks declared".to_string(),
                }
                .into()
            }),
    }
}

/// Render the view `opts` asks for from a finished restore.
pub fn render(result: &RestoreResult, framework: &Framework, opts: &TreeOptions) -> miette::Result<String> {
    let graph = result
        .graph(&framework.short_name(), opts.runtime.as_deref())
        .ok_or_else(|| RivetError::Generic {
            message: format!(
                "No target graph for {framework}{}",
                opts.runtime.as_deref().map(|r| format!("/{r}")).unwrap_or_default()
            ),
        })?;

    if let Some(id) = &opts.why {
        return Ok(render_why(graph, id));
    }

    if opts.conflicts {
        return Ok(if graph.conflicts.is_empty() {
            "No version conflicts.\n".to_string()
        } else {
            graph.conflicts.to_string()
        });
    }

    Ok(graph.graph.print_tree(opts.depth))
}

fn render_why(graph: &RestoreTargetGraph, id: &str) -> String {
    let Some(path) = graph.graph.find_path(id) else {
        return format!("Package '{id}' is not in the {} graph.\n", graph.name());
    };
    let mut output = format!("Path to {id}:\n");
    for (i, node) in path.iter().enumerate() {
        let indent = "  ".repeat(i);
        if i == 0 {
            output.push_str(&format!("{indent}{}\n", node.requested_id));
        } else {
            output.push_str(&format!("{indent}{node}\n"));
        }
    }
    output
}
