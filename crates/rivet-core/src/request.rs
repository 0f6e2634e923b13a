//! The validated input of one restore operation.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;

use rivet_util::errors::RivetError;
use rivet_util::hash::sha256_parts;

use crate::dependency::PackageDependency;
use crate::framework::Framework;
use crate::manifest::Manifest;
use crate::runtime_graph::RuntimeGraph;

/// Root dependencies for one target framework.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameworkRequest {
    pub framework: Framework,
    pub dependencies: Vec<PackageDependency>,
}

/// Everything the resolver needs to know about a project.
#[derive(Debug, Clone)]
pub struct RestoreRequest {
    pub project: String,
    pub frameworks: Vec<FrameworkRequest>,
    /// Requested RIDs, sorted and deduplicated.
    pub runtimes: Vec<String>,
    /// Replaces the host's default RID graph when set.
    pub runtime_graph: Option<RuntimeGraph>,
}

impl RestoreRequest {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            frameworks: Vec::new(),
            runtimes: Vec::new(),
            runtime_graph: None,
        }
    }

    pub fn with_framework(mut self, framework: Framework, dependencies: Vec<PackageDependency>) -> Self {
        self.frameworks.push(FrameworkRequest {
            framework,
            dependencies,
        });
        self
    }

    pub fn with_runtime(mut self, rid: impl Into<String>) -> Self {
        let rid = rid.into();
        if let Err(pos) = self.runtimes.binary_search(&rid) {
            self.runtimes.insert(pos, rid);
        }
        self
    }

    pub fn with_runtime_graph(mut self, graph: RuntimeGraph) -> Self {
        self.runtime_graph = Some(graph);
        self
    }

    /// Build and validate a request from a parsed manifest.
    ///
    /// Shared `[dependencies]` come first in every framework, followed by the
    /// framework's own section.
    pub fn from_manifest(manifest: &Manifest, project_dir: &Path) -> miette::Result<Self> {
        let shared = manifest.shared_dependencies()?;

        let mut request = Self::new(manifest.project.name.clone());
        for (name, section) in &manifest.frameworks {
            let framework = Framework::parse(name).map_err(|e| RivetError::Request {
                message: e.to_string(),
            })?;
            let mut deps = shared.clone();
            deps.extend(section.dependencies()?);
            request = request.with_framework(framework, deps);
        }
        for rid in &manifest.project.runtimes {
            request = request.with_runtime(rid.trim());
        }
        if let Some(path) = &manifest.project.runtime_graph {
            let graph = RuntimeGraph::from_path(&project_dir.join(path))?;
            request = request.with_runtime_graph(graph);
        }

        request.validate()?;
        Ok(request)
    }

    /// Reject malformed requests before any graph walk starts.
    pub fn validate(&self) -> Result<(), RivetError> {
        if self.frameworks.is_empty() {
            return Err(RivetError::Request {
                message: "no target frameworks declared".to_string(),
            });
        }

        let mut seen_frameworks = HashSet::new();
        for fr in &self.frameworks {
            if !seen_frameworks.insert(fr.framework) {
                return Err(RivetError::Request {
                    message: format!("framework '{}' is declared twice", fr.framework),
                });
            }
            let mut seen_ids = HashSet::new();
            for dep in &fr.dependencies {
                if !seen_ids.insert(&dep.id) {
                    return Err(RivetError::Request {
                        message: format!(
                            "duplicate dependency '{}' for framework '{}'",
                            dep.id, fr.framework
                        ),
                    });
                }
            }
        }

        for rid in &self.runtimes {
            let valid = !rid.is_empty()
                && rid
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.' || c == '_');
            if !valid {
                return Err(RivetError::Request {
                    message: format!("'{rid}' is not a valid runtime identifier"),
                });
            }
        }
        Ok(())
    }

    /// The direct dependencies per framework as `"<id> <range>"` lines.
    pub fn dependency_groups(&self) -> BTreeMap<String, Vec<String>> {
        self.frameworks
            .iter()
            .map(|fr| {
                let lines = fr.dependencies.iter().map(PackageDependency::display_line).collect();
                (fr.framework.short_name(), lines)
            })
            .collect()
    }

    /// SHA-256 over the canonical form of the request plus `extra` inputs
    /// (such as feed locations).
    pub fn fingerprint<'a>(&self, extra: impl IntoIterator<Item = &'a str>) -> String {
        let mut lines: Vec<String> = vec![format!("project {}", self.project)];
        let frameworks: BTreeSet<_> = self.frameworks.iter().map(|fr| fr.framework).collect();
        for framework in frameworks {
            lines.push(format!("framework {framework}"));
            if let Some(fr) = self.frameworks.iter().find(|fr| fr.framework == framework) {
                for dep in &fr.dependencies {
                    lines.push(format!(
                        "dependency {} {} include={} exclude={}",
                        dep.id.key(),
                        dep.range,
                        dep.include,
                        dep.exclude
                    ));
                }
            }
        }
        for rid in &self.runtimes {
            lines.push(format!("runtime {rid}"));
        }
        if let Some(graph) = &self.runtime_graph {
            lines.push(format!("runtime-graph {}", graph.to_json()));
        }
        lines.extend(extra.into_iter().map(|s| format!("extra {s}")));
        sha256_parts(lines.iter().map(String::as_str))
    }
}
