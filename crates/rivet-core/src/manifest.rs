use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::dependency::{ManifestDependency, PackageDependency};
use rivet_util::errors::RivetError;

/// Manifest file name looked up in the project directory.
pub const MANIFEST_FILE: &str = "rivet.toml";

/// The parsed representation of a `rivet.toml` file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub project: ProjectMetadata,

    /// Feeds as `name = "path"`, relative to the manifest directory.
    #[serde(default)]
    pub sources: BTreeMap<String, String>,

    /// Dependencies shared by every framework, in declaration order.
    #[serde(default)]
    pub dependencies: toml::Table,

    #[serde(default)]
    pub frameworks: BTreeMap<String, FrameworkSection>,
}

/// Project identity from the `[project]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectMetadata {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub runtimes: Vec<String>,
    /// Path to a `runtime.json` that replaces the built-in RID graph.
    #[serde(default, rename = "runtime-graph")]
    pub runtime_graph: Option<String>,
}

/// A `[frameworks."<tfm>"]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FrameworkSection {
    #[serde(default)]
    pub dependencies: toml::Table,
}

impl Manifest {
    /// Load and parse a `rivet.toml` file from the given path.
    pub fn from_path(path: &Path) -> miette::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| RivetError::Manifest {
            message: format!("Failed to read {}: {e}", path.display()),
        })?;
        Self::parse(&content)
    }

    /// Parse a `rivet.toml` from a string.
    pub fn parse(content: &str) -> miette::Result<Self> {
        toml::from_str(content).map_err(|e| {
            RivetError::Manifest {
                message: format!("Failed to parse rivet.toml: {e}"),
            }
            .into()
        })
    }

    /// The shared `[dependencies]` table, validated, in declaration order.
    pub fn shared_dependencies(&self) -> miette::Result<Vec<PackageDependency>> {
        dependencies_from_table(&self.dependencies)
    }
}

impl FrameworkSection {
    pub fn dependencies(&self) -> miette::Result<Vec<PackageDependency>> {
        dependencies_from_table(&self.dependencies)
    }
}

/// Convert a TOML dependency table into dependencies, keeping table order.
pub fn dependencies_from_table(table: &toml::Table) -> miette::Result<Vec<PackageDependency>> {
    let mut deps = Vec::with_capacity(table.len());
    for (id, value) in table {
        let spec: ManifestDependency =
            value
                .clone()
                .try_into()
                .map_err(|e: toml::de::Error| RivetError::Request {
                    message: format!("dependency '{id}': {}", e.message()),
                })?;
        deps.push(spec.to_dependency(id)?);
    }
    Ok(deps)
}
