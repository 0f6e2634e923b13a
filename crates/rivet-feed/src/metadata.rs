//! `package.toml` parsing: package identity and per-framework dependency groups.
//!
//! ```toml
//! id = "packageA"
//! version = "1.0.0"
//!
//! [[dependency-groups]]
//! framework = "netstandard1.5"
//! [dependency-groups.dependencies]
//! packageB = "1.0.0"
//! packageC = { version = "[2.0, 3.0)", exclude = "runtime" }
//! ```

use serde::{Deserialize, Serialize};

use rivet_core::dependency::DependencyGroup;
use rivet_core::framework::Framework;
use rivet_core::manifest::dependencies_from_table;
use rivet_core::package::{PackageId, PackageIdentity};
use rivet_core::version::PackageVersion;
use rivet_util::errors::RivetError;

/// Metadata file name inside a package directory.
pub const METADATA_FILE: &str = "package.toml";

/// Runtime graph fragment file name inside a package directory.
pub const RUNTIME_GRAPH_FILE: &str = "runtime.json";

/// The raw contents of a `package.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageMetadata {
    pub id: String,
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "dependency-groups")]
    pub dependency_groups: Vec<RawDependencyGroup>,
}

/// One `[[dependency-groups]]` entry before validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawDependencyGroup {
    /// Missing or `"any"` applies to every framework.
    #[serde(default)]
    pub framework: Option<String>,
    #[serde(default)]
    pub dependencies: toml::Table,
}

impl PackageMetadata {
    pub fn new(id: &str, version: &str) -> Self {
        Self {
            id: id.to_string(),
            version: version.to_string(),
            description: None,
            dependency_groups: Vec::new(),
        }
    }

    /// Add a dependency group from `(id, range)` pairs.
    pub fn with_group(mut self, framework: Option<&str>, deps: &[(&str, &str)]) -> Self {
        let mut dependencies = toml::Table::new();
        for (id, range) in deps {
            dependencies.insert(id.to_string(), toml::Value::String(range.to_string()));
        }
        self.dependency_groups.push(RawDependencyGroup {
            framework: framework.map(str::to_string),
            dependencies,
        });
        self
    }

    pub fn parse(content: &str) -> miette::Result<Self> {
        toml::from_str(content).map_err(|e| {
            RivetError::Feed {
                message: format!("Failed to parse {METADATA_FILE}: {e}"),
            }
            .into()
        })
    }

    pub fn to_toml(&self) -> miette::Result<String> {
        toml::to_string_pretty(self).map_err(|e| {
            RivetError::Feed {
                message: format!("Failed to serialize {METADATA_FILE}: {e}"),
            }
            .into()
        })
    }

    /// The validated identity declared by the metadata.
    pub fn identity(&self) -> miette::Result<PackageIdentity> {
        let version = PackageVersion::parse(&self.version).map_err(|e| RivetError::Feed {
            message: format!("package '{}': {e}", self.id),
        })?;
        Ok(PackageIdentity::new(PackageId::new(self.id.as_str()), version))
    }

    /// Validate every group: framework names and dependency ranges must parse.
    pub fn dependency_groups(&self) -> miette::Result<Vec<DependencyGroup>> {
        let mut groups = Vec::with_capacity(self.dependency_groups.len());
        for raw in &self.dependency_groups {
            let framework = match raw.framework.as_deref() {
                None => Framework::ANY,
                Some(name) => Framework::parse(name).map_err(|e| RivetError::Feed {
                    message: format!("package '{}': {e}", self.id),
                })?,
            };
            let dependencies = dependencies_from_table(&raw.dependencies).map_err(|e| {
                RivetError::Feed {
                    message: format!("package '{}': {e}", self.id),
                }
            })?;
            groups.push(DependencyGroup::new(framework, dependencies));
        }
        Ok(groups)
    }
}
