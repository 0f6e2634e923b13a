use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use rivet_util::errors::RivetError;

use crate::framework::Framework;
use crate::package::PackageId;
use crate::version::PackageVersion;

/// Lock file name written next to `rivet.toml`.
pub const LOCK_FILE: &str = "rivet.lock.json";

/// Current lock file format version.
pub const LOCK_FORMAT_VERSION: u32 = 1;

/// File name that stands for "no content" in an asset list.
pub const PLACEHOLDER_FILE: &str = "_._";

/// Deterministic record of a restore: one target per resolved graph plus the
/// library catalog shared by all targets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockFile {
    pub version: u32,
    #[serde(default)]
    pub targets: Vec<LockFileTarget>,
    #[serde(default)]
    pub libraries: Vec<LockFileLibrary>,
    #[serde(default)]
    pub project_file_dependency_groups: BTreeMap<String, Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restore_fingerprint: Option<String>,
}

/// The resolved libraries of one (framework, RID-or-none) graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockFileTarget {
    pub framework: Framework,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_identifier: Option<String>,
    #[serde(default)]
    pub libraries: Vec<LockFileTargetLibrary>,
}

/// Kind of a runtime asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetType {
    Runtime,
    Resource,
    Native,
}

impl std::fmt::Display for AssetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            AssetType::Runtime => "runtime",
            AssetType::Resource => "resource",
            AssetType::Native => "native",
        })
    }
}

/// An asset that applies only on a given RID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeTarget {
    pub path: String,
    pub rid: String,
    pub asset_type: AssetType,
}

/// A package as it appears inside one target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockFileTargetLibrary {
    pub id: PackageId,
    pub version: PackageVersion,
    #[serde(rename = "type", default = "default_library_type")]
    pub kind: String,
    /// Dependency id → normalized range, for this framework.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dependencies: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub compile: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub runtime: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub native: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub runtime_targets: Vec<RuntimeTarget>,
}

/// A package in the catalog, independent of framework.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockFileLibrary {
    pub id: PackageId,
    pub version: PackageVersion,
    #[serde(rename = "type", default = "default_library_type")]
    pub kind: String,
    /// Ids of every dependency declared by the package, sorted.
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Package files, sorted.
    #[serde(default)]
    pub files: Vec<String>,
}

fn default_library_type() -> String {
    "package".to_string()
}

impl LockFileTargetLibrary {
    pub fn new(id: PackageId, version: PackageVersion) -> Self {
        Self {
            id,
            version,
            kind: default_library_type(),
            dependencies: BTreeMap::new(),
            compile: Vec::new(),
            runtime: Vec::new(),
            resource: Vec::new(),
            native: Vec::new(),
            runtime_targets: Vec::new(),
        }
    }
}

impl LockFileLibrary {
    pub fn new(id: PackageId, version: PackageVersion) -> Self {
        Self {
            id,
            version,
            kind: default_library_type(),
            dependencies: Vec::new(),
            files: Vec::new(),
        }
    }
}

impl LockFileTarget {
    /// `netstandard1.5` or `netstandard1.5/win7-x86`.
    pub fn name(&self) -> String {
        match &self.runtime_identifier {
            Some(rid) => format!("{}/{rid}", self.framework),
            None => self.framework.to_string(),
        }
    }

    pub fn library(&self, id: &str) -> Option<&LockFileTargetLibrary> {
        let id = PackageId::new(id);
        self.libraries.iter().find(|l| l.id == id)
    }
}

impl Default for LockFile {
    fn default() -> Self {
        Self {
            version: LOCK_FORMAT_VERSION,
            targets: Vec::new(),
            libraries: Vec::new(),
            project_file_dependency_groups: BTreeMap::new(),
            restore_fingerprint: None,
        }
    }
}

impl LockFile {
    /// Load and parse a `rivet.lock.json` file from the given path.
    pub fn from_path(path: &Path) -> miette::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| RivetError::Generic {
            message: format!("Failed to read lock file: {e}"),
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> miette::Result<Self> {
        let lock: LockFile = serde_json::from_str(content).map_err(|e| RivetError::Generic {
            message: format!("Failed to parse lock file: {e}"),
        })?;
        if lock.version != LOCK_FORMAT_VERSION {
            return Err(RivetError::Generic {
                message: format!(
                    "Unsupported lock file version {} (expected {LOCK_FORMAT_VERSION})",
                    lock.version
                ),
            }
            .into());
        }
        Ok(lock)
    }

    /// Serialize to pretty-printed JSON with a trailing newline.
    pub fn to_string_pretty(&self) -> Result<String, serde_json::Error> {
        let mut s = serde_json::to_string_pretty(self)?;
        s.push('\n');
        Ok(s)
    }

    /// Write the lock file atomically.
    pub fn write_to(&self, path: &Path) -> miette::Result<()> {
        let content = self.to_string_pretty().map_err(|e| RivetError::Generic {
            message: format!("Failed to serialize lock file: {e}"),
        })?;
        rivet_util::fs::write_atomic(path, content.as_bytes()).map_err(|e| RivetError::Generic {
            message: format!("Failed to write {}: {e}", path.display()),
        })?;
        Ok(())
    }

    pub fn target(&self, framework: &Framework, rid: Option<&str>) -> Option<&LockFileTarget> {
        self.targets
            .iter()
            .find(|t| &t.framework == framework && t.runtime_identifier.as_deref() == rid)
    }

    pub fn library(&self, id: &str, version: &PackageVersion) -> Option<&LockFileLibrary> {
        let id = PackageId::new(id);
        self.libraries
            .iter()
            .find(|l| l.id == id && &l.version == version)
    }

    /// Put targets and libraries in canonical order.
    ///
    /// Targets: framework short name, then RID with none first.
    /// Libraries: id (case-insensitive), then version.
    pub fn sort(&mut self) {
        self.targets.sort_by(|a, b| {
            a.framework
                .short_name()
                .cmp(&b.framework.short_name())
                .then_with(|| a.runtime_identifier.cmp(&b.runtime_identifier))
        });
        for target in &mut self.targets {
            target
                .libraries
                .sort_by(|a, b| a.id.cmp(&b.id).then_with(|| a.version.cmp(&b.version)));
        }
        self.libraries
            .sort_by(|a, b| a.id.cmp(&b.id).then_with(|| a.version.cmp(&b.version)));
    }
}
