//! Runtime identifier (RID) graph: imports between RIDs plus per-RID extra dependencies.
//!
//! The on-disk form is a `runtime.json` document:
//!
//! ```json
//! {
//!   "runtimes": {
//!     "win7-x86": {
//!       "#import": ["win7", "win-x86"],
//!       "packageA": { "runtime.win7-x86.packageA": "1.0.0" }
//!     }
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use rivet_util::errors::RivetError;
use serde_json::{Map, Value};

use crate::package::PackageId;
use crate::version::VersionRange;

const IMPORT_KEY: &str = "#import";

/// Extra dependencies a package gains when restored for a particular RID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeDependencySet {
    pub id: PackageId,
    pub dependencies: Vec<(PackageId, VersionRange)>,
}

/// One RID: the RIDs it imports, nearest first, and its dependency sets.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RuntimeDescription {
    pub rid: String,
    pub imports: Vec<String>,
    pub dependency_sets: BTreeMap<PackageId, RuntimeDependencySet>,
}

impl RuntimeDescription {
    pub fn new(rid: impl Into<String>, imports: &[&str]) -> Self {
        Self {
            rid: rid.into(),
            imports: imports.iter().map(|s| s.to_string()).collect(),
            dependency_sets: BTreeMap::new(),
        }
    }

    /// Fold `other` into this description: new imports are appended, dependency sets merged by id.
    pub fn merge_from(&mut self, other: &RuntimeDescription) {
        for import in &other.imports {
            if !self.imports.iter().any(|i| i == import) {
                self.imports.push(import.clone());
            }
        }
        for (id, set) in &other.dependency_sets {
            let entry = self
                .dependency_sets
                .entry(id.clone())
                .or_insert_with(|| RuntimeDependencySet {
                    id: id.clone(),
                    dependencies: Vec::new(),
                });
            for (dep_id, range) in &set.dependencies {
                if !entry.dependencies.iter().any(|(existing, _)| existing == dep_id) {
                    entry.dependencies.push((dep_id.clone(), range.clone()));
                }
            }
        }
    }
}

/// A set of RID descriptions keyed by RID.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RuntimeGraph {
    runtimes: BTreeMap<String, RuntimeDescription>,
}

/// Well-known RIDs and their imports, used when no explicit graph is given.
const HOST_RUNTIMES: &[(&str, &[&str])] = &[
    ("base", &[]),
    ("any", &["base"]),
    ("win", &["any"]),
    ("win-x86", &["win"]),
    ("win-x64", &["win"]),
    ("win-arm64", &["win"]),
    ("win7", &["win"]),
    ("win7-x86", &["win7", "win-x86"]),
    ("win7-x64", &["win7", "win-x64"]),
    ("win8", &["win7"]),
    ("win8-x86", &["win8", "win7-x86"]),
    ("win8-x64", &["win8", "win7-x64"]),
    ("win81", &["win8"]),
    ("win81-x86", &["win81", "win8-x86"]),
    ("win81-x64", &["win81", "win8-x64"]),
    ("win10", &["win81"]),
    ("win10-x86", &["win10", "win81-x86"]),
    ("win10-x64", &["win10", "win81-x64"]),
    ("win10-arm64", &["win10", "win-arm64"]),
    ("unix", &["any"]),
    ("unix-x64", &["unix"]),
    ("unix-arm64", &["unix"]),
    ("linux", &["unix"]),
    ("linux-x64", &["linux", "unix-x64"]),
    ("linux-arm64", &["linux", "unix-arm64"]),
    ("linux-musl", &["linux"]),
    ("linux-musl-x64", &["linux-musl", "linux-x64"]),
    ("osx", &["unix"]),
    ("osx-x64", &["osx", "unix-x64"]),
    ("osx-arm64", &["osx", "unix-arm64"]),
];

impl RuntimeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// The host's base graph of well-known RIDs.
    pub fn host_default() -> Self {
        let mut graph = Self::new();
        for (rid, imports) in HOST_RUNTIMES {
            graph.add(RuntimeDescription::new(*rid, imports));
        }
        graph
    }

    pub fn is_empty(&self) -> bool {
        self.runtimes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.runtimes.len()
    }

    pub fn get(&self, rid: &str) -> Option<&RuntimeDescription> {
        self.runtimes.get(rid)
    }

    pub fn rids(&self) -> impl Iterator<Item = &str> {
        self.runtimes.keys().map(String::as_str)
    }

    /// Add a description, merging with an existing one for the same RID.
    pub fn add(&mut self, description: RuntimeDescription) {
        match self.runtimes.get_mut(&description.rid) {
            Some(existing) => existing.merge_from(&description),
            None => {
                self.runtimes.insert(description.rid.clone(), description);
            }
        }
    }

    /// A new graph holding the union of `self` and `other`.
    pub fn merged_with(&self, other: &RuntimeGraph) -> RuntimeGraph {
        let mut merged = self.clone();
        for description in other.runtimes.values() {
            merged.add(description.clone());
        }
        merged
    }

    /// Parse a `runtime.json` document.
    pub fn from_json(content: &str) -> Result<Self, RivetError> {
        let invalid = |message: String| RivetError::Generic {
            message: format!("Invalid runtime graph: {message}"),
        };
        let root: Value =
            serde_json::from_str(content).map_err(|e| invalid(e.to_string()))?;
        let Some(runtimes) = root.get("runtimes") else {
            return Ok(Self::new());
        };
        let runtimes = runtimes
            .as_object()
            .ok_or_else(|| invalid("'runtimes' must be an object".to_string()))?;

        let mut graph = Self::new();
        for (rid, body) in runtimes {
            let body = body
                .as_object()
                .ok_or_else(|| invalid(format!("runtime '{rid}' must be an object")))?;
            graph.add(parse_description(rid, body).map_err(invalid)?);
        }
        Ok(graph)
    }

    /// Read and parse a `runtime.json` file.
    pub fn from_path(path: &Path) -> miette::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| RivetError::Generic {
            message: format!("Failed to read runtime graph {}: {e}", path.display()),
        })?;
        Ok(Self::from_json(&content)?)
    }

    /// Serialize back to the `runtime.json` form.
    pub fn to_json(&self) -> Value {
        let mut runtimes = Map::new();
        for (rid, description) in &self.runtimes {
            let mut body = Map::new();
            body.insert(
                IMPORT_KEY.to_string(),
                Value::Array(description.imports.iter().cloned().map(Value::String).collect()),
            );
            for (id, set) in &description.dependency_sets {
                let deps: Map<String, Value> = set
                    .dependencies
                    .iter()
                    .map(|(dep, range)| (dep.to_string(), Value::String(range.to_string())))
                    .collect();
                body.insert(id.to_string(), Value::Object(deps));
            }
            runtimes.insert(rid.clone(), Value::Object(body));
        }
        let mut root = Map::new();
        root.insert("runtimes".to_string(), Value::Object(runtimes));
        Value::Object(root)
    }
}

fn parse_description(rid: &str, body: &Map<String, Value>) -> Result<RuntimeDescription, String> {
    let mut description = RuntimeDescription {
        rid: rid.to_string(),
        ..Default::default()
    };
    for (key, value) in body {
        if key == IMPORT_KEY {
            let imports = value
                .as_array()
                .ok_or_else(|| format!("'{IMPORT_KEY}' of '{rid}' must be an array"))?;
            for import in imports {
                let import = import
                    .as_str()
                    .ok_or_else(|| format!("imports of '{rid}' must be strings"))?;
                if !description.imports.iter().any(|i| i == import) {
                    description.imports.push(import.to_string());
                }
            }
            continue;
        }

        let deps = value
            .as_object()
            .ok_or_else(|| format!("dependency set '{key}' of '{rid}' must be an object"))?;
        let mut dependencies = Vec::new();
        for (dep_id, range) in deps {
            let range = range
                .as_str()
                .ok_or_else(|| format!("range of '{dep_id}' in '{rid}' must be a string"))?;
            let range = VersionRange::parse(range).map_err(|e| e.to_string())?;
            dependencies.push((PackageId::new(dep_id.as_str()), range));
        }
        let id = PackageId::new(key.as_str());
        description.dependency_sets.insert(
            id.clone(),
            RuntimeDependencySet { id, dependencies },
        );
    }
    Ok(description)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_imports_and_dependency_sets() {
        let json = r##"{
            "runtimes": {
                "win7-x86": {
                    "#import": ["win7", "win-x86"],
                    "packageA": { "runtime.win7-x86.packageA": "1.0.0" }
                },
                "win7": { "#import": ["win"] }
            }
        }"##;
        let graph = RuntimeGraph::from_json(json).unwrap();
        assert_eq!(graph.len(), 2);
        let win7_x86 = graph.get("win7-x86").unwrap();
        assert_eq!(win7_x86.imports, vec!["win7", "win-x86"]);
        let set = &win7_x86.dependency_sets[&PackageId::new("packagea")];
        assert_eq!(set.dependencies.len(), 1);
        assert_eq!(set.dependencies[0].0.as_str(), "runtime.win7-x86.packageA");
    }

    #[test]
    fn missing_runtimes_section_is_empty() {
        assert!(RuntimeGraph::from_json("{}").unwrap().is_empty());
    }

    #[test]
    fn malformed_graph_is_error() {
        assert!(RuntimeGraph::from_json(r#"{"runtimes": []}"#).is_err());
        assert!(RuntimeGraph::from_json(r##"{"runtimes": {"x": {"#import": "y"}}}"##).is_err());
        assert!(RuntimeGraph::from_json("not json").is_err());
    }

    #[test]
    fn merge_appends_new_imports() {
        let mut base = RuntimeGraph::new();
        base.add(RuntimeDescription::new("win7-x86", &["win7"]));
        let mut fragment = RuntimeGraph::new();
        fragment.add(RuntimeDescription::new("win7-x86", &["win7", "win-x86"]));
        fragment.add(RuntimeDescription::new("custom", &[]));

        let merged = base.merged_with(&fragment);
        assert_eq!(merged.get("win7-x86").unwrap().imports, vec!["win7", "win-x86"]);
        assert!(merged.get("custom").is_some());
    }

    #[test]
    fn host_default_knows_common_rids() {
        let graph = RuntimeGraph::host_default();
        assert_eq!(graph.get("win7-x86").unwrap().imports, vec!["win7", "win-x86"]);
        assert!(graph.get("linux-x64").is_some());
        assert!(graph.get("base").unwrap().imports.is_empty());
    }

    #[test]
    fn json_round_trip_keeps_imports() {
        let graph = RuntimeGraph::host_default();
        let text = graph.to_json().to_string();
        assert_eq!(RuntimeGraph::from_json(&text).unwrap(), graph);
    }
}
