use std::fmt;

use rivet_util::errors::RivetError;
use serde::{Deserialize, Serialize};

use crate::framework::Framework;
use crate::package::PackageId;
use crate::version::VersionRange;

/// Asset categories a dependency edge may contribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AssetFlags(u8);

impl AssetFlags {
    pub const NONE: AssetFlags = AssetFlags(0);
    pub const COMPILE: AssetFlags = AssetFlags(1);
    pub const RUNTIME: AssetFlags = AssetFlags(1 << 1);
    pub const BUILD: AssetFlags = AssetFlags(1 << 2);
    pub const NATIVE: AssetFlags = AssetFlags(1 << 3);
    pub const CONTENT_FILES: AssetFlags = AssetFlags(1 << 4);
    pub const ANALYZERS: AssetFlags = AssetFlags(1 << 5);
    pub const ALL: AssetFlags = AssetFlags(0b11_1111);

    const NAMED: [(&'static str, AssetFlags); 6] = [
        ("compile", Self::COMPILE),
        ("runtime", Self::RUNTIME),
        ("build", Self::BUILD),
        ("native", Self::NATIVE),
        ("contentFiles", Self::CONTENT_FILES),
        ("analyzers", Self::ANALYZERS),
    ];

    /// Parse a comma- or semicolon-separated tag list such as `"runtime, native"`.
    pub fn parse(input: &str) -> Result<Self, RivetError> {
        let mut flags = Self::NONE;
        for tag in input.split([',', ';']).map(str::trim).filter(|t| !t.is_empty()) {
            flags = flags.union(match tag.to_ascii_lowercase().as_str() {
                "all" => Self::ALL,
                "none" => Self::NONE,
                lower => Self::NAMED
                    .iter()
                    .find(|(name, _)| name.to_ascii_lowercase() == lower)
                    .map(|(_, f)| *f)
                    .ok_or_else(|| RivetError::Request {
                        message: format!(
                            "unknown asset tag '{tag}', expected one of: all, none, compile, runtime, build, native, contentFiles, analyzers"
                        ),
                    })?,
            });
        }
        Ok(flags)
    }

    pub fn contains(self, other: AssetFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn intersects(self, other: AssetFlags) -> bool {
        self.0 & other.0 != 0
    }

    pub fn union(self, other: AssetFlags) -> AssetFlags {
        AssetFlags(self.0 | other.0)
    }

    pub fn intersection(self, other: AssetFlags) -> AssetFlags {
        AssetFlags(self.0 & other.0)
    }

    pub fn difference(self, other: AssetFlags) -> AssetFlags {
        AssetFlags(self.0 & !other.0)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Tag names set in these flags, in canonical order.
    pub fn names(self) -> Vec<&'static str> {
        Self::NAMED
            .iter()
            .filter(|(_, f)| self.contains(*f))
            .map(|(name, _)| *name)
            .collect()
    }
}

impl fmt::Display for AssetFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::ALL => f.write_str("all"),
            Self::NONE => f.write_str("none"),
            flags => f.write_str(&flags.names().join(", ")),
        }
    }
}

/// A dependency on a package: id, range, and the asset flags of the edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageDependency {
    pub id: PackageId,
    pub range: VersionRange,
    pub include: AssetFlags,
    pub exclude: AssetFlags,
}

impl PackageDependency {
    pub fn new(id: impl Into<PackageId>, range: VersionRange) -> Self {
        Self {
            id: id.into(),
            range,
            include: AssetFlags::ALL,
            exclude: AssetFlags::NONE,
        }
    }

    pub fn with_exclude(mut self, exclude: AssetFlags) -> Self {
        self.exclude = exclude;
        self
    }

    pub fn with_include(mut self, include: AssetFlags) -> Self {
        self.include = include;
        self
    }

    /// Flags this edge passes on: `include - exclude`.
    pub fn effective_flags(&self) -> AssetFlags {
        self.include.difference(self.exclude)
    }

    /// `"<id> <range>"` as written into the lock file's dependency groups.
    pub fn display_line(&self) -> String {
        format!("{} {}", self.id, self.range.pretty())
    }
}

/// A dependency as written in `rivet.toml` or `package.toml`.
///
/// Supports both shorthand (`"1.0.0"`) and detailed forms.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ManifestDependency {
    Short(String),
    Detailed(DetailedDependency),
}

/// A dependency with explicit version and optional asset tags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailedDependency {
    pub version: String,
    #[serde(default)]
    pub include: Option<String>,
    #[serde(default)]
    pub exclude: Option<String>,
}

impl ManifestDependency {
    /// Validate and convert into a [`PackageDependency`].
    pub fn to_dependency(&self, id: &str) -> Result<PackageDependency, RivetError> {
        let invalid = |e: RivetError| RivetError::Request {
            message: format!("dependency '{id}': {e}"),
        };
        match self {
            Self::Short(version) => {
                let range = VersionRange::parse(version).map_err(invalid)?;
                Ok(PackageDependency::new(id, range))
            }
            Self::Detailed(d) => {
                let range = VersionRange::parse(&d.version).map_err(invalid)?;
                let include = d
                    .include
                    .as_deref()
                    .map(AssetFlags::parse)
                    .transpose()
                    .map_err(invalid)?
                    .unwrap_or(AssetFlags::ALL);
                let exclude = d
                    .exclude
                    .as_deref()
                    .map(AssetFlags::parse)
                    .transpose()
                    .map_err(invalid)?
                    .unwrap_or(AssetFlags::NONE);
                Ok(PackageDependency::new(id, range)
                    .with_include(include)
                    .with_exclude(exclude))
            }
        }
    }
}

/// Dependencies a package declares for one target framework.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyGroup {
    pub framework: Framework,
    pub dependencies: Vec<PackageDependency>,
}

impl DependencyGroup {
    pub fn new(framework: Framework, dependencies: Vec<PackageDependency>) -> Self {
        Self {
            framework,
            dependencies,
        }
    }
}
