//! Target frameworks parsed from short folder names such as `netstandard1.5`.

use std::fmt;
use std::str::FromStr;

use rivet_util::errors::RivetError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// The identifier family of a framework. Declaration order is the sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FrameworkFamily {
    /// Matches every target. Used for RID-only groups such as `runtimes/<rid>/native`.
    Any,
    NetStandard,
    NetCoreApp,
    /// `net5.0` and later.
    Net,
    /// .NET Framework: `net45`, `net461`.
    NetFramework,
    Uap,
    /// Windows Store: `win8`, `win81`.
    Windows,
    /// Windows Phone App: `wpa81`.
    WindowsPhoneApp,
    /// `netcore45`, `netcore451`, `netcore50`.
    NetCore,
}

/// A framework version, `major.minor.patch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct FrameworkVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl FrameworkVersion {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self {
            major,
            minor,
            patch: 0,
        }
    }

    pub const fn with_patch(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// `"1.5"` → 1.5, `"10.0"` → 10.0.
    fn parse_dotted(s: &str) -> Option<Self> {
        let mut parts = s.split('.');
        let major = parts.next()?.parse().ok()?;
        let minor = parts.next().map(str::parse).transpose().ok()?.unwrap_or(0);
        let patch = parts.next().map(str::parse).transpose().ok()?.unwrap_or(0);
        if parts.next().is_some() {
            return None;
        }
        Some(Self::with_patch(major, minor, patch))
    }

    /// `"45"` → 4.5, `"461"` → 4.6.1, `"8"` → 8.0.
    fn parse_compact(s: &str) -> Option<Self> {
        if s.is_empty() || s.len() > 3 || !s.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let digits: Vec<u32> = s.chars().filter_map(|c| c.to_digit(10)).collect();
        Some(Self::with_patch(
            digits[0],
            digits.get(1).copied().unwrap_or(0),
            digits.get(2).copied().unwrap_or(0),
        ))
    }

    fn compact(&self) -> String {
        let mut s = format!("{}{}", self.major, self.minor);
        if self.patch > 0 {
            s.push_str(&self.patch.to_string());
        }
        s
    }

    fn dotted(&self) -> String {
        if self.patch > 0 {
            format!("{}.{}.{}", self.major, self.minor, self.patch)
        } else {
            format!("{}.{}", self.major, self.minor)
        }
    }
}

impl fmt::Display for FrameworkVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dotted())
    }
}

/// A target framework: family plus version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Framework {
    family: FrameworkFamily,
    version: FrameworkVersion,
}

impl Framework {
    pub const ANY: Framework = Framework {
        family: FrameworkFamily::Any,
        version: FrameworkVersion::new(0, 0),
    };

    pub const fn new(family: FrameworkFamily, version: FrameworkVersion) -> Self {
        Self { family, version }
    }

    pub fn family(&self) -> FrameworkFamily {
        self.family
    }

    pub fn version(&self) -> FrameworkVersion {
        self.version
    }

    pub fn is_any(&self) -> bool {
        self.family == FrameworkFamily::Any
    }

    /// Parse a framework folder name. Returns `None` for unknown names.
    pub fn parse_folder(name: &str) -> Option<Self> {
        let lower = name.trim().to_ascii_lowercase();
        if lower.is_empty() || lower == "any" {
            return Some(Self::ANY);
        }

        let dotted = |prefix: &str, family| {
            lower
                .strip_prefix(prefix)
                .and_then(FrameworkVersion::parse_dotted)
                .map(|v| Self::new(family, v))
        };
        let compact = |prefix: &str, family| {
            lower
                .strip_prefix(prefix)
                .and_then(FrameworkVersion::parse_compact)
                .map(|v| Self::new(family, v))
        };

        // Longer prefixes first: `netcoreapp` and `netcore` both start with `net`.
        if lower.starts_with("netstandard") {
            return dotted("netstandard", FrameworkFamily::NetStandard);
        }
        if lower.starts_with("netcoreapp") {
            return dotted("netcoreapp", FrameworkFamily::NetCoreApp);
        }
        if lower.starts_with("netcore") {
            return compact("netcore", FrameworkFamily::NetCore);
        }
        if lower.starts_with("uap") {
            return dotted("uap", FrameworkFamily::Uap);
        }
        if lower.starts_with("wpa") {
            return compact("wpa", FrameworkFamily::WindowsPhoneApp);
        }
        if lower.starts_with("win") {
            return compact("win", FrameworkFamily::Windows);
        }
        if let Some(rest) = lower.strip_prefix("net") {
            if rest.contains('.') {
                return FrameworkVersion::parse_dotted(rest)
                    .filter(|v| v.major >= 5)
                    .map(|v| Self::new(FrameworkFamily::Net, v));
            }
            return compact("net", FrameworkFamily::NetFramework);
        }
        None
    }

    /// Parse a framework named in a request. Unknown names are errors.
    pub fn parse(name: &str) -> Result<Self, RivetError> {
        Self::parse_folder(name).ok_or_else(|| RivetError::Framework {
            message: format!("'{name}' is not a recognized target framework"),
        })
    }

    /// The canonical folder name: `netstandard1.5`, `net461`, `win81`.
    pub fn short_name(&self) -> String {
        let v = &self.version;
        match self.family {
            FrameworkFamily::Any => "any".to_string(),
            FrameworkFamily::NetStandard => format!("netstandard{}", v.dotted()),
            FrameworkFamily::NetCoreApp => format!("netcoreapp{}", v.dotted()),
            FrameworkFamily::Net => format!("net{}", v.dotted()),
            FrameworkFamily::NetFramework => format!("net{}", v.compact()),
            FrameworkFamily::Uap => format!("uap{}", v.dotted()),
            FrameworkFamily::Windows => {
                if v.minor == 0 && v.patch == 0 {
                    format!("win{}", v.major)
                } else {
                    format!("win{}", v.compact())
                }
            }
            FrameworkFamily::WindowsPhoneApp => format!("wpa{}", v.compact()),
            FrameworkFamily::NetCore => format!("netcore{}", v.compact()),
        }
    }
}

impl fmt::Display for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.short_name())
    }
}

impl FromStr for Framework {
    type Err = RivetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Framework {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Framework {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
