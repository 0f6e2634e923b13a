//! Package versions and version ranges.
//!
//! Versions follow the NuGet flavour of SemVer:
//! - up to four numeric components (`major.minor.patch.revision`), missing
//!   components are zero, so `1.0` == `1.0.0` == `1.0.0.0`
//! - an optional pre-release label (`-beta.2`) that sorts below the release
//! - optional build metadata (`+sha.1234`) that never affects ordering
//!
//! Ranges use interval notation (`[1.0, 2.0)`), a bare version meaning
//! "at least", or a floating pattern (`1.0.*`, `1.0.0-beta*`).

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use rivet_util::errors::RivetError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A parsed package version.
#[derive(Debug, Clone)]
pub struct PackageVersion {
    major: u64,
    minor: u64,
    patch: u64,
    revision: u64,
    release_labels: Vec<String>,
    metadata: Option<String>,
}

fn version_error(input: &str, reason: &str) -> RivetError {
    RivetError::Version {
        message: format!("'{input}' {reason}"),
    }
}

impl PackageVersion {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            revision: 0,
            release_labels: Vec::new(),
            metadata: None,
        }
    }

    /// Attach a pre-release label such as `beta.2`.
    pub fn with_release(mut self, label: &str) -> Self {
        self.release_labels = label.split('.').map(str::to_string).collect();
        self
    }

    pub fn parse(input: &str) -> Result<Self, RivetError> {
        let s = input.trim();
        if s.is_empty() {
            return Err(version_error(input, "is empty"));
        }

        let (rest, metadata) = match s.split_once('+') {
            Some((r, m)) => {
                if m.is_empty() {
                    return Err(version_error(input, "has empty build metadata"));
                }
                (r, Some(m.to_string()))
            }
            None => (s, None),
        };

        let (numbers, label) = match rest.split_once('-') {
            Some((n, l)) => (n, Some(l)),
            None => (rest, None),
        };

        let parts: Vec<&str> = numbers.split('.').collect();
        if parts.is_empty() || parts.len() > 4 {
            return Err(version_error(input, "must have between 1 and 4 numeric parts"));
        }
        let mut nums = [0u64; 4];
        for (i, part) in parts.iter().enumerate() {
            if part.is_empty() || !part.chars().all(|c| c.is_ascii_digit()) {
                return Err(version_error(input, "is not a valid version"));
            }
            nums[i] = part
                .parse()
                .map_err(|_| version_error(input, "has a numeric part that is too large"))?;
        }

        let release_labels = match label {
            None => Vec::new(),
            Some(l) => {
                let labels: Vec<String> = l.split('.').map(str::to_string).collect();
                let valid = labels.iter().all(|seg| {
                    !seg.is_empty() && seg.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
                });
                if !valid {
                    return Err(version_error(input, "has an invalid pre-release label"));
                }
                labels
            }
        };

        Ok(Self {
            major: nums[0],
            minor: nums[1],
            patch: nums[2],
            revision: nums[3],
            release_labels,
            metadata,
        })
    }

    pub fn major(&self) -> u64 {
        self.major
    }

    pub fn minor(&self) -> u64 {
        self.minor
    }

    pub fn patch(&self) -> u64 {
        self.patch
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn is_prerelease(&self) -> bool {
        !self.release_labels.is_empty()
    }

    /// The pre-release label joined with dots, empty for releases.
    pub fn release(&self) -> String {
        self.release_labels.join(".")
    }

    pub fn metadata(&self) -> Option<&str> {
        self.metadata.as_deref()
    }

    fn numbers(&self) -> [u64; 4] {
        [self.major, self.minor, self.patch, self.revision]
    }

    /// The same numeric version without pre-release label or metadata.
    pub fn to_release(&self) -> Self {
        Self {
            release_labels: Vec::new(),
            metadata: None,
            ..self.clone()
        }
    }
}

impl fmt::Display for PackageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if self.revision > 0 {
            write!(f, ".{}", self.revision)?;
        }
        if self.is_prerelease() {
            write!(f, "-{}", self.release())?;
        }
        Ok(())
    }
}

impl FromStr for PackageVersion {
    type Err = RivetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl PartialEq for PackageVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PackageVersion {}

impl Hash for PackageVersion {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.numbers().hash(state);
        for label in &self.release_labels {
            label.to_ascii_lowercase().hash(state);
        }
    }
}

impl Ord for PackageVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.numbers()
            .cmp(&other.numbers())
            .then_with(|| compare_release_labels(&self.release_labels, &other.release_labels))
    }
}

impl PartialOrd for PackageVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn compare_release_labels(a: &[String], b: &[String]) -> Ordering {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Greater,
        (false, true) => return Ordering::Less,
        (false, false) => {}
    }
    for (x, y) in a.iter().zip(b.iter()) {
        let ord = compare_label(x, y);
        if ord != Ordering::Equal {
            return ord;
        }
    }
    a.len().cmp(&b.len())
}

fn compare_label(a: &str, b: &str) -> Ordering {
    let a_num = a.parse::<u64>().ok();
    let b_num = b.parse::<u64>().ok();
    match (a_num, b_num) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.to_ascii_lowercase().cmp(&b.to_ascii_lowercase()),
    }
}

impl Serialize for PackageVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PackageVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Which part of a floating range may move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatBehavior {
    /// `1.0.0-beta*`: highest pre-release with the given prefix.
    Prerelease,
    /// `1.0.0.*`
    Revision,
    /// `1.0.*`
    Patch,
    /// `1.*`
    Minor,
    /// `*`
    Major,
}

/// The floating part of a range, e.g. `1.0.*`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FloatRange {
    behavior: FloatBehavior,
    /// Fixed numeric components before the `*`.
    fixed: Vec<u64>,
    /// Pre-release prefix for [`FloatBehavior::Prerelease`].
    release_prefix: String,
}

impl FloatRange {
    pub fn behavior(&self) -> FloatBehavior {
        self.behavior
    }

    /// Whether `version` matches the floating pattern.
    pub fn matches(&self, version: &PackageVersion) -> bool {
        let numbers = version.numbers();
        if !self.fixed.iter().zip(numbers.iter()).all(|(f, n)| f == n) {
            return false;
        }
        match self.behavior {
            FloatBehavior::Prerelease => {
                !version.is_prerelease()
                    || version
                        .release()
                        .to_ascii_lowercase()
                        .starts_with(&self.release_prefix.to_ascii_lowercase())
            }
            _ => !version.is_prerelease(),
        }
    }

    fn parse(input: &str) -> Result<(Self, PackageVersion), RivetError> {
        let s = input.trim();
        if s == "*" {
            let float = Self {
                behavior: FloatBehavior::Major,
                fixed: Vec::new(),
                release_prefix: String::new(),
            };
            return Ok((float, PackageVersion::new(0, 0, 0)));
        }

        let Some(base) = s.strip_suffix('*') else {
            return Err(version_error(input, "may only float on its last part"));
        };
        if base.contains('*') {
            return Err(version_error(input, "may contain a single '*'"));
        }

        if let Some((numbers, prefix)) = base.split_once('-') {
            let min = PackageVersion::parse(&format!(
                "{numbers}-{}",
                if prefix.is_empty() { "0" } else { prefix.trim_end_matches('.') }
            ))?;
            let fixed = min.numbers().to_vec();
            let float = Self {
                behavior: FloatBehavior::Prerelease,
                fixed,
                release_prefix: prefix.to_string(),
            };
            return Ok((float, min));
        }

        let Some(numbers) = base.strip_suffix('.') else {
            return Err(version_error(input, "must float on a whole version part"));
        };
        let fixed: Vec<u64> = numbers
            .split('.')
            .map(|p| p.parse::<u64>())
            .collect::<Result<_, _>>()
            .map_err(|_| version_error(input, "is not a valid floating version"))?;
        let behavior = match fixed.len() {
            1 => FloatBehavior::Minor,
            2 => FloatBehavior::Patch,
            3 => FloatBehavior::Revision,
            _ => return Err(version_error(input, "floats on too many parts")),
        };
        let min = PackageVersion::parse(numbers)?;
        Ok((
            Self {
                behavior,
                fixed,
                release_prefix: String::new(),
            },
            min,
        ))
    }
}

/// A version constraint: optional lower and upper bounds plus an optional float.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionRange {
    min: Option<PackageVersion>,
    min_inclusive: bool,
    max: Option<PackageVersion>,
    max_inclusive: bool,
    float: Option<FloatRange>,
}

impl VersionRange {
    /// Every version, pre-releases excluded.
    pub fn all() -> Self {
        Self {
            min: None,
            min_inclusive: false,
            max: None,
            max_inclusive: false,
            float: None,
        }
    }

    /// `>= version`
    pub fn at_least(version: PackageVersion) -> Self {
        Self {
            min: Some(version),
            min_inclusive: true,
            ..Self::all()
        }
    }

    /// `[version]`
    pub fn exact(version: PackageVersion) -> Self {
        Self {
            min: Some(version.clone()),
            min_inclusive: true,
            max: Some(version),
            max_inclusive: true,
            float: None,
        }
    }

    /// Build a range from explicit bounds, validating them.
    pub fn new(
        min: Option<PackageVersion>,
        min_inclusive: bool,
        max: Option<PackageVersion>,
        max_inclusive: bool,
    ) -> Result<Self, RivetError> {
        let range = Self {
            min,
            min_inclusive,
            max,
            max_inclusive,
            float: None,
        };
        range.validate()?;
        Ok(range)
    }

    pub fn parse(input: &str) -> Result<Self, RivetError> {
        let s = input.trim();
        if s.is_empty() {
            return Err(version_error(input, "is an empty version range"));
        }

        if s.contains('*') {
            let (float, min) = FloatRange::parse(s)?;
            return Ok(Self {
                min: Some(min),
                min_inclusive: true,
                max: None,
                max_inclusive: false,
                float: Some(float),
            });
        }

        let first = s.chars().next().unwrap_or_default();
        if first != '[' && first != '(' {
            return Ok(Self::at_least(PackageVersion::parse(s)?));
        }

        let min_inclusive = first == '[';
        let max_inclusive = match s.chars().last() {
            Some(']') => true,
            Some(')') => false,
            _ => return Err(version_error(input, "is missing a closing ']' or ')'")),
        };
        let inner = s[1..s.len() - 1].trim();

        let range = match inner.split_once(',') {
            None => {
                if !(min_inclusive && max_inclusive) {
                    return Err(version_error(input, "must use '[x]' for an exact version"));
                }
                Self::exact(PackageVersion::parse(inner)?)
            }
            Some((lower, upper)) => {
                let lower = lower.trim();
                let upper = upper.trim();
                if upper.contains(',') {
                    return Err(version_error(input, "has more than two bounds"));
                }
                if lower.is_empty() && upper.is_empty() {
                    return Err(version_error(input, "has no bounds"));
                }
                Self {
                    min: (!lower.is_empty())
                        .then(|| PackageVersion::parse(lower))
                        .transpose()?,
                    min_inclusive: !lower.is_empty() && min_inclusive,
                    max: (!upper.is_empty())
                        .then(|| PackageVersion::parse(upper))
                        .transpose()?,
                    max_inclusive: !upper.is_empty() && max_inclusive,
                    float: None,
                }
            }
        };
        range.validate().map_err(|e| match e {
            RivetError::Version { message } => RivetError::Version {
                message: format!("'{input}': {message}"),
            },
            other => other,
        })?;
        Ok(range)
    }

    fn validate(&self) -> Result<(), RivetError> {
        if let (Some(min), Some(max)) = (&self.min, &self.max) {
            match min.cmp(max) {
                Ordering::Greater => {
                    return Err(RivetError::Version {
                        message: format!("minimum {min} is greater than maximum {max}"),
                    })
                }
                Ordering::Equal if !(self.min_inclusive && self.max_inclusive) => {
                    return Err(RivetError::Version {
                        message: format!("exclusive bounds on {min} leave the range empty"),
                    })
                }
                _ => {}
            }
        }
        Ok(())
    }

    pub fn min(&self) -> Option<&PackageVersion> {
        self.min.as_ref()
    }

    pub fn max(&self) -> Option<&PackageVersion> {
        self.max.as_ref()
    }

    pub fn is_min_inclusive(&self) -> bool {
        self.min_inclusive
    }

    pub fn is_max_inclusive(&self) -> bool {
        self.max_inclusive
    }

    pub fn float(&self) -> Option<&FloatRange> {
        self.float.as_ref()
    }

    pub fn is_floating(&self) -> bool {
        self.float.is_some()
    }

    /// Whether the range explicitly admits pre-release versions.
    fn allows_prerelease(&self) -> bool {
        self.min.as_ref().is_some_and(PackageVersion::is_prerelease)
            || self.max.as_ref().is_some_and(PackageVersion::is_prerelease)
            || self
                .float
                .as_ref()
                .is_some_and(|f| f.behavior == FloatBehavior::Prerelease)
    }

    /// Bounds check only; floats are treated as their lower bound.
    pub fn satisfies(&self, version: &PackageVersion) -> bool {
        if let Some(min) = &self.min {
            match version.cmp(min) {
                Ordering::Less => return false,
                Ordering::Equal if !self.min_inclusive => return false,
                _ => {}
            }
        }
        if let Some(max) = &self.max {
            match version.cmp(max) {
                Ordering::Greater => return false,
                Ordering::Equal if !self.max_inclusive => return false,
                _ => {}
            }
        }
        true
    }

    /// Whether `version` lies below the lower bound.
    pub fn is_below_min(&self, version: &PackageVersion) -> bool {
        match &self.min {
            Some(min) => match version.cmp(min) {
                Ordering::Less => true,
                Ordering::Equal => !self.min_inclusive,
                Ordering::Greater => false,
            },
            None => false,
        }
    }

    /// Whether `version` lies above the upper bound.
    pub fn is_above_max(&self, version: &PackageVersion) -> bool {
        match &self.max {
            Some(max) => match version.cmp(max) {
                Ordering::Greater => true,
                Ordering::Equal => !self.max_inclusive,
                Ordering::Less => false,
            },
            None => false,
        }
    }

    fn is_eligible(&self, version: &PackageVersion) -> bool {
        (!version.is_prerelease() || self.allows_prerelease()) && self.satisfies(version)
    }

    /// Whether `candidate` is a better pick than `current` for this range.
    ///
    /// Non-floating ranges prefer the lowest applicable version. Floating
    /// ranges prefer the highest version that matches the float, and fall
    /// back to the lowest applicable one when nothing matches.
    pub fn is_better(&self, current: Option<&PackageVersion>, candidate: &PackageVersion) -> bool {
        if !self.is_eligible(candidate) {
            return false;
        }
        let Some(current) = current else {
            return true;
        };
        match &self.float {
            None => candidate < current,
            Some(float) => match (float.matches(current), float.matches(candidate)) {
                (true, true) => candidate > current,
                (false, true) => true,
                (true, false) => false,
                (false, false) => candidate < current,
            },
        }
    }

    /// Pick the best version from `versions`, or `None` if nothing applies.
    pub fn find_best_match<'a, I>(&self, versions: I) -> Option<&'a PackageVersion>
    where
        I: IntoIterator<Item = &'a PackageVersion>,
    {
        let mut best: Option<&PackageVersion> = None;
        for v in versions {
            if self.is_better(best, v) {
                best = Some(v);
            }
        }
        best
    }

    /// The range of versions satisfying both `self` and `other`, or `None`
    /// when they do not overlap. Floats are dropped; only bounds intersect.
    pub fn intersect(&self, other: &VersionRange) -> Option<VersionRange> {
        let (min, min_inclusive) = match (&self.min, &other.min) {
            (None, None) => (None, false),
            (Some(a), None) => (Some(a.clone()), self.min_inclusive),
            (None, Some(b)) => (Some(b.clone()), other.min_inclusive),
            (Some(a), Some(b)) => match a.cmp(b) {
                Ordering::Greater => (Some(a.clone()), self.min_inclusive),
                Ordering::Less => (Some(b.clone()), other.min_inclusive),
                Ordering::Equal => (Some(a.clone()), self.min_inclusive && other.min_inclusive),
            },
        };
        let (max, max_inclusive) = match (&self.max, &other.max) {
            (None, None) => (None, false),
            (Some(a), None) => (Some(a.clone()), self.max_inclusive),
            (None, Some(b)) => (Some(b.clone()), other.max_inclusive),
            (Some(a), Some(b)) => match a.cmp(b) {
                Ordering::Less => (Some(a.clone()), self.max_inclusive),
                Ordering::Greater => (Some(b.clone()), other.max_inclusive),
                Ordering::Equal => (Some(a.clone()), self.max_inclusive && other.max_inclusive),
            },
        };
        VersionRange::new(min, min_inclusive, max, max_inclusive).ok()
    }

    /// Short human form used in dependency listings: `>= 1.0.0`, `>= 1.0.0 < 2.0.0`.
    pub fn pretty(&self) -> String {
        if let Some(float) = &self.float {
            return float_pattern(float, self.min.as_ref());
        }
        match (&self.min, &self.max) {
            (Some(min), Some(max)) if min == max => format!("= {min}"),
            (min, max) => {
                let mut parts = Vec::new();
                if let Some(min) = min {
                    let op = if self.min_inclusive { ">=" } else { ">" };
                    parts.push(format!("{op} {min}"));
                }
                if let Some(max) = max {
                    let op = if self.max_inclusive { "<=" } else { "<" };
                    parts.push(format!("{op} {max}"));
                }
                parts.join(" ")
            }
        }
    }
}

fn float_pattern(float: &FloatRange, min: Option<&PackageVersion>) -> String {
    match float.behavior {
        FloatBehavior::Major => "*".to_string(),
        FloatBehavior::Prerelease => {
            let base = min.map(PackageVersion::to_release).unwrap_or_else(|| PackageVersion::new(0, 0, 0));
            format!("{base}-{}*", float.release_prefix)
        }
        _ => {
            let fixed: Vec<String> = float.fixed.iter().map(u64::to_string).collect();
            format!("{}.*", fixed.join("."))
        }
    }
}

impl fmt::Display for VersionRange {
    /// Normalized interval form: `[1.0.0, )`, `[1.0.0, 2.0.0)`, `[1.0.0]`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(float) = &self.float {
            return f.write_str(&float_pattern(float, self.min.as_ref()));
        }
        if let (Some(min), Some(max)) = (&self.min, &self.max) {
            if min == max && self.min_inclusive && self.max_inclusive {
                return write!(f, "[{min}]");
            }
        }
        let open = if self.min.is_some() && self.min_inclusive { '[' } else { '(' };
        let close = if self.max.is_some() && self.max_inclusive { ']' } else { ')' };
        let min = self.min.as_ref().map(|v| v.to_string()).unwrap_or_default();
        let max = self.max.as_ref().map(|v| v.to_string()).unwrap_or_default();
        write!(f, "{open}{min}, {max}{close}")
    }
}

impl FromStr for VersionRange {
    type Err = RivetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for VersionRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for VersionRange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
