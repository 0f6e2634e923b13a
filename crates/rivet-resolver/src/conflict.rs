//! Version conflict detection and reporting.

use std::fmt;

use rivet_core::package::PackageId;
use rivet_core::version::{PackageVersion, VersionRange};

/// A report of all version conflicts encountered during a restore.
#[derive(Debug, Default, Clone)]
pub struct ConflictReport {
    pub conflicts: Vec<VersionConflict>,
}

/// A package requested with a range that the nearest-wins choice does not satisfy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionConflict {
    pub id: PackageId,
    /// `framework` or `framework/rid`.
    pub target: String,
    pub requested: VersionRange,
    pub resolved: PackageVersion,
    pub reason: String,
}

impl VersionConflict {
    /// Describe a later request that the nearer winner fails to satisfy.
    pub fn new(
        id: PackageId,
        target: impl Into<String>,
        requested: VersionRange,
        resolved: PackageVersion,
        winner_range: &VersionRange,
        depths: (usize, usize),
    ) -> Self {
        let overlap = match winner_range.intersect(&requested) {
            Some(_) => "ranges overlap",
            None => "no version satisfies both",
        };
        let reason = format!(
            "nearest wins (depth {} vs {}), {overlap}",
            depths.0, depths.1
        );
        Self {
            id,
            target: target.into(),
            requested,
            resolved,
            reason,
        }
    }
}

impl VersionConflict {
    /// A RID graph entry whose range excludes the version the framework graph chose.
    pub fn pinned(id: PackageId, target: impl Into<String>, requested: VersionRange, resolved: PackageVersion) -> Self {
        Self {
            id,
            target: target.into(),
            requested,
            resolved,
            reason: "pinned by the framework graph".to_string(),
        }
    }
}

impl ConflictReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, conflict: VersionConflict) {
        self.conflicts.push(conflict);
    }

    pub fn extend(&mut self, other: ConflictReport) {
        self.conflicts.extend(other.conflicts);
    }

    pub fn is_empty(&self) -> bool {
        self.conflicts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.conflicts.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &VersionConflict> {
        self.conflicts.iter()
    }
}

impl fmt::Display for ConflictReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.conflicts.is_empty() {
            return write!(f, "No version conflicts.");
        }
        writeln!(f, "Version conflicts ({}):", self.conflicts.len())?;
        for c in &self.conflicts {
            writeln!(
                f,
                "  {} [{}] requested {} but resolved {} ({})",
                c.id,
                c.target,
                c.requested.pretty(),
                c.resolved,
                c.reason
            )?;
        }
        Ok(())
    }
}

impl fmt::Display for VersionConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} -> {} ({})",
            self.id,
            self.requested.pretty(),
            self.resolved,
            self.reason
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(s: &str) -> VersionRange {
        VersionRange::parse(s).unwrap()
    }

    #[test]
    fn empty_report() {
        let report = ConflictReport::new();
        assert!(report.is_empty());
        assert_eq!(report.len(), 0);
        assert_eq!(report.to_string(), "No version conflicts.");
    }

    #[test]
    fn report_with_conflicts() {
        let mut report = ConflictReport::new();
        report.add(VersionConflict::new(
            PackageId::new("PackageX"),
            "net45",
            range("2.0.0"),
            PackageVersion::new(1, 0, 0),
            &range("1.0.0"),
            (1, 2),
        ));
        assert!(!report.is_empty());
        assert_eq!(report.len(), 1);
        let s = report.to_string();
        assert!(s.contains("PackageX [net45]"));
        assert!(s.contains("requested >= 2.0.0 but resolved 1.0.0"));
        assert!(s.contains("depth 1 vs 2"));
    }

    #[test]
    fn disjoint_ranges_are_called_out() {
        let conflict = VersionConflict::new(
            PackageId::new("x"),
            "net45",
            range("[2.0.0, 3.0.0)"),
            PackageVersion::new(1, 0, 0),
            &range("[1.0.0, 2.0.0)"),
            (1, 3),
        );
        assert!(conflict.reason.contains("no version satisfies both"));
    }
}
