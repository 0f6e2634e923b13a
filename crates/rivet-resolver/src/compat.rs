//! Framework compatibility: which asset frameworks a target can consume, and
//! which of several candidates is the nearest.

use std::cmp::Ordering;

use rivet_core::framework::{Framework, FrameworkFamily, FrameworkVersion};

/// How a candidate relates to the target. Lower is nearer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Tier {
    SameFamily,
    /// Index into the target's mapping list.
    Mapped(usize),
    NetStandard,
    Any,
}

/// A family the target can also consume, up to a maximum version.
#[derive(Debug, Clone, Copy)]
struct FamilyMapping {
    family: FrameworkFamily,
    max: FrameworkVersion,
}

/// The framework compatibility table. Built once per restore.
#[derive(Debug, Clone)]
pub struct FrameworkCompatibility {
    /// `(family, minimum target version, netstandard version implemented)`,
    /// highest minimum first within a family.
    netstandard: Vec<(FrameworkFamily, FrameworkVersion, FrameworkVersion)>,
}

const fn v(major: u32, minor: u32) -> FrameworkVersion {
    FrameworkVersion::new(major, minor)
}

const fn vp(major: u32, minor: u32, patch: u32) -> FrameworkVersion {
    FrameworkVersion::with_patch(major, minor, patch)
}

const UNBOUNDED: FrameworkVersion = FrameworkVersion::new(u32::MAX, 0);

impl Default for FrameworkCompatibility {
    fn default() -> Self {
        use FrameworkFamily::*;
        Self {
            netstandard: vec![
                (NetCoreApp, v(2, 1), v(2, 1)),
                (NetCoreApp, v(2, 0), v(2, 0)),
                (NetCoreApp, v(1, 0), v(1, 6)),
                (Net, v(5, 0), v(2, 1)),
                (NetFramework, vp(4, 6, 1), v(2, 0)),
                (NetFramework, v(4, 6), v(1, 3)),
                (NetFramework, vp(4, 5, 1), v(1, 2)),
                (NetFramework, v(4, 5), v(1, 1)),
                (Uap, v(10, 0), v(1, 4)),
                (Windows, v(8, 1), v(1, 2)),
                (Windows, v(8, 0), v(1, 1)),
                (WindowsPhoneApp, v(8, 1), v(1, 2)),
                (NetCore, v(5, 0), v(1, 4)),
                (NetCore, vp(4, 5, 1), v(1, 2)),
                (NetCore, v(4, 5), v(1, 1)),
            ],
        }
    }
}

impl FrameworkCompatibility {
    /// Highest `netstandard` version the target implements.
    pub fn netstandard_support(&self, target: &Framework) -> Option<FrameworkVersion> {
        self.netstandard
            .iter()
            .find(|(family, min, _)| *family == target.family() && target.version() >= *min)
            .map(|(_, _, supported)| *supported)
    }

    /// Other families the target consumes, nearest first.
    fn mappings(&self, target: &Framework) -> Vec<FamilyMapping> {
        let t = target.version();
        let map = |family, max| FamilyMapping { family, max };
        match target.family() {
            FrameworkFamily::Uap if t >= v(10, 0) => vec![
                map(FrameworkFamily::Windows, v(8, 1)),
                map(FrameworkFamily::WindowsPhoneApp, v(8, 1)),
                map(FrameworkFamily::NetCore, v(5, 0)),
            ],
            FrameworkFamily::NetCore if t >= v(5, 0) => {
                vec![map(FrameworkFamily::Windows, v(8, 1))]
            }
            // win8 is netcore45, win81 is netcore451.
            FrameworkFamily::NetCore if t >= v(4, 5) => vec![map(FrameworkFamily::Windows, netcore_to_win(t))],
            FrameworkFamily::Windows => vec![map(FrameworkFamily::NetCore, win_to_netcore(t))],
            FrameworkFamily::Net => vec![map(FrameworkFamily::NetCoreApp, UNBOUNDED)],
            _ => Vec::new(),
        }
    }

    fn tier(&self, target: &Framework, candidate: &Framework) -> Option<Tier> {
        if candidate.is_any() {
            return Some(Tier::Any);
        }
        if candidate.family() == target.family() {
            return (candidate.version() <= target.version()).then_some(Tier::SameFamily);
        }
        if let Some(i) = self
            .mappings(target)
            .iter()
            .position(|m| m.family == candidate.family() && candidate.version() <= m.max)
        {
            return Some(Tier::Mapped(i));
        }
        if candidate.family() == FrameworkFamily::NetStandard {
            let supported = self.netstandard_support(target)?;
            return (candidate.version() <= supported).then_some(Tier::NetStandard);
        }
        None
    }

    /// Whether assets built for `candidate` can be used by `target`.
    pub fn is_compatible(&self, target: &Framework, candidate: &Framework) -> bool {
        self.tier(target, candidate).is_some()
    }

    /// Pick the nearest compatible candidate: nearest tier, then highest
    /// version, then short name. `None` when nothing is compatible.
    pub fn select_nearest<'a, T>(
        &self,
        target: &Framework,
        candidates: impl IntoIterator<Item = (&'a Framework, T)>,
    ) -> Option<(&'a Framework, T)> {
        let mut best: Option<(Tier, &'a Framework, T)> = None;
        for (framework, value) in candidates {
            let Some(tier) = self.tier(target, framework) else {
                continue;
            };
            let better = match &best {
                None => true,
                Some((best_tier, best_fw, _)) => {
                    compare(tier, framework, *best_tier, best_fw) == Ordering::Less
                }
            };
            if better {
                best = Some((tier, framework, value));
            }
        }
        best.map(|(_, framework, value)| (framework, value))
    }

    /// Nearest framework from a plain list.
    pub fn get_nearest<'a>(&self, target: &Framework, frameworks: &'a [Framework]) -> Option<&'a Framework> {
        self.select_nearest(target, frameworks.iter().map(|f| (f, ())))
            .map(|(framework, _)| framework)
    }
}

fn compare(tier: Tier, framework: &Framework, other_tier: Tier, other: &Framework) -> Ordering {
    tier.cmp(&other_tier)
        .then_with(|| other.version().cmp(&framework.version()))
        .then_with(|| framework.short_name().cmp(&other.short_name()))
}

fn netcore_to_win(netcore: FrameworkVersion) -> FrameworkVersion {
    if netcore >= vp(4, 5, 1) {
        v(8, 1)
    } else {
        v(8, 0)
    }
}

fn win_to_netcore(win: FrameworkVersion) -> FrameworkVersion {
    if win >= v(8, 1) {
        vp(4, 5, 1)
    } else {
        v(4, 5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fw(s: &str) -> Framework {
        Framework::parse(s).unwrap()
    }

    fn nearest(target: &str, candidates: &[&str]) -> Option<String> {
        let frameworks: Vec<Framework> = candidates.iter().map(|c| fw(c)).collect();
        FrameworkCompatibility::default()
            .get_nearest(&fw(target), &frameworks)
            .map(Framework::short_name)
    }

    #[test]
    fn same_family_picks_highest_not_above_target() {
        assert_eq!(
            nearest("netstandard1.5", &["netstandard1.0", "netstandard1.3", "netstandard2.0"]),
            Some("netstandard1.3".into())
        );
        assert_eq!(nearest("net461", &["net45", "net40", "net472"]), Some("net45".into()));
    }

    #[test]
    fn same_family_beats_netstandard() {
        assert_eq!(
            nearest("net461", &["netstandard2.0", "net45"]),
            Some("net45".into())
        );
    }

    #[test]
    fn netstandard_support_table() {
        let compat = FrameworkCompatibility::default();
        assert_eq!(compat.netstandard_support(&fw("net45")), Some(v(1, 1)));
        assert_eq!(compat.netstandard_support(&fw("net461")), Some(v(2, 0)));
        assert_eq!(compat.netstandard_support(&fw("netcoreapp1.0")), Some(v(1, 6)));
        assert_eq!(compat.netstandard_support(&fw("netcoreapp3.1")), Some(v(2, 1)));
        assert_eq!(compat.netstandard_support(&fw("net6.0")), Some(v(2, 1)));
        assert_eq!(compat.netstandard_support(&fw("uap10.0")), Some(v(1, 4)));
        assert_eq!(compat.netstandard_support(&fw("win81")), Some(v(1, 2)));
        assert_eq!(compat.netstandard_support(&fw("netcore50")), Some(v(1, 4)));
    }

    #[test]
    fn uap_consumes_windows_store_assets() {
        assert_eq!(nearest("uap10.0", &["win8", "win81"]), Some("win81".into()));
        assert_eq!(nearest("uap10.0", &["net45"]), None);
        assert_eq!(
            nearest("uap10.0", &["netstandard1.1", "netstandard1.2", "netstandard2.0"]),
            Some("netstandard1.2".into())
        );
        assert_eq!(nearest("uap10.0", &["netstandard1.4", "win81"]), Some("win81".into()));
    }

    #[test]
    fn net5_consumes_netcoreapp() {
        assert_eq!(
            nearest("net6.0", &["netcoreapp3.1", "netstandard2.1"]),
            Some("netcoreapp3.1".into())
        );
        assert_eq!(nearest("net6.0", &["net5.0", "netcoreapp3.1"]), Some("net5.0".into()));
    }

    #[test]
    fn any_is_the_last_resort() {
        assert_eq!(nearest("net45", &["any"]), Some("any".into()));
        assert_eq!(nearest("net45", &["any", "net40"]), Some("net40".into()));
    }

    #[test]
    fn no_match_is_none() {
        assert_eq!(nearest("netstandard1.0", &["netstandard1.5", "net45"]), None);
        assert!(!FrameworkCompatibility::default().is_compatible(&fw("net40"), &fw("netstandard1.0")));
    }

    #[test]
    fn selection_is_order_independent() {
        let a = nearest("uap10.0", &["win8", "netstandard1.4", "win81", "any"]);
        let b = nearest("uap10.0", &["any", "win81", "netstandard1.4", "win8"]);
        assert_eq!(a, b);
    }
}
