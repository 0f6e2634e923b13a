//! Package content model: package file paths grouped by RID and framework.
//!
//! Recognized layouts:
//! - `lib/<tfm>/<file>`: runtime asset
//! - `lib/<tfm>/<culture>/<file>`: resource asset
//! - `ref/<tfm>/<file>`: compile-only reference asset
//! - `runtimes/<rid>/lib/<tfm>/...`: the same, for one RID
//! - `runtimes/<rid>/native/...`: native asset for one RID
//!
//! Anything else stays in the file list only.

use std::collections::BTreeMap;

use rivet_core::framework::Framework;
use rivet_core::lockfile::PLACEHOLDER_FILE;

use crate::compat::FrameworkCompatibility;

pub use rivet_core::lockfile::AssetType;

/// One file of a `lib/` group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub path: String,
    pub asset_type: AssetType,
}

/// All asset groups of one package.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetGroups {
    files: Vec<String>,
    /// RID partition (`None` for the plain `lib/` folder) → framework → assets.
    lib: BTreeMap<Option<String>, BTreeMap<Framework, Vec<Asset>>>,
    reference: BTreeMap<Framework, Vec<String>>,
    native: BTreeMap<String, Vec<String>>,
}

impl AssetGroups {
    /// Classify package file paths (`/`-separated, relative to the package root).
    pub fn from_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut groups = Self::default();
        for path in paths {
            let path = path.as_ref().trim_start_matches('/').to_string();
            groups.classify(&path);
            groups.files.push(path);
        }
        groups.files.sort();
        groups.files.dedup();
        for by_framework in groups.lib.values_mut() {
            for assets in by_framework.values_mut() {
                assets.sort_by(|a, b| a.path.cmp(&b.path));
            }
        }
        for paths in groups.reference.values_mut().chain(groups.native.values_mut()) {
            paths.sort();
        }
        groups
    }

    fn classify(&mut self, path: &str) {
        let parts: Vec<&str> = path.split('/').collect();
        match parts.as_slice() {
            ["lib", tfm, rest @ ..] => self.add_lib(None, tfm, rest, path),
            ["ref", tfm, file] if !file.is_empty() => {
                if let Some(framework) = Framework::parse_folder(tfm) {
                    self.reference
                        .entry(framework)
                        .or_default()
                        .push(path.to_string());
                }
            }
            ["runtimes", rid, "lib", tfm, rest @ ..] => {
                self.add_lib(Some(rid.to_string()), tfm, rest, path)
            }
            ["runtimes", rid, "native", rest @ ..] if !rest.is_empty() => {
                self.native
                    .entry(rid.to_string())
                    .or_default()
                    .push(path.to_string());
            }
            _ => {}
        }
    }

    fn add_lib(&mut self, rid: Option<String>, tfm: &str, rest: &[&str], path: &str) {
        let asset_type = match rest {
            [file] if !file.is_empty() => AssetType::Runtime,
            [_culture, file] if !file.is_empty() => AssetType::Resource,
            _ => return,
        };
        let Some(framework) = Framework::parse_folder(tfm) else {
            return;
        };
        self.lib
            .entry(rid)
            .or_default()
            .entry(framework)
            .or_default()
            .push(Asset {
                path: path.to_string(),
                asset_type,
            });
    }

    /// Every file of the package, sorted.
    pub fn files(&self) -> &[String] {
        &self.files
    }

    /// Whether the package ships any RID-less `lib/` or `ref/` group.
    pub fn has_framework_groups(&self) -> bool {
        self.lib.contains_key(&None) || !self.reference.is_empty()
    }

    /// RIDs with their own `runtimes/<rid>/` content, sorted.
    pub fn rids(&self) -> Vec<&str> {
        let mut rids: Vec<&str> = self
            .lib
            .keys()
            .filter_map(|r| r.as_deref())
            .chain(self.native.keys().map(String::as_str))
            .collect();
        rids.sort();
        rids.dedup();
        rids
    }

    /// The nearest compatible `lib/` group for one partition.
    pub fn nearest_lib(
        &self,
        rid: Option<&str>,
        framework: &Framework,
        compat: &FrameworkCompatibility,
    ) -> Option<&[Asset]> {
        let partition = self.lib.get(&rid.map(str::to_string))?;
        compat
            .select_nearest(framework, partition.iter())
            .map(|(_, assets)| assets.as_slice())
    }

    /// The nearest compatible `ref/` group.
    pub fn nearest_ref(&self, framework: &Framework, compat: &FrameworkCompatibility) -> Option<&[String]> {
        compat
            .select_nearest(framework, self.reference.iter())
            .map(|(_, paths)| paths.as_slice())
    }

    /// Native assets of one RID.
    pub fn native(&self, rid: &str) -> &[String] {
        self.native.get(rid).map(Vec::as_slice).unwrap_or_default()
    }
}

/// Paths of the given type from a group.
pub fn paths_of(assets: &[Asset], asset_type: AssetType) -> Vec<String> {
    assets
        .iter()
        .filter(|a| a.asset_type == asset_type)
        .map(|a| a.path.clone())
        .collect()
}

/// `lib/net45/a.dll` → `lib/net45/_._`.
pub fn placeholder_for(path: &str) -> String {
    match path.rsplit_once('/') {
        Some((dir, _)) => format!("{dir}/{PLACEHOLDER_FILE}"),
        None => PLACEHOLDER_FILE.to_string(),
    }
}

/// Replace a non-empty list by a single placeholder in the first entry's directory.
pub fn collapse_to_placeholder(paths: Vec<String>) -> Vec<String> {
    match paths.first() {
        Some(first) => vec![placeholder_for(first)],
        None => paths,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fw(s: &str) -> Framework {
        Framework::parse(s).unwrap()
    }

    #[test]
    fn classifies_layouts() {
        let groups = AssetGroups::from_paths([
            "lib/netstandard1.5/a.dll",
            "lib/netstandard1.5/en-us/a.resources.dll",
            "ref/netstandard1.5/a.dll",
            "runtimes/unix/lib/netstandard1.5/a.dll",
            "runtimes/unix/native/a.so",
            "native/a.dll",
            "lib/a.dll",
            "contentFiles/any/any/a.txt",
        ]);
        let compat = FrameworkCompatibility::default();
        let ns = fw("netstandard1.5");

        let lib = groups.nearest_lib(None, &ns, &compat).unwrap();
        assert_eq!(paths_of(lib, AssetType::Runtime), vec!["lib/netstandard1.5/a.dll"]);
        assert_eq!(
            paths_of(lib, AssetType::Resource),
            vec!["lib/netstandard1.5/en-us/a.resources.dll"]
        );
        assert_eq!(groups.nearest_ref(&ns, &compat).unwrap(), ["ref/netstandard1.5/a.dll"]);
        assert_eq!(groups.native("unix"), ["runtimes/unix/native/a.so"]);
        assert_eq!(groups.rids(), vec!["unix"]);
        assert_eq!(groups.files().len(), 8);
        assert!(groups.has_framework_groups());
    }

    #[test]
    fn runtime_only_package_has_no_framework_groups() {
        let groups = AssetGroups::from_paths(["runtimes/win7/lib/netstandard1.3/a.dll"]);
        assert!(!groups.has_framework_groups());
        assert!(groups.native("win7").is_empty());
    }

    #[test]
    fn placeholder_keeps_directory() {
        assert_eq!(placeholder_for("runtimes/unix/native/a.dll"), "runtimes/unix/native/_._");
        assert_eq!(placeholder_for("a.dll"), "_._");
        assert_eq!(
            collapse_to_placeholder(vec!["lib/net45/a.dll".into(), "lib/net45/b.dll".into()]),
            vec!["lib/net45/_._"]
        );
        assert!(collapse_to_placeholder(Vec::new()).is_empty());
    }
}
