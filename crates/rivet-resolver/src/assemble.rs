//! Lock file assembly from resolved target graphs.

use std::collections::{BTreeMap, BTreeSet};

use rivet_core::dependency::AssetFlags;
use rivet_core::lockfile::{LockFile, LockFileLibrary, LockFileTarget, LockFileTargetLibrary};
use rivet_core::package::PackageIdentity;
use rivet_core::request::RestoreRequest;
use rivet_core::runtime_graph::RuntimeGraph;
use rivet_core::version::VersionRange;

use crate::compat::FrameworkCompatibility;
use crate::conflict::VersionConflict;
use crate::content::{collapse_to_placeholder, paths_of, AssetGroups, AssetType};
use crate::failure::{FailureKind, RestoreFailure};
use crate::graph::RestoreTargetGraph;
use crate::runtime::{collect_runtime_targets, expand_runtime_targets, fallback_chain};

/// Build the lock file for `graphs`.
///
/// Framework-level problems found while selecting assets (incompatible
/// packages, RID graphs that drifted from their framework graph) are appended
/// to the affected graph.
pub fn assemble(
    request: &RestoreRequest,
    graphs: &mut [RestoreTargetGraph],
    assets: &BTreeMap<PackageIdentity, AssetGroups>,
    runtime_graph: &RuntimeGraph,
    compat: &FrameworkCompatibility,
) -> LockFile {
    check_rid_versions(graphs);

    let empty = AssetGroups::default();
    let mut lock = LockFile::default();
    let mut catalog: BTreeMap<PackageIdentity, BTreeSet<String>> = BTreeMap::new();

    for target_graph in graphs.iter_mut() {
        let chain = target_graph
            .runtime_identifier
            .as_deref()
            .map(|rid| fallback_chain(runtime_graph, rid))
            .unwrap_or_default();
        let mut target = LockFileTarget {
            framework: target_graph.framework,
            runtime_identifier: target_graph.runtime_identifier.clone(),
            libraries: Vec::new(),
        };
        let mut incompatible = Vec::new();
        let effective_flags = target_graph.graph.effective_flags();

        for (_, idx) in target_graph.graph.winners() {
            let node = target_graph.graph.node(idx);
            let Some(identity) = node.identity.clone() else {
                continue;
            };
            let groups = assets.get(&identity).unwrap_or(&empty);
            let flags = effective_flags.get(&identity.id).copied().unwrap_or(AssetFlags::NONE);
            let framework = target_graph.framework;

            let mut library = LockFileTargetLibrary::new(identity.id.clone(), identity.version.clone());
            let declared = catalog.entry(identity.clone()).or_default();
            for child in target_graph.graph.children_of(idx) {
                let child = target_graph.graph.node(child);
                declared.insert(child.requested_id.to_string());
                library
                    .dependencies
                    .insert(child.requested_id.to_string(), child.range.to_string());
            }

            let lib = groups.nearest_lib(None, &framework, compat);
            let reference = groups.nearest_ref(&framework, compat);
            if groups.has_framework_groups() && lib.is_none() && reference.is_none() {
                incompatible.push(identity.clone());
            }

            library.compile = match reference {
                Some(paths) => paths.to_vec(),
                None => lib.map(|g| paths_of(g, AssetType::Runtime)).unwrap_or_default(),
            };
            if target_graph.runtime_identifier.is_some() {
                let expanded = expand_runtime_targets(groups, &chain, &framework, compat);
                library.runtime = expanded.runtime;
                library.resource = expanded.resource;
                library.native = expanded.native;
            } else {
                library.runtime = lib.map(|g| paths_of(g, AssetType::Runtime)).unwrap_or_default();
                library.resource = lib.map(|g| paths_of(g, AssetType::Resource)).unwrap_or_default();
                if !request.runtimes.is_empty() {
                    library.runtime_targets = collect_runtime_targets(groups, &framework, compat, flags);
                }
            }
            apply_exclusions(&mut library, flags);
            target.libraries.push(library);
        }

        for identity in incompatible {
            let message = format!(
                "{identity} has no assets compatible with {}",
                target_graph.framework
            );
            tracing::warn!("{}: {message}", target_graph.name());
            target_graph.failures.push(RestoreFailure {
                id: identity.id,
                framework: target_graph.framework,
                runtime_identifier: target_graph.runtime_identifier.clone(),
                kind: FailureKind::IncompatibleFramework,
                message,
            });
        }
        lock.targets.push(target);
    }

    for (identity, dependencies) in catalog {
        let mut library = LockFileLibrary::new(identity.id.clone(), identity.version.clone());
        library.dependencies = dependencies.into_iter().collect();
        library.files = assets
            .get(&identity)
            .map(|groups| groups.files().to_vec())
            .unwrap_or_default();
        lock.libraries.push(library);
    }

    lock.project_file_dependency_groups = request.dependency_groups();
    lock.sort();
    lock
}

/// Replace every excluded asset list by a single placeholder.
fn apply_exclusions(library: &mut LockFileTargetLibrary, flags: AssetFlags) {
    let collapse = |paths: &mut Vec<String>, flag: AssetFlags| {
        if !flags.contains(flag) {
            *paths = collapse_to_placeholder(std::mem::take(paths));
        }
    };
    collapse(&mut library.compile, AssetFlags::COMPILE);
    collapse(&mut library.runtime, AssetFlags::RUNTIME);
    collapse(&mut library.resource, AssetFlags::RUNTIME);
    collapse(&mut library.native, AssetFlags::NATIVE);
}

/// RID graphs must agree with the RID-less graph of the same framework on
/// every shared id.
fn check_rid_versions(graphs: &mut [RestoreTargetGraph]) {
    let framework_versions: BTreeMap<_, _> = graphs
        .iter()
        .filter(|g| g.runtime_identifier.is_none())
        .map(|g| (g.framework, g.graph.resolved_versions()))
        .collect();

    for target in graphs.iter_mut().filter(|g| g.runtime_identifier.is_some()) {
        let Some(expected) = framework_versions.get(&target.framework) else {
            continue;
        };
        let name = target.name();
        let mut drifted = Vec::new();
        for identity in target.graph.resolved() {
            if let Some(version) = expected.get(&identity.id) {
                if *version != identity.version {
                    drifted.push((identity.clone(), version.clone()));
                }
            }
        }
        for (identity, expected_version) in drifted {
            let winner = target
                .graph
                .winner(&identity.id)
                .map(|idx| target.graph.node(idx).range.clone())
                .unwrap_or_else(VersionRange::all);
            target.conflicts.add(VersionConflict {
                id: identity.id.clone(),
                target: name.clone(),
                requested: winner,
                resolved: identity.version.clone(),
                reason: format!("framework graph resolved {expected_version}"),
            });
            target.failures.push(RestoreFailure {
                id: identity.id.clone(),
                framework: target.framework,
                runtime_identifier: target.runtime_identifier.clone(),
                kind: FailureKind::VersionConflict,
                message: format!(
                    "{identity} differs from {expected_version} chosen for {}",
                    target.framework
                ),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rivet_core::dependency::PackageDependency;
    use rivet_core::framework::Framework;
    use rivet_core::version::PackageVersion;

    use crate::graph::GraphNode;

    fn target_with(framework: &str, rid: Option<&str>, id: &str, version: &str, flags: AssetFlags) -> RestoreTargetGraph {
        let mut target = RestoreTargetGraph::new(
            "app",
            Framework::parse(framework).unwrap(),
            rid.map(str::to_string),
        );
        let mut node = GraphNode::new(id.into(), VersionRange::all(), 1, flags);
        node.identity = Some(PackageIdentity::new(id, PackageVersion::parse(version).unwrap()));
        let root = target.graph.root();
        let idx = target.graph.add_child(root, node);
        target.graph.set_winner(id.into(), idx);
        target
    }

    fn request(framework: &str) -> RestoreRequest {
        RestoreRequest::new("app").with_framework(
            Framework::parse(framework).unwrap(),
            vec![PackageDependency::new("a", VersionRange::parse("1.0.0").unwrap())],
        )
    }

    fn assets(paths: &[&str]) -> BTreeMap<PackageIdentity, AssetGroups> {
        BTreeMap::from([(
            PackageIdentity::new("a", PackageVersion::new(1, 0, 0)),
            AssetGroups::from_paths(paths),
        )])
    }

    #[test]
    fn compile_prefers_ref_group() {
        let mut graphs = vec![target_with("net45", None, "a", "1.0.0", AssetFlags::ALL)];
        let lock = assemble(
            &request("net45"),
            &mut graphs,
            &assets(&["lib/net45/a.dll", "ref/net45/a.dll"]),
            &RuntimeGraph::new(),
            &FrameworkCompatibility::default(),
        );
        let lib = &lock.targets[0].libraries[0];
        assert_eq!(lib.compile, vec!["ref/net45/a.dll"]);
        assert_eq!(lib.runtime, vec!["lib/net45/a.dll"]);
        assert_eq!(lock.libraries[0].files.len(), 2);
        assert_eq!(lock.project_file_dependency_groups["net45"], vec!["a >= 1.0.0"]);
    }

    #[test]
    fn exclusions_become_placeholders() {
        let mut graphs = vec![target_with("net45", None, "a", "1.0.0", AssetFlags::NONE)];
        let lock = assemble(
            &request("net45"),
            &mut graphs,
            &assets(&["lib/net45/a.dll"]),
            &RuntimeGraph::new(),
            &FrameworkCompatibility::default(),
        );
        let lib = &lock.targets[0].libraries[0];
        assert_eq!(lib.compile, vec!["lib/net45/_._"]);
        assert_eq!(lib.runtime, vec!["lib/net45/_._"]);
    }

    #[test]
    fn incompatible_package_fails_target() {
        let mut graphs = vec![target_with("net40", None, "a", "1.0.0", AssetFlags::ALL)];
        assemble(
            &request("net40"),
            &mut graphs,
            &assets(&["lib/netstandard2.0/a.dll"]),
            &RuntimeGraph::new(),
            &FrameworkCompatibility::default(),
        );
        assert_eq!(graphs[0].failures.len(), 1);
        assert_eq!(graphs[0].failures[0].kind, FailureKind::IncompatibleFramework);
    }

    #[test]
    fn meta_packages_are_compatible() {
        let mut graphs = vec![target_with("net40", None, "a", "1.0.0", AssetFlags::ALL)];
        assemble(
            &request("net40"),
            &mut graphs,
            &assets(&["readme.txt"]),
            &RuntimeGraph::new(),
            &FrameworkCompatibility::default(),
        );
        assert!(graphs[0].failures.is_empty());
    }

    #[test]
    fn rid_graph_drift_is_a_conflict() {
        let mut graphs = vec![
            target_with("net45", None, "a", "1.0.0", AssetFlags::ALL),
            target_with("net45", Some("win7"), "a", "2.0.0", AssetFlags::ALL),
        ];
        let lock = assemble(
            &request("net45"),
            &mut graphs,
            &BTreeMap::new(),
            &RuntimeGraph::new(),
            &FrameworkCompatibility::default(),
        );
        assert!(graphs[0].failures.is_empty());
        assert_eq!(graphs[1].conflicts.len(), 1);
        assert_eq!(lock.targets.len(), 2);
        assert_eq!(lock.targets[0].runtime_identifier, None);
        assert_eq!(lock.libraries.len(), 2);
    }
}
