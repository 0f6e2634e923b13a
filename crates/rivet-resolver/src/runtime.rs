//! Runtime graph resolution: merged RID graph, fallback chains, and RID asset selection.

use std::collections::{HashSet, VecDeque};

use rivet_core::dependency::AssetFlags;
use rivet_core::framework::Framework;
use rivet_core::lockfile::RuntimeTarget;
use rivet_core::runtime_graph::RuntimeGraph;

use crate::compat::FrameworkCompatibility;
use crate::content::{paths_of, placeholder_for, AssetGroups, AssetType};

/// Union of `base` and every package fragment, folded in order.
pub fn merge_runtime_graph<'a>(
    base: &RuntimeGraph,
    fragments: impl IntoIterator<Item = &'a RuntimeGraph>,
) -> RuntimeGraph {
    fragments
        .into_iter()
        .fold(base.clone(), |merged, fragment| merged.merged_with(fragment))
}

/// RIDs to probe for `rid`, nearest first. Breadth-first over imports,
/// each RID once, so cyclic imports terminate.
pub fn fallback_chain(graph: &RuntimeGraph, rid: &str) -> Vec<String> {
    let mut chain = Vec::new();
    let mut seen = HashSet::new();
    let mut queue = VecDeque::from([rid.to_string()]);
    while let Some(current) = queue.pop_front() {
        if !seen.insert(current.clone()) {
            continue;
        }
        if let Some(description) = graph.get(&current) {
            queue.extend(description.imports.iter().cloned());
        }
        chain.push(current);
    }
    chain
}

/// Asset paths selected for one RID graph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpandedAssets {
    pub runtime: Vec<String>,
    pub resource: Vec<String>,
    pub native: Vec<String>,
}

/// Pick runtime, resource, and native assets for a RID graph.
///
/// Each asset type independently takes the first RID in `chain` with a
/// compatible non-empty group; when none has one, the RID-less `lib/` group
/// is used.
pub fn expand_runtime_targets(
    assets: &AssetGroups,
    chain: &[String],
    framework: &Framework,
    compat: &FrameworkCompatibility,
) -> ExpandedAssets {
    let lib_paths = |rid: Option<&str>, asset_type: AssetType| {
        assets
            .nearest_lib(rid, framework, compat)
            .map(|group| paths_of(group, asset_type))
            .unwrap_or_default()
    };
    let select = |asset_type: AssetType| {
        chain
            .iter()
            .map(|rid| lib_paths(Some(rid.as_str()), asset_type))
            .find(|paths| !paths.is_empty())
            .unwrap_or_else(|| lib_paths(None, asset_type))
    };
    let native = chain
        .iter()
        .map(|rid| assets.native(rid))
        .find(|paths| !paths.is_empty())
        .map(<[String]>::to_vec)
        .unwrap_or_default();

    ExpandedAssets {
        runtime: select(AssetType::Runtime),
        resource: select(AssetType::Resource),
        native,
    }
}

/// The `runtimeTargets` of a package in a RID-less graph.
///
/// Every RID partition is matched against `framework` on its own. Entries are
/// ordered by asset type, RID, then path. An asset type whose governing flag
/// is excluded collapses into one placeholder entry.
pub fn collect_runtime_targets(
    assets: &AssetGroups,
    framework: &Framework,
    compat: &FrameworkCompatibility,
    flags: AssetFlags,
) -> Vec<RuntimeTarget> {
    let mut targets = Vec::new();
    for rid in assets.rids() {
        if let Some(group) = assets.nearest_lib(Some(rid), framework, compat) {
            for asset in group {
                targets.push(RuntimeTarget {
                    path: asset.path.clone(),
                    rid: rid.to_string(),
                    asset_type: asset.asset_type,
                });
            }
        }
        for path in assets.native(rid) {
            targets.push(RuntimeTarget {
                path: path.clone(),
                rid: rid.to_string(),
                asset_type: AssetType::Native,
            });
        }
    }
    targets.sort_by(|a, b| {
        a.asset_type
            .cmp(&b.asset_type)
            .then_with(|| a.rid.cmp(&b.rid))
            .then_with(|| a.path.cmp(&b.path))
    });

    let mut collapsed: Vec<RuntimeTarget> = Vec::new();
    for target in targets {
        if flags.contains(governing_flag(target.asset_type)) {
            collapsed.push(target);
            continue;
        }
        if collapsed.iter().any(|t| t.asset_type == target.asset_type) {
            continue;
        }
        collapsed.push(RuntimeTarget {
            path: placeholder_for(&target.path),
            ..target
        });
    }
    collapsed
}

/// The include/exclude tag that controls an asset type.
pub fn governing_flag(asset_type: AssetType) -> AssetFlags {
    match asset_type {
        AssetType::Runtime | AssetType::Resource => AssetFlags::RUNTIME,
        AssetType::Native => AssetFlags::NATIVE,
    }
}
