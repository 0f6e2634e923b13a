//! Target graph walker: breadth-first, nearest-wins.
//!
//! Each depth level is handled in two phases. The level's distinct ids are
//! prefetched in parallel, then entries are processed one by one in enqueue
//! order, so the result never depends on which fetch finished first.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use petgraph::graph::NodeIndex;
use rivet_core::dependency::{AssetFlags, DependencyGroup, PackageDependency};
use rivet_core::framework::Framework;
use rivet_core::package::{PackageId, PackageIdentity};
use rivet_core::runtime_graph::RuntimeGraph;
use rivet_core::version::PackageVersion;
use rivet_util::errors::RivetError;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;

use crate::compat::FrameworkCompatibility;
use crate::conflict::VersionConflict;
use crate::failure::{FailureKind, ProviderFailureKind, RestoreFailure};
use crate::graph::{Disposition, GraphNode, RestoreTargetGraph};
use crate::provider::{DependencyProvider, ProviderError};
use crate::runtime::fallback_chain;

pub const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 8;

/// Shared, read-only inputs of every walk in one restore.
#[derive(Clone)]
pub struct WalkContext {
    pub provider: Arc<dyn DependencyProvider>,
    pub compat: Arc<FrameworkCompatibility>,
    pub runtime_graph: Arc<RuntimeGraph>,
    pub fetch_permits: Arc<Semaphore>,
    pub cancel: watch::Receiver<bool>,
}

impl WalkContext {
    /// A context with default compatibility rules, the host RID graph, and no
    /// cancellation.
    pub fn new(provider: Arc<dyn DependencyProvider>) -> Self {
        let (_tx, cancel) = watch::channel(false);
        Self {
            provider,
            compat: Arc::new(FrameworkCompatibility::default()),
            runtime_graph: Arc::new(RuntimeGraph::host_default()),
            fetch_permits: Arc::new(Semaphore::new(DEFAULT_MAX_CONCURRENT_FETCHES)),
            cancel,
        }
    }

    pub fn with_runtime_graph(mut self, graph: Arc<RuntimeGraph>) -> Self {
        self.runtime_graph = graph;
        self
    }

    pub fn with_cancel(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_max_concurrent_fetches(mut self, permits: usize) -> Self {
        self.fetch_permits = Arc::new(Semaphore::new(permits.max(1)));
        self
    }

    fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }
}

/// Resolves once the cancel flag turns true. A dropped sender never cancels.
async fn cancelled(mut cancel: watch::Receiver<bool>) {
    let closed = cancel.wait_for(|c| *c).await.is_err();
    if closed {
        std::future::pending::<()>().await;
    }
}

/// Run `fetch` for every key concurrently, bounded by the context's permits.
///
/// Dropping the `JoinSet` on cancel aborts whatever is still in flight.
pub(crate) async fn prefetch<K, V, F, Fut>(
    ctx: &WalkContext,
    keys: Vec<K>,
    fetch: F,
) -> miette::Result<HashMap<K, Result<V, ProviderError>>>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Send + 'static,
    F: Fn(Arc<dyn DependencyProvider>, K) -> Fut,
    Fut: Future<Output = Result<V, ProviderError>> + Send + 'static,
{
    let mut results = HashMap::with_capacity(keys.len());
    if keys.is_empty() {
        return Ok(results);
    }

    let mut join_set = JoinSet::new();
    for key in keys {
        let permits = ctx.fetch_permits.clone();
        let fut = fetch(ctx.provider.clone(), key.clone());
        join_set.spawn(async move {
            let _permit = permits.acquire_owned().await;
            (key, fut.await)
        });
    }

    let cancel = cancelled(ctx.cancel.clone());
    tokio::pin!(cancel);
    loop {
        tokio::select! {
            biased;
            _ = &mut cancel => {
                tracing::debug!("Restore cancelled, dropping {} pending fetches", join_set.len());
                return Err(RivetError::Cancelled.into());
            }
            next = join_set.join_next() => match next {
                None => break,
                Some(Ok((key, result))) => {
                    results.insert(key, result);
                }
                Some(Err(e)) => {
                    return Err(RivetError::Resolution {
                        message: format!("fetch task failed: {e}"),
                    }
                    .into());
                }
            },
        }
    }
    Ok(results)
}

/// Entry in the BFS queue.
struct QueueEntry {
    parent: NodeIndex,
    dependency: PackageDependency,
    flags: AssetFlags,
    depth: usize,
}

/// Dependencies of the group nearest to `framework`. No groups means no dependencies.
pub fn select_dependencies(
    groups: &[DependencyGroup],
    framework: &Framework,
    compat: &FrameworkCompatibility,
) -> Vec<PackageDependency> {
    compat
        .select_nearest(framework, groups.iter().map(|g| (&g.framework, g)))
        .map(|(_, group)| group.dependencies.clone())
        .unwrap_or_default()
}

/// Extra dependencies `id` gains on a RID, from the nearest RID in the chain
/// that declares a set for it.
pub fn runtime_dependencies(graph: &RuntimeGraph, chain: &[String], id: &PackageId) -> Vec<PackageDependency> {
    chain
        .iter()
        .filter_map(|rid| graph.get(rid))
        .find_map(|description| description.dependency_sets.get(id))
        .map(|set| {
            set.dependencies
                .iter()
                .map(|(dep, range)| PackageDependency::new(dep.clone(), range.clone()))
                .collect()
        })
        .unwrap_or_default()
}

/// Build the target graph for `framework` (and optionally one RID).
///
/// `pins` fixes the version of ids already resolved by the RID-less graph of
/// the same framework.
pub async fn walk(
    project: &str,
    root_dependencies: &[PackageDependency],
    framework: Framework,
    runtime_identifier: Option<&str>,
    pins: &BTreeMap<PackageId, PackageVersion>,
    ctx: &WalkContext,
) -> miette::Result<RestoreTargetGraph> {
    let mut target = RestoreTargetGraph::new(project, framework, runtime_identifier.map(str::to_string));
    let target_name = target.name();
    let chain = runtime_identifier
        .map(|rid| fallback_chain(&ctx.runtime_graph, rid))
        .unwrap_or_default();
    tracing::info!("Walking {target_name}");

    let root = target.graph.root();
    let mut queue: VecDeque<QueueEntry> = root_dependencies
        .iter()
        .map(|dep| QueueEntry {
            parent: root,
            flags: dep.effective_flags(),
            dependency: dep.clone(),
            depth: 1,
        })
        .collect();

    while !queue.is_empty() {
        if ctx.is_cancelled() {
            return Err(RivetError::Cancelled.into());
        }

        let current_depth = queue.front().map(|e| e.depth).unwrap_or(0);
        let mut level: Vec<QueueEntry> = Vec::new();
        while queue.front().is_some_and(|e| e.depth == current_depth) {
            if let Some(entry) = queue.pop_front() {
                level.push(entry);
            }
        }
        tracing::debug!("{target_name}: level {current_depth} with {} entries", level.len());

        // Phase 1: version lists for ids that have no winner yet.
        let to_fetch: BTreeSet<PackageId> = level
            .iter()
            .map(|e| &e.dependency.id)
            .filter(|id| target.graph.winner(id).is_none() && !pins.contains_key(*id))
            .cloned()
            .collect();
        let versions = prefetch(ctx, to_fetch.into_iter().collect(), |provider, id: PackageId| async move {
            provider.list_versions(&id).await
        })
        .await?;

        // Phase 2: sequential decisions in enqueue order.
        let mut expand: Vec<NodeIndex> = Vec::new();
        for entry in level {
            let dep = &entry.dependency;
            let mut node = GraphNode::new(dep.id.clone(), dep.range.clone(), entry.depth, entry.flags);
            node.edge_flags = dep.effective_flags();

            let in_cycle = std::iter::once(entry.parent)
                .chain(target.graph.ancestors(entry.parent))
                .any(|idx| target.graph.node(idx).requested_id == dep.id);
            if in_cycle {
                node.disposition = Disposition::RejectedCycle;
                target.graph.add_child(entry.parent, node);
                record(
                    &mut target,
                    dep.id.clone(),
                    FailureKind::CycleDetected,
                    format!("{} depends on itself through its dependencies", dep.id),
                );
                continue;
            }

            if let Some(winner_idx) = target.graph.winner(&dep.id) {
                let winner = target.graph.node(winner_idx).clone();
                let outcome = match &winner.identity {
                    None => None,
                    Some(identity) if dep.range.satisfies(&identity.version) => {
                        node.identity = Some(identity.clone());
                        None
                    }
                    Some(identity) if dep.range.is_below_min(&identity.version) => {
                        node.disposition = Disposition::RejectedVersionConflict;
                        Some((identity.version.clone(), FailureKind::VersionConflict))
                    }
                    Some(identity) => {
                        node.disposition = Disposition::RejectedDowngradePrevented;
                        Some((identity.version.clone(), FailureKind::VersionOutsideConstraint))
                    }
                };
                target.graph.add_child(entry.parent, node);

                if let Some((resolved, kind)) = outcome {
                    let message = format!(
                        "{} {} was requested but {resolved} is nearer",
                        dep.id,
                        dep.range.pretty()
                    );
                    if kind == FailureKind::VersionConflict {
                        target.conflicts.add(VersionConflict::new(
                            dep.id.clone(),
                            target_name.clone(),
                            dep.range.clone(),
                            resolved,
                            &winner.range,
                            (winner.depth, entry.depth),
                        ));
                    }
                    record(&mut target, dep.id.clone(), kind, message);
                }
                continue;
            }

            match choose_version(dep, pins, &versions) {
                // A pin outside the range rejects this entry. The id stays open,
                // so the framework graph's own path can still accept the pin.
                Ok(version) if !dep.range.satisfies(&version) => {
                    node.disposition = Disposition::RejectedVersionConflict;
                    target.graph.add_child(entry.parent, node);
                    target.conflicts.add(VersionConflict::pinned(
                        dep.id.clone(),
                        target_name.clone(),
                        dep.range.clone(),
                        version.clone(),
                    ));
                    let message = format!(
                        "{} {} is pinned to {version} by the framework graph",
                        dep.id,
                        dep.range.pretty()
                    );
                    record(&mut target, dep.id.clone(), FailureKind::VersionConflict, message);
                    continue;
                }
                Ok(version) => {
                    node.identity = Some(PackageIdentity::new(dep.id.clone(), version));
                }
                Err(kind) => {
                    let message = format!("unable to resolve {} {}: {kind}", dep.id, dep.range.pretty());
                    node.failure = Some(kind.clone());
                    record(&mut target, dep.id.clone(), FailureKind::ProviderFailure(kind), message);
                }
            }
            let resolved = node.identity.is_some();
            let idx = target.graph.add_child(entry.parent, node);
            target.graph.set_winner(dep.id.clone(), idx);
            if resolved {
                expand.push(idx);
            }
        }

        // Phase 3: dependency groups of the new winners, then enqueue children.
        let identities: Vec<PackageIdentity> = expand
            .iter()
            .filter_map(|idx| target.graph.node(*idx).identity.clone())
            .collect();
        let mut groups = prefetch(ctx, identities, |provider, identity: PackageIdentity| async move {
            provider.get_dependency_groups(&identity).await
        })
        .await?;

        for idx in expand {
            let node = target.graph.node(idx).clone();
            let Some(identity) = node.identity else {
                continue;
            };
            let declared = match groups.remove(&identity) {
                Some(Ok(groups)) => select_dependencies(&groups, &framework, &ctx.compat),
                Some(Err(err)) => {
                    let kind = ProviderFailureKind::from(err);
                    let message = format!("unable to read dependencies of {identity}: {kind}");
                    target.graph.node_mut(idx).failure = Some(kind.clone());
                    record(&mut target, identity.id.clone(), FailureKind::ProviderFailure(kind), message);
                    continue;
                }
                None => Vec::new(),
            };

            let mut children = declared;
            for extra in runtime_dependencies(&ctx.runtime_graph, &chain, &identity.id) {
                if !children.iter().any(|d| d.id == extra.id) {
                    children.push(extra);
                }
            }
            for dep in children {
                queue.push_back(QueueEntry {
                    parent: idx,
                    flags: node.flags.intersection(dep.effective_flags()),
                    dependency: dep,
                    depth: node.depth + 1,
                });
            }
        }
    }

    tracing::info!(
        "{target_name}: {} packages resolved, {} failures",
        target.graph.resolved().len(),
        target.failures.len()
    );
    Ok(target)
}

fn choose_version(
    dep: &PackageDependency,
    pins: &BTreeMap<PackageId, PackageVersion>,
    versions: &HashMap<PackageId, Result<Vec<PackageVersion>, ProviderError>>,
) -> Result<PackageVersion, ProviderFailureKind> {
    if let Some(pinned) = pins.get(&dep.id) {
        return Ok(pinned.clone());
    }
    match versions.get(&dep.id) {
        Some(Ok(available)) => dep
            .range
            .find_best_match(available)
            .cloned()
            .ok_or(ProviderFailureKind::NoMatchingVersion),
        Some(Err(err)) => Err(ProviderFailureKind::from(err.clone())),
        None => Err(ProviderFailureKind::NotFound),
    }
}

fn record(target: &mut RestoreTargetGraph, id: PackageId, kind: FailureKind, message: String) {
    tracing::warn!("{}: {message}", target.name());
    target.failures.push(RestoreFailure {
        id,
        framework: target.framework,
        runtime_identifier: target.runtime_identifier.clone(),
        kind,
        message,
    });
}
