//! Restore orchestration: framework graphs, runtime graph merge, RID graphs,
//! asset selection, and lock file assembly.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use rivet_core::config::{ConflictPolicy, RestoreConfig};
use rivet_core::lockfile::LockFile;
use rivet_core::package::PackageIdentity;
use rivet_core::request::RestoreRequest;
use rivet_core::runtime_graph::RuntimeGraph;
use rivet_util::errors::RivetError;
use tokio::sync::watch;
use tokio::task::JoinSet;

use crate::assemble::assemble;
use crate::cache::CachingProvider;
use crate::conflict::ConflictReport;
use crate::content::AssetGroups;
use crate::failure::RestoreFailure;
use crate::graph::RestoreTargetGraph;
use crate::provider::DependencyProvider;
use crate::runtime::merge_runtime_graph;
use crate::walker::{prefetch, walk, WalkContext, DEFAULT_MAX_CONCURRENT_FETCHES};

/// Knobs of one restore.
#[derive(Debug, Clone, Copy)]
pub struct RestoreOptions {
    pub max_concurrent_fetches: usize,
    pub conflict_policy: ConflictPolicy,
}

impl Default for RestoreOptions {
    fn default() -> Self {
        Self {
            max_concurrent_fetches: DEFAULT_MAX_CONCURRENT_FETCHES,
            conflict_policy: ConflictPolicy::default(),
        }
    }
}

impl From<&RestoreConfig> for RestoreOptions {
    fn from(config: &RestoreConfig) -> Self {
        Self {
            max_concurrent_fetches: config.max_concurrent_fetches,
            conflict_policy: config.conflict_policy,
        }
    }
}

/// Outcome of a restore. Partial results are still results.
#[derive(Debug, Clone)]
pub struct RestoreResult {
    /// True when no target graph has a fatal failure.
    pub success: bool,
    /// `restore_fingerprint` is left unset. Callers that know the feeds stamp it.
    pub lock_file: LockFile,
    /// RID-less graphs first, in request order, then RID graphs.
    pub graphs: Vec<RestoreTargetGraph>,
    pub failures: Vec<RestoreFailure>,
    pub conflicts: ConflictReport,
    /// The RID graph every RID walk used: the base graph plus package fragments.
    pub runtime_graph: RuntimeGraph,
}

impl RestoreResult {
    pub fn graph(&self, framework: &str, rid: Option<&str>) -> Option<&RestoreTargetGraph> {
        self.graphs.iter().find(|g| {
            g.framework.short_name() == framework && g.runtime_identifier.as_deref() == rid
        })
    }
}

/// Run a full restore for `request` against `provider`.
///
/// Fails only on an invalid request, cancellation, or an internal task
/// failure; package-level problems are reported in the result.
pub async fn restore(
    request: &RestoreRequest,
    provider: Arc<dyn DependencyProvider>,
    options: &RestoreOptions,
    cancel: watch::Receiver<bool>,
) -> miette::Result<RestoreResult> {
    request.validate()?;
    tracing::info!(
        "Restoring {} for {} framework(s), {} runtime(s)",
        request.project,
        request.frameworks.len(),
        request.runtimes.len()
    );

    let provider: Arc<dyn DependencyProvider> = Arc::new(CachingProvider::new(provider));
    let base_graph = request
        .runtime_graph
        .clone()
        .unwrap_or_else(RuntimeGraph::host_default);
    let ctx = WalkContext::new(provider)
        .with_cancel(cancel)
        .with_max_concurrent_fetches(options.max_concurrent_fetches)
        .with_runtime_graph(Arc::new(base_graph.clone()));

    let mut graphs = walk_frameworks(request, &ctx).await?;

    let runtime_graph = if request.runtimes.is_empty() {
        base_graph
    } else {
        let merged = merge_package_runtime_graphs(&base_graph, &graphs, &ctx).await?;
        let ctx = ctx.clone().with_runtime_graph(Arc::new(merged.clone()));
        let rid_graphs = walk_runtimes(request, &graphs, &ctx).await?;
        graphs.extend(rid_graphs);
        merged
    };

    let assets = fetch_assets(&graphs, &ctx).await?;
    let lock_file = assemble(request, &mut graphs, &assets, &runtime_graph, &ctx.compat);

    let mut failures = Vec::new();
    let mut conflicts = ConflictReport::new();
    let mut success = true;
    for graph in &graphs {
        if !graph.is_success(options.conflict_policy) {
            tracing::warn!("Target {} failed", graph.name());
            success = false;
        }
        failures.extend(graph.failures.iter().cloned());
        conflicts.extend(graph.conflicts.clone());
    }

    tracing::info!(
        "Restore of {} finished: {} target(s), {} libraries, {} failure(s)",
        request.project,
        lock_file.targets.len(),
        lock_file.libraries.len(),
        failures.len()
    );
    Ok(RestoreResult {
        success,
        lock_file,
        graphs,
        failures,
        conflicts,
        runtime_graph,
    })
}

/// Walk every framework concurrently. Results keep request order.
async fn walk_frameworks(
    request: &RestoreRequest,
    ctx: &WalkContext,
) -> miette::Result<Vec<RestoreTargetGraph>> {
    let mut join_set = JoinSet::new();
    for (i, fr) in request.frameworks.iter().enumerate() {
        let ctx = ctx.clone();
        let project = request.project.clone();
        let dependencies = fr.dependencies.clone();
        let framework = fr.framework;
        join_set.spawn(async move {
            let graph = walk(&project, &dependencies, framework, None, &BTreeMap::new(), &ctx).await;
            (i, graph)
        });
    }
    collect_ordered(join_set).await
}

/// Walk every (framework, RID) pair, pinned to the framework graph's versions.
async fn walk_runtimes(
    request: &RestoreRequest,
    framework_graphs: &[RestoreTargetGraph],
    ctx: &WalkContext,
) -> miette::Result<Vec<RestoreTargetGraph>> {
    let mut join_set = JoinSet::new();
    let mut i = 0;
    for (fr, framework_graph) in request.frameworks.iter().zip(framework_graphs) {
        let pins = Arc::new(framework_graph.graph.resolved_versions());
        for rid in &request.runtimes {
            let ctx = ctx.clone();
            let project = request.project.clone();
            let dependencies = fr.dependencies.clone();
            let framework = fr.framework;
            let rid = rid.clone();
            let pins = pins.clone();
            join_set.spawn(async move {
                let graph = walk(&project, &dependencies, framework, Some(rid.as_str()), &pins, &ctx).await;
                (i, graph)
            });
            i += 1;
        }
    }
    collect_ordered(join_set).await
}

async fn collect_ordered(
    mut join_set: JoinSet<(usize, miette::Result<RestoreTargetGraph>)>,
) -> miette::Result<Vec<RestoreTargetGraph>> {
    let mut slots: Vec<(usize, RestoreTargetGraph)> = Vec::with_capacity(join_set.len());
    while let Some(joined) = join_set.join_next().await {
        let (i, graph) = joined.map_err(|e| RivetError::Resolution {
            message: format!("graph walk task failed: {e}"),
        })?;
        slots.push((i, graph?));
    }
    slots.sort_by_key(|(i, _)| *i);
    Ok(slots.into_iter().map(|(_, graph)| graph).collect())
}

fn resolved_identities(graphs: &[RestoreTargetGraph]) -> Vec<PackageIdentity> {
    graphs
        .iter()
        .flat_map(|g| g.graph.resolved())
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Fold every resolved package's `runtime.json` into the base graph, in identity order.
async fn merge_package_runtime_graphs(
    base: &RuntimeGraph,
    graphs: &[RestoreTargetGraph],
    ctx: &WalkContext,
) -> miette::Result<RuntimeGraph> {
    let identities = resolved_identities(graphs);
    let mut fetched = prefetch(ctx, identities.clone(), |provider, identity: PackageIdentity| async move {
        provider.get_runtime_graph(&identity).await
    })
    .await?;

    let mut fragments = Vec::new();
    for identity in identities {
        match fetched.remove(&identity) {
            Some(Ok(fragment)) if !fragment.is_empty() => fragments.push(fragment),
            Some(Err(err)) => tracing::warn!("Ignoring runtime graph of {identity}: {err}"),
            _ => {}
        }
    }
    tracing::debug!("Merging {} runtime graph fragment(s)", fragments.len());
    Ok(merge_runtime_graph(base, &fragments))
}

async fn fetch_assets(
    graphs: &[RestoreTargetGraph],
    ctx: &WalkContext,
) -> miette::Result<BTreeMap<PackageIdentity, AssetGroups>> {
    let identities = resolved_identities(graphs);
    let fetched = prefetch(ctx, identities, |provider, identity: PackageIdentity| async move {
        provider.get_asset_groups(&identity).await
    })
    .await?;

    let mut assets = BTreeMap::new();
    for (identity, result) in fetched {
        match result {
            Ok(groups) => {
                assets.insert(identity, groups);
            }
            Err(err) => tracing::warn!("No content for {identity}: {err}"),
        }
    }
    Ok(assets)
}
