//! Restore-session cache in front of a dependency provider.
//!
//! Every key gets one `OnceCell`; concurrent callers for the same key wait on
//! the same fetch. Failures are cached too, so a broken package fails the same
//! way in every target graph.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rivet_core::dependency::DependencyGroup;
use rivet_core::package::{PackageId, PackageIdentity};
use rivet_core::runtime_graph::RuntimeGraph;
use rivet_core::version::PackageVersion;
use tokio::sync::OnceCell;

use crate::content::AssetGroups;
use crate::provider::{DependencyProvider, ProviderError};

type Cached<V> = Result<V, ProviderError>;

/// A map of per-key cells. The mutex is held only to find or insert a cell.
struct KeyedCache<K, V> {
    cells: Mutex<HashMap<K, Arc<OnceCell<Cached<V>>>>>,
}

impl<K: Eq + Hash + Clone, V: Clone> KeyedCache<K, V> {
    fn new() -> Self {
        Self {
            cells: Mutex::new(HashMap::new()),
        }
    }

    fn cell(&self, key: &K) -> Arc<OnceCell<Cached<V>>> {
        let mut cells = self.cells.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(cells.entry(key.clone()).or_default())
    }

    async fn get_or_fetch<F, Fut>(&self, key: &K, fetch: F) -> Cached<V>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Cached<V>>,
    {
        let cell = self.cell(key);
        cell.get_or_init(fetch).await.clone()
    }

    fn len(&self) -> usize {
        self.cells.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// A [`DependencyProvider`] that fetches each key at most once.
pub struct CachingProvider {
    inner: Arc<dyn DependencyProvider>,
    versions: KeyedCache<PackageId, Vec<PackageVersion>>,
    groups: KeyedCache<PackageIdentity, Vec<DependencyGroup>>,
    runtime_graphs: KeyedCache<PackageIdentity, RuntimeGraph>,
    assets: KeyedCache<PackageIdentity, AssetGroups>,
}

impl CachingProvider {
    pub fn new(inner: Arc<dyn DependencyProvider>) -> Self {
        Self {
            inner,
            versions: KeyedCache::new(),
            groups: KeyedCache::new(),
            runtime_graphs: KeyedCache::new(),
            assets: KeyedCache::new(),
        }
    }

    /// Number of distinct package ids whose versions were requested.
    pub fn cached_ids(&self) -> usize {
        self.versions.len()
    }
}

#[async_trait]
impl DependencyProvider for CachingProvider {
    async fn list_versions(&self, id: &PackageId) -> Result<Vec<PackageVersion>, ProviderError> {
        self.versions
            .get_or_fetch(id, || async {
                tracing::debug!("Fetching versions of {id}");
                self.inner.list_versions(id).await
            })
            .await
    }

    async fn get_dependency_groups(
        &self,
        identity: &PackageIdentity,
    ) -> Result<Vec<DependencyGroup>, ProviderError> {
        self.groups
            .get_or_fetch(identity, || async {
                tracing::debug!("Fetching dependencies of {identity}");
                self.inner.get_dependency_groups(identity).await
            })
            .await
    }

    async fn get_runtime_graph(&self, identity: &PackageIdentity) -> Result<RuntimeGraph, ProviderError> {
        self.runtime_graphs
            .get_or_fetch(identity, || self.inner.get_runtime_graph(identity))
            .await
    }

    async fn get_asset_groups(&self, identity: &PackageIdentity) -> Result<AssetGroups, ProviderError> {
        self.assets
            .get_or_fetch(identity, || self.inner.get_asset_groups(identity))
            .await
    }
}
