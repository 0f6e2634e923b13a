//! The dependency provider interface and its backends.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use rivet_core::dependency::DependencyGroup;
use rivet_core::package::{PackageId, PackageIdentity};
use rivet_core::runtime_graph::RuntimeGraph;
use rivet_core::version::PackageVersion;
use rivet_feed::FolderFeed;
use thiserror::Error;

use crate::content::AssetGroups;

/// Why a provider call failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("package not found")]
    NotFound,
    #[error("transient provider failure: {0}")]
    Transient(String),
}

/// Source of package versions, dependencies, runtime graphs, and content.
///
/// The resolver never branches on which backend it is talking to.
#[async_trait]
pub trait DependencyProvider: Send + Sync {
    /// Every available version of `id`. Unknown ids are [`ProviderError::NotFound`].
    async fn list_versions(&self, id: &PackageId) -> Result<Vec<PackageVersion>, ProviderError>;

    /// Dependency groups declared by the package, one per framework.
    async fn get_dependency_groups(
        &self,
        identity: &PackageIdentity,
    ) -> Result<Vec<DependencyGroup>, ProviderError>;

    /// The package's `runtime.json` fragment, possibly empty.
    async fn get_runtime_graph(&self, identity: &PackageIdentity) -> Result<RuntimeGraph, ProviderError>;

    /// The package's files grouped into assets.
    async fn get_asset_groups(&self, identity: &PackageIdentity) -> Result<AssetGroups, ProviderError>;
}

/// One package held by an [`InMemoryProvider`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryPackage {
    pub dependency_groups: Vec<DependencyGroup>,
    pub runtime_graph: RuntimeGraph,
    pub files: Vec<String>,
}

impl InMemoryPackage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_group(mut self, group: DependencyGroup) -> Self {
        self.dependency_groups.push(group);
        self
    }

    pub fn with_files<I, S>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.files.extend(files.into_iter().map(Into::into));
        self
    }

    pub fn with_runtime_graph(mut self, graph: RuntimeGraph) -> Self {
        self.runtime_graph = graph;
        self
    }
}

/// A provider backed by a map, for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProvider {
    packages: BTreeMap<PackageId, BTreeMap<PackageVersion, InMemoryPackage>>,
    failures: BTreeMap<PackageId, ProviderError>,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, identity: PackageIdentity, package: InMemoryPackage) {
        self.packages
            .entry(identity.id)
            .or_default()
            .insert(identity.version, package);
    }

    pub fn with_package(mut self, identity: PackageIdentity, package: InMemoryPackage) -> Self {
        self.add(identity, package);
        self
    }

    /// Make every call for `id` fail with `error`.
    pub fn with_failure(mut self, id: impl Into<PackageId>, error: ProviderError) -> Self {
        self.failures.insert(id.into(), error);
        self
    }

    fn package(&self, identity: &PackageIdentity) -> Result<&InMemoryPackage, ProviderError> {
        if let Some(err) = self.failures.get(&identity.id) {
            return Err(err.clone());
        }
        self.packages
            .get(&identity.id)
            .and_then(|versions| versions.get(&identity.version))
            .ok_or(ProviderError::NotFound)
    }
}

#[async_trait]
impl DependencyProvider for InMemoryProvider {
    async fn list_versions(&self, id: &PackageId) -> Result<Vec<PackageVersion>, ProviderError> {
        if let Some(err) = self.failures.get(id) {
            return Err(err.clone());
        }
        self.packages
            .get(id)
            .map(|versions| versions.keys().cloned().collect())
            .ok_or(ProviderError::NotFound)
    }

    async fn get_dependency_groups(
        &self,
        identity: &PackageIdentity,
    ) -> Result<Vec<DependencyGroup>, ProviderError> {
        Ok(self.package(identity)?.dependency_groups.clone())
    }

    async fn get_runtime_graph(&self, identity: &PackageIdentity) -> Result<RuntimeGraph, ProviderError> {
        Ok(self.package(identity)?.runtime_graph.clone())
    }

    async fn get_asset_groups(&self, identity: &PackageIdentity) -> Result<AssetGroups, ProviderError> {
        Ok(AssetGroups::from_paths(&self.package(identity)?.files))
    }
}

/// A provider over one or more local folder feeds.
///
/// Versions are the union of all feeds; the first feed holding a version
/// answers every call for it. Disk access runs on the blocking pool.
#[derive(Debug, Clone)]
pub struct FeedProvider {
    feeds: Arc<Vec<FolderFeed>>,
}

impl FeedProvider {
    pub fn new(feeds: Vec<FolderFeed>) -> Self {
        Self {
            feeds: Arc::new(feeds),
        }
    }

    pub fn feeds(&self) -> &[FolderFeed] {
        &self.feeds
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T, ProviderError>
    where
        T: Send + 'static,
        F: FnOnce(&[FolderFeed]) -> Result<T, ProviderError> + Send + 'static,
    {
        let feeds = Arc::clone(&self.feeds);
        tokio::task::spawn_blocking(move || f(&feeds))
            .await
            .map_err(|e| ProviderError::Transient(format!("feed task failed: {e}")))?
    }

    async fn with_package<T, F>(&self, identity: &PackageIdentity, f: F) -> Result<T, ProviderError>
    where
        T: Send + 'static,
        F: FnOnce(&FolderFeed, &PackageIdentity) -> miette::Result<T> + Send + 'static,
    {
        let identity = identity.clone();
        self.blocking(move |feeds| {
            let feed = feeds
                .iter()
                .find(|feed| feed.has_package(&identity))
                .ok_or(ProviderError::NotFound)?;
            f(feed, &identity).map_err(|e| ProviderError::Transient(e.to_string()))
        })
        .await
    }
}

#[async_trait]
impl DependencyProvider for FeedProvider {
    async fn list_versions(&self, id: &PackageId) -> Result<Vec<PackageVersion>, ProviderError> {
        let id = id.clone();
        self.blocking(move |feeds| {
            let mut versions = Vec::new();
            for feed in feeds {
                let found = feed
                    .list_versions(&id)
                    .map_err(|e| ProviderError::Transient(e.to_string()))?;
                versions.extend(found);
            }
            if versions.is_empty() {
                return Err(ProviderError::NotFound);
            }
            versions.sort();
            versions.dedup();
            Ok(versions)
        })
        .await
    }

    async fn get_dependency_groups(
        &self,
        identity: &PackageIdentity,
    ) -> Result<Vec<DependencyGroup>, ProviderError> {
        self.with_package(identity, |feed, identity| match feed.read_metadata(identity)? {
            Some(meta) => meta.dependency_groups(),
            None => Ok(Vec::new()),
        })
        .await
    }

    async fn get_runtime_graph(&self, identity: &PackageIdentity) -> Result<RuntimeGraph, ProviderError> {
        self.with_package(identity, |feed, identity| feed.read_runtime_graph(identity))
            .await
    }

    async fn get_asset_groups(&self, identity: &PackageIdentity) -> Result<AssetGroups, ProviderError> {
        self.with_package(identity, |feed, identity| {
            Ok(AssetGroups::from_paths(feed.list_files(identity)?))
        })
        .await
    }
}
