use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rivet_core::config::ConflictPolicy;
use rivet_core::dependency::{AssetFlags, DependencyGroup, PackageDependency};
use rivet_core::framework::Framework;
use rivet_core::lockfile::LockFile;
use rivet_core::package::{PackageId, PackageIdentity};
use rivet_core::request::RestoreRequest;
use rivet_core::runtime_graph::{RuntimeDependencySet, RuntimeDescription, RuntimeGraph};
use rivet_core::version::{PackageVersion, VersionRange};
use rivet_feed::folder::FolderFeed;
use rivet_feed::metadata::PackageMetadata;
use rivet_resolver::content::AssetGroups;
use rivet_resolver::{
    restore, DependencyProvider, FeedProvider, InMemoryPackage, InMemoryProvider, ProviderError,
    RestoreOptions, RestoreResult,
};
use tokio::sync::watch;

fn v(s: &str) -> PackageVersion {
    PackageVersion::parse(s).unwrap()
}

fn dep(id: &str, range: &str) -> PackageDependency {
    PackageDependency::new(id, VersionRange::parse(range).unwrap())
}

fn fw(s: &str) -> Framework {
    Framework::parse(s).unwrap()
}

fn add(provider: InMemoryProvider, id: &str, version: &str, deps: &[(&str, &str)], files: &[&str]) -> InMemoryProvider {
    let deps = deps.iter().map(|(id, range)| dep(id, range)).collect();
    provider.with_package(
        PackageIdentity::new(id, v(version)),
        InMemoryPackage::new()
            .with_group(DependencyGroup::new(Framework::ANY, deps))
            .with_files(files.iter().copied()),
    )
}

fn diamond() -> InMemoryProvider {
    let provider = add(InMemoryProvider::new(), "a", "1.0.0", &[("b", "1.0.0"), ("c", "1.0.0")], &["lib/net45/a.dll"]);
    let provider = add(provider, "b", "1.0.0", &[("d", "1.0.0")], &["lib/net45/b.dll"]);
    let provider = add(provider, "c", "1.0.0", &[("d", "1.0.0")], &["lib/netstandard1.0/c.dll"]);
    add(provider, "d", "1.0.0", &[], &["lib/netstandard1.0/d.dll"])
}

async fn run(request: &RestoreRequest, provider: Arc<dyn DependencyProvider>, options: RestoreOptions) -> RestoreResult {
    let (_tx, cancel) = watch::channel(false);
    restore(request, provider, &options, cancel).await.unwrap()
}

#[derive(Default)]
struct Calls {
    versions: HashMap<String, usize>,
    groups: HashMap<String, usize>,
}

/// Counts calls that reach the wrapped provider.
struct Counting {
    inner: InMemoryProvider,
    calls: Mutex<Calls>,
}

#[async_trait]
impl DependencyProvider for Counting {
    async fn list_versions(&self, id: &PackageId) -> Result<Vec<PackageVersion>, ProviderError> {
        *self.calls.lock().unwrap().versions.entry(id.key()).or_default() += 1;
        self.inner.list_versions(id).await
    }

    async fn get_dependency_groups(
        &self,
        identity: &PackageIdentity,
    ) -> Result<Vec<DependencyGroup>, ProviderError> {
        *self.calls.lock().unwrap().groups.entry(identity.to_string()).or_default() += 1;
        self.inner.get_dependency_groups(identity).await
    }

    async fn get_runtime_graph(&self, identity: &PackageIdentity) -> Result<RuntimeGraph, ProviderError> {
        self.inner.get_runtime_graph(identity).await
    }

    async fn get_asset_groups(&self, identity: &PackageIdentity) -> Result<AssetGroups, ProviderError> {
        self.inner.get_asset_groups(identity).await
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn each_package_is_fetched_once_per_restore() {
    let counting = Arc::new(Counting {
        inner: diamond(),
        calls: Mutex::new(Calls::default()),
    });
    let request = RestoreRequest::new("app")
        .with_framework(fw("net45"), vec![dep("a", "1.0.0")])
        .with_framework(fw("net461"), vec![dep("a", "1.0.0")])
        .with_runtime("win7-x86")
        .with_runtime("linux-x64");

    let result = run(&request, counting.clone(), RestoreOptions::default()).await;

    assert!(result.success, "{:?}", result.failures);
    assert_eq!(result.lock_file.targets.len(), 6);
    let calls = counting.calls.lock().unwrap();
    assert_eq!(calls.versions.len(), 4);
    assert!(calls.versions.values().all(|n| *n == 1), "{:?}", calls.versions);
    assert_eq!(calls.groups.len(), 4);
    assert!(calls.groups.values().all(|n| *n == 1), "{:?}", calls.groups);
}

/// Never answers version queries in time.
struct Stalled;

#[async_trait]
impl DependencyProvider for Stalled {
    async fn list_versions(&self, _id: &PackageId) -> Result<Vec<PackageVersion>, ProviderError> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Err(ProviderError::NotFound)
    }

    async fn get_dependency_groups(&self, _: &PackageIdentity) -> Result<Vec<DependencyGroup>, ProviderError> {
        Ok(Vec::new())
    }

    async fn get_runtime_graph(&self, _: &PackageIdentity) -> Result<RuntimeGraph, ProviderError> {
        Ok(RuntimeGraph::new())
    }

    async fn get_asset_groups(&self, _: &PackageIdentity) -> Result<AssetGroups, ProviderError> {
        Ok(AssetGroups::default())
    }
}

#[tokio::test]
async fn cancellation_stops_a_stalled_restore() {
    let request = RestoreRequest::new("app").with_framework(fw("net45"), vec![dep("a", "1.0.0")]);
    let (tx, cancel) = watch::channel(false);

    let handle = tokio::spawn(async move {
        restore(&request, Arc::new(Stalled), &RestoreOptions::default(), cancel).await
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    tx.send(true).unwrap();

    let outcome = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("restore did not stop after cancel")
        .unwrap();
    let err = outcome.unwrap_err();
    assert!(err.to_string().to_lowercase().contains("cancel"), "{err}");
}

fn conflicting() -> (RestoreRequest, InMemoryProvider) {
    let provider = add(InMemoryProvider::new(), "x", "1.0.0", &[], &[]);
    let provider = add(provider, "x", "2.0.0", &[], &[]);
    let provider = add(provider, "b", "1.0.0", &[("x", "2.0.0")], &[]);
    let request = RestoreRequest::new("app").with_framework(fw("net45"), vec![dep("x", "1.0.0"), dep("b", "1.0.0")]);
    (request, provider)
}

#[tokio::test]
async fn conflicts_fail_the_restore_by_default() {
    let (request, provider) = conflicting();
    let result = run(&request, Arc::new(provider), RestoreOptions::default()).await;

    assert!(!result.success);
    assert_eq!(result.conflicts.len(), 1);
    let report = result.conflicts.to_string();
    assert!(report.contains("Version conflicts (1):"), "{report}");
    assert!(report.contains("x [net45] requested >= 2.0.0 but resolved 1.0.0"), "{report}");
}

#[tokio::test]
async fn warn_policy_keeps_conflicts_non_fatal() {
    let (request, provider) = conflicting();
    let options = RestoreOptions {
        conflict_policy: ConflictPolicy::Warn,
        ..RestoreOptions::default()
    };
    let result = run(&request, Arc::new(provider), options).await;

    assert!(result.success);
    assert_eq!(result.conflicts.len(), 1);
    let target = result.lock_file.target(&fw("net45"), None).unwrap();
    assert_eq!(target.library("x").unwrap().version, v("1.0.0"));
}

#[tokio::test]
async fn conflicting_restore_leaves_fingerprint_to_the_caller() {
    let (request, provider) = conflicting();
    let result = run(&request, Arc::new(provider), RestoreOptions::default()).await;
    assert!(!result.success);
    assert!(result.lock_file.restore_fingerprint.is_none());
}

#[tokio::test]
async fn exclusion_applies_only_through_its_edge() {
    let provider = add(InMemoryProvider::new(), "x", "1.0.0", &[("z", "1.0.0")], &["lib/net45/x.dll"]);
    let provider = add(provider, "y", "1.0.0", &[("x", "1.0.0")], &["lib/net45/y.dll"]);
    let provider = add(provider, "z", "1.0.0", &[], &["lib/net45/z.dll"]);
    let request = RestoreRequest::new("app").with_framework(
        fw("net45"),
        vec![dep("x", "1.0.0").with_exclude(AssetFlags::ALL), dep("y", "1.0.0")],
    );

    let result = run(&request, Arc::new(provider), RestoreOptions::default()).await;

    assert!(result.success, "{:?}", result.failures);
    let target = result.lock_file.target(&fw("net45"), None).unwrap();
    assert_eq!(target.library("x").unwrap().runtime, vec!["lib/net45/x.dll"]);
    assert_eq!(target.library("z").unwrap().runtime, vec!["lib/net45/z.dll"]);
    assert_eq!(target.library("z").unwrap().compile, vec!["lib/net45/z.dll"]);
}

#[tokio::test]
async fn exclusion_on_every_path_reaches_dependencies() {
    let provider = add(InMemoryProvider::new(), "x", "1.0.0", &[("z", "1.0.0")], &["lib/net45/x.dll"]);
    let provider = add(provider, "z", "1.0.0", &[], &["lib/net45/z.dll"]);
    let request = RestoreRequest::new("app")
        .with_framework(fw("net45"), vec![dep("x", "1.0.0").with_exclude(AssetFlags::ALL)]);

    let result = run(&request, Arc::new(provider), RestoreOptions::default()).await;

    let target = result.lock_file.target(&fw("net45"), None).unwrap();
    assert_eq!(target.library("x").unwrap().runtime, vec!["lib/net45/_._"]);
    assert_eq!(target.library("z").unwrap().runtime, vec!["lib/net45/_._"]);
}

#[tokio::test]
async fn package_runtime_graphs_add_rid_dependencies() {
    let mut fragment = RuntimeGraph::new();
    let mut win7 = RuntimeDescription::new("win7", &[]);
    win7.dependency_sets.insert(
        PackageId::new("a"),
        RuntimeDependencySet {
            id: PackageId::new("a"),
            dependencies: vec![(PackageId::new("runtime.win7.a"), VersionRange::parse("1.0.0").unwrap())],
        },
    );
    fragment.add(win7);

    let provider = InMemoryProvider::new()
        .with_package(
            PackageIdentity::new("a", v("1.0.0")),
            InMemoryPackage::new()
                .with_files(["lib/net45/a.dll"])
                .with_runtime_graph(fragment),
        )
        .with_package(
            PackageIdentity::new("runtime.win7.a", v("1.0.0")),
            InMemoryPackage::new().with_files(["runtimes/win7/native/a.dll"]),
        );
    let request = RestoreRequest::new("app")
        .with_framework(fw("net45"), vec![dep("a", "1.0.0")])
        .with_runtime("win7-x86");

    let result = run(&request, Arc::new(provider), RestoreOptions::default()).await;

    assert!(result.success, "{:?}", result.failures);
    let plain = result.lock_file.target(&fw("net45"), None).unwrap();
    assert!(plain.library("runtime.win7.a").is_none());
    let rid = result.lock_file.target(&fw("net45"), Some("win7-x86")).unwrap();
    assert_eq!(rid.library("a").unwrap().dependencies["runtime.win7.a"], "[1.0.0, )");
    assert_eq!(rid.library("runtime.win7.a").unwrap().native, vec!["runtimes/win7/native/a.dll"]);
    assert_eq!(result.lock_file.libraries.len(), 2);
}

#[tokio::test]
async fn rid_graphs_reuse_framework_versions() {
    let provider = add(InMemoryProvider::new(), "a", "1.0.0", &[("b", "1.0.0")], &[]);
    let provider = add(provider, "b", "1.0.0", &[], &[]);
    let provider = add(provider, "b", "1.5.0", &[], &[]);
    let request = RestoreRequest::new("app")
        .with_framework(fw("net45"), vec![dep("a", "1.0.0")])
        .with_runtime("win7-x64");

    let result = run(&request, Arc::new(provider), RestoreOptions::default()).await;

    let plain = result.graph("net45", None).unwrap().graph.resolved_versions();
    let rid = result.graph("net45", Some("win7-x64")).unwrap().graph.resolved_versions();
    assert_eq!(plain, rid);
    assert_eq!(plain[&PackageId::new("b")], v("1.0.0"));
}

#[tokio::test]
async fn lock_file_is_deterministic_and_round_trips() {
    let request = RestoreRequest::new("app")
        .with_framework(fw("net461"), vec![dep("a", "1.0.0")])
        .with_framework(fw("net45"), vec![dep("a", "1.0.0")])
        .with_runtime("win7-x86");

    let first = run(&request, Arc::new(diamond()), RestoreOptions::default()).await;
    let second = run(&request, Arc::new(diamond()), RestoreOptions::default()).await;

    let json = first.lock_file.to_string_pretty().unwrap();
    assert_eq!(json, second.lock_file.to_string_pretty().unwrap());
    assert_eq!(LockFile::parse(&json).unwrap(), first.lock_file);

    let names: Vec<String> = first.lock_file.targets.iter().map(|t| t.name()).collect();
    assert_eq!(names, vec!["net45", "net45/win7-x86", "net461", "net461/win7-x86"]);
    let ids: Vec<&str> = first.lock_file.libraries.iter().map(|l| l.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "c", "d"]);
    assert_eq!(first.lock_file.libraries[0].dependencies, vec!["b", "c"]);
    assert_eq!(first.lock_file.project_file_dependency_groups["net45"], vec!["a >= 1.0.0"]);
    assert!(first.lock_file.restore_fingerprint.is_none());
}

#[tokio::test]
async fn invalid_requests_are_rejected() {
    let request = RestoreRequest::new("app");
    let (_tx, cancel) = watch::channel(false);
    let err = restore(&request, Arc::new(InMemoryProvider::new()), &RestoreOptions::default(), cancel)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("no target frameworks"), "{err}");
}

#[tokio::test]
async fn folder_feeds_back_a_restore() {
    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();
    let primary = FolderFeed::new(first.path());
    let secondary = FolderFeed::new(second.path());

    primary
        .put_package(
            &PackageMetadata::new("a", "1.0.0").with_group(None, &[("b", "1.0.0")]),
            &[("lib/net45/a.dll", b"a".as_slice())],
        )
        .unwrap();
    secondary
        .put_package(&PackageMetadata::new("b", "1.0.0"), &[("lib/net45/b.dll", b"b".as_slice())])
        .unwrap();
    secondary
        .put_package(&PackageMetadata::new("b", "2.0.0"), &[("lib/net45/b.dll", b"b2".as_slice())])
        .unwrap();

    let provider = FeedProvider::new(vec![primary, secondary]);
    let request = RestoreRequest::new("app").with_framework(fw("net45"), vec![dep("a", "1.0.0")]);
    let result = run(&request, Arc::new(provider), RestoreOptions::default()).await;

    assert!(result.success, "{:?}", result.failures);
    let target = result.lock_file.target(&fw("net45"), None).unwrap();
    assert_eq!(target.library("b").unwrap().version, v("1.0.0"));
    assert_eq!(target.library("a").unwrap().runtime, vec!["lib/net45/a.dll"]);
    let a = result.lock_file.library("a", &v("1.0.0")).unwrap();
    assert_eq!(a.files, vec!["lib/net45/a.dll"]);
    assert_eq!(a.dependencies, vec!["b"]);
}
