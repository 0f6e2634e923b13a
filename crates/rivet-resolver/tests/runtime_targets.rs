use std::sync::Arc;

use rivet_core::dependency::{AssetFlags, PackageDependency};
use rivet_core::framework::Framework;
use rivet_core::lockfile::{AssetType, LockFileTargetLibrary, RuntimeTarget};
use rivet_core::package::PackageIdentity;
use rivet_core::request::RestoreRequest;
use rivet_core::version::{PackageVersion, VersionRange};
use rivet_resolver::failure::FailureKind;
use rivet_resolver::{restore, InMemoryPackage, InMemoryProvider, RestoreOptions, RestoreResult};
use tokio::sync::watch;

const SCENARIO_FILES: &[&str] = &[
    "lib/netstandard1.5/a.dll",
    "native/a.dll",
    "runtimes/unix/native/a.dll",
    "runtimes/unix/lib/netstandard1.5/a.dll",
    "runtimes/win7/lib/netstandard1.5/a.dll",
    "runtimes/win7-x86/lib/netstandard1.5/a.dll",
    "runtimes/win7-x86/lib/netstandard1.5/en-us/a.resources.dll",
];

fn provider_with(files: &[&str]) -> InMemoryProvider {
    InMemoryProvider::new().with_package(
        PackageIdentity::new("a", PackageVersion::new(1, 0, 0)),
        InMemoryPackage::new().with_files(files.iter().copied()),
    )
}

fn request(framework: &str, root: PackageDependency, runtimes: &[&str]) -> RestoreRequest {
    runtimes.iter().fold(
        RestoreRequest::new("app").with_framework(Framework::parse(framework).unwrap(), vec![root]),
        |request, rid| request.with_runtime(*rid),
    )
}

fn root() -> PackageDependency {
    PackageDependency::new("a", VersionRange::parse("1.0.0").unwrap())
}

async fn run(request: &RestoreRequest, provider: InMemoryProvider) -> RestoreResult {
    let (_tx, cancel) = watch::channel(false);
    restore(request, Arc::new(provider), &RestoreOptions::default(), cancel)
        .await
        .unwrap()
}

fn library<'a>(result: &'a RestoreResult, framework: &str, rid: Option<&str>) -> &'a LockFileTargetLibrary {
    let framework = Framework::parse(framework).unwrap();
    result
        .lock_file
        .target(&framework, rid)
        .and_then(|t| t.library("a"))
        .unwrap()
}

fn target(path: &str, rid: &str, asset_type: AssetType) -> RuntimeTarget {
    RuntimeTarget {
        path: path.to_string(),
        rid: rid.to_string(),
        asset_type,
    }
}

#[tokio::test]
async fn no_runtimes_means_no_runtime_targets() {
    let result = run(&request("netstandard1.5", root(), &[]), provider_with(SCENARIO_FILES)).await;

    assert!(result.success);
    assert_eq!(result.lock_file.targets.len(), 1);
    let lib = library(&result, "netstandard1.5", None);
    assert!(lib.runtime_targets.is_empty());
    assert_eq!(lib.runtime, vec!["lib/netstandard1.5/a.dll"]);
    assert_eq!(lib.compile, vec!["lib/netstandard1.5/a.dll"]);
}

#[tokio::test]
async fn runtime_targets_list_every_rid_partition() {
    let result = run(&request("netstandard1.5", root(), &["win7-x86"]), provider_with(SCENARIO_FILES)).await;

    assert!(result.success);
    assert_eq!(result.lock_file.targets.len(), 2);

    let lib = library(&result, "netstandard1.5", None);
    assert_eq!(
        lib.runtime_targets,
        vec![
            target("runtimes/unix/lib/netstandard1.5/a.dll", "unix", AssetType::Runtime),
            target("runtimes/win7/lib/netstandard1.5/a.dll", "win7", AssetType::Runtime),
            target("runtimes/win7-x86/lib/netstandard1.5/a.dll", "win7-x86", AssetType::Runtime),
            target(
                "runtimes/win7-x86/lib/netstandard1.5/en-us/a.resources.dll",
                "win7-x86",
                AssetType::Resource
            ),
            target("runtimes/unix/native/a.dll", "unix", AssetType::Native),
        ]
    );

    let rid_lib = library(&result, "netstandard1.5", Some("win7-x86"));
    assert!(rid_lib.runtime_targets.is_empty());
    assert_eq!(rid_lib.runtime, vec!["runtimes/win7-x86/lib/netstandard1.5/a.dll"]);
    assert_eq!(
        rid_lib.resource,
        vec!["runtimes/win7-x86/lib/netstandard1.5/en-us/a.resources.dll"]
    );
    assert!(rid_lib.native.is_empty());
}

#[tokio::test]
async fn excluded_assets_become_placeholders() {
    let excluded = root().with_exclude(AssetFlags::ALL);
    let result = run(&request("netstandard1.5", excluded, &["win7-x86"]), provider_with(SCENARIO_FILES)).await;

    let lib = library(&result, "netstandard1.5", None);
    assert_eq!(
        lib.runtime_targets,
        vec![
            target("runtimes/unix/lib/netstandard1.5/_._", "unix", AssetType::Runtime),
            target("runtimes/win7-x86/lib/netstandard1.5/en-us/_._", "win7-x86", AssetType::Resource),
            target("runtimes/unix/native/_._", "unix", AssetType::Native),
        ]
    );
    assert_eq!(lib.compile, vec!["lib/netstandard1.5/_._"]);
    assert_eq!(lib.runtime, vec!["lib/netstandard1.5/_._"]);

    let rid_lib = library(&result, "netstandard1.5", Some("win7-x86"));
    assert_eq!(rid_lib.runtime, vec!["runtimes/win7-x86/lib/netstandard1.5/_._"]);
}

#[tokio::test]
async fn each_rid_picks_its_nearest_framework() {
    let files = [
        "runtimes/unix/lib/netstandard1.1/a.dll",
        "runtimes/unix/lib/netstandard1.2/a.dll",
        "runtimes/unix/lib/netstandard2.0/a.dll",
        "runtimes/win7/lib/netstandard1.3/a.dll",
        "runtimes/win7/lib/netstandard1.4/a.dll",
        "runtimes/win81-x86/lib/win81/a.dll",
        "runtimes/win81-x86/lib/win8/a.dll",
        "runtimes/win-any/lib/net45/a.dll",
    ];
    let result = run(&request("uap10.0", root(), &["win7-x86"]), provider_with(&files)).await;

    assert!(result.success, "{:?}", result.failures);
    let lib = library(&result, "uap10.0", None);
    assert_eq!(
        lib.runtime_targets,
        vec![
            target("runtimes/unix/lib/netstandard1.2/a.dll", "unix", AssetType::Runtime),
            target("runtimes/win7/lib/netstandard1.4/a.dll", "win7", AssetType::Runtime),
            target("runtimes/win81-x86/lib/win81/a.dll", "win81-x86", AssetType::Runtime),
        ]
    );

    let rid_lib = library(&result, "uap10.0", Some("win7-x86"));
    assert_eq!(rid_lib.runtime, vec!["runtimes/win7/lib/netstandard1.4/a.dll"]);
}

#[tokio::test]
async fn undeclared_rid_falls_back_to_ridless_assets() {
    let result = run(&request("netstandard1.5", root(), &["custom"]), provider_with(SCENARIO_FILES)).await;

    assert!(result.success);
    let rid_lib = library(&result, "netstandard1.5", Some("custom"));
    assert_eq!(rid_lib.runtime, vec!["lib/netstandard1.5/a.dll"]);
    assert!(rid_lib.native.is_empty());
}

#[tokio::test]
async fn native_assets_follow_the_fallback_chain() {
    let result = run(&request("netstandard1.5", root(), &["linux-x64"]), provider_with(SCENARIO_FILES)).await;

    let rid_lib = library(&result, "netstandard1.5", Some("linux-x64"));
    assert_eq!(rid_lib.native, vec!["runtimes/unix/native/a.dll"]);
    assert_eq!(rid_lib.runtime, vec!["runtimes/unix/lib/netstandard1.5/a.dll"]);
}

#[tokio::test]
async fn incompatible_package_fails_only_its_framework() {
    let files = ["lib/net45/a.dll"];
    let request = RestoreRequest::new("app")
        .with_framework(Framework::parse("net45").unwrap(), vec![root()])
        .with_framework(Framework::parse("netstandard1.0").unwrap(), vec![root()]);
    let result = run(&request, provider_with(&files)).await;

    assert!(!result.success);
    assert_eq!(result.lock_file.targets.len(), 2);
    assert!(result.graph("net45", None).unwrap().failures.is_empty());
    let failed = result.graph("netstandard1.0", None).unwrap();
    assert_eq!(failed.failures.len(), 1);
    assert_eq!(failed.failures[0].kind, FailureKind::IncompatibleFramework);
    assert_eq!(library(&result, "net45", None).runtime, vec!["lib/net45/a.dll"]);
}
