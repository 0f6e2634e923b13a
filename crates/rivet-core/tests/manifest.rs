use rivet_core::dependency::AssetFlags;
use rivet_core::manifest::Manifest;

const APP: &str = r#"
[project]
name = "app"
version = "1.0.0"
runtimes = ["win7-x86", "unix"]

[sources]
local = "packages"

[dependencies]
zeta = "1.0.0"
alpha = "2.0.0"

[frameworks."netstandard1.5".dependencies]
packageA = { version = "1.0.0", exclude = "all" }

[frameworks."net461"]
"#;

#[test]
fn test_parse_full_manifest() {
    let manifest = Manifest::parse(APP).unwrap();
    assert_eq!(manifest.project.name, "app");
    assert_eq!(manifest.project.version.as_deref(), Some("1.0.0"));
    assert_eq!(manifest.project.runtimes, vec!["win7-x86", "unix"]);
    assert_eq!(manifest.sources["local"], "packages");
    assert_eq!(manifest.frameworks.len(), 2);
    assert!(manifest.frameworks["net461"].dependencies.is_empty());
}

#[test]
fn test_shared_dependencies_keep_declared_order() {
    let manifest = Manifest::parse(APP).unwrap();
    let deps = manifest.shared_dependencies().unwrap();
    let ids: Vec<&str> = deps.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, vec!["zeta", "alpha"]);
}

#[test]
fn test_framework_dependencies_parse_flags() {
    let manifest = Manifest::parse(APP).unwrap();
    let deps = manifest.frameworks["netstandard1.5"].dependencies().unwrap();
    assert_eq!(deps.len(), 1);
    assert_eq!(deps[0].exclude, AssetFlags::ALL);
}

#[test]
fn test_minimal_manifest() {
    let manifest = Manifest::parse("[project]\nname = \"x\"\n").unwrap();
    assert!(manifest.project.runtimes.is_empty());
    assert!(manifest.project.runtime_graph.is_none());
    assert!(manifest.frameworks.is_empty());
}

#[test]
fn test_missing_project_is_error() {
    assert!(Manifest::parse("[dependencies]\na = \"1.0\"\n").is_err());
}

#[test]
fn test_from_path() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("rivet.toml");
    std::fs::write(&path, APP).unwrap();
    let manifest = Manifest::from_path(&path).unwrap();
    assert_eq!(manifest.project.name, "app");
    assert!(Manifest::from_path(&tmp.path().join("missing.toml")).is_err());
}
