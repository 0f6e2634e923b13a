use rivet_core::dependency::{AssetFlags, ManifestDependency, PackageDependency};
use rivet_core::version::VersionRange;

#[test]
fn asset_flags_parse_tags() {
    let flags = AssetFlags::parse("runtime, native").unwrap();
    assert!(flags.contains(AssetFlags::RUNTIME));
    assert!(flags.contains(AssetFlags::NATIVE));
    assert!(!flags.contains(AssetFlags::COMPILE));
    assert_eq!(flags.to_string(), "runtime, native");
}

#[test]
fn asset_flags_parse_all_and_none() {
    assert_eq!(AssetFlags::parse("all").unwrap(), AssetFlags::ALL);
    assert_eq!(AssetFlags::parse("None").unwrap(), AssetFlags::NONE);
    assert_eq!(AssetFlags::parse("").unwrap(), AssetFlags::NONE);
    assert_eq!(AssetFlags::parse("contentfiles").unwrap(), AssetFlags::CONTENT_FILES);
}

#[test]
fn asset_flags_unknown_tag_is_error() {
    assert!(AssetFlags::parse("runtime;docs").is_err());
}

#[test]
fn effective_flags_subtract_exclude() {
    let dep = PackageDependency::new("a", VersionRange::parse("1.0").unwrap())
        .with_exclude(AssetFlags::RUNTIME);
    let flags = dep.effective_flags();
    assert!(!flags.contains(AssetFlags::RUNTIME));
    assert!(flags.contains(AssetFlags::NATIVE));

    let all = PackageDependency::new("a", VersionRange::parse("1.0").unwrap())
        .with_exclude(AssetFlags::ALL);
    assert!(all.effective_flags().is_empty());
}

#[test]
fn manifest_dependency_short_form() {
    let spec: ManifestDependency = toml::Value::String("1.0.0".into()).try_into().unwrap();
    let dep = spec.to_dependency("packageA").unwrap();
    assert_eq!(dep.id.as_str(), "packageA");
    assert_eq!(dep.range.to_string(), "[1.0.0, )");
    assert_eq!(dep.include, AssetFlags::ALL);
    assert_eq!(dep.exclude, AssetFlags::NONE);
}

#[test]
fn manifest_dependency_detailed_form() {
    let value: toml::Value =
        toml::from_str::<toml::Table>(r#"d = { version = "[1.0, 2.0)", exclude = "all" }"#)
            .unwrap()["d"]
            .clone();
    let spec: ManifestDependency = value.try_into().unwrap();
    let dep = spec.to_dependency("packageA").unwrap();
    assert_eq!(dep.range.to_string(), "[1.0.0, 2.0.0)");
    assert_eq!(dep.exclude, AssetFlags::ALL);
}

#[test]
fn manifest_dependency_bad_range_is_error() {
    let spec = ManifestDependency::Short("[2.0, 1.0]".to_string());
    assert!(spec.to_dependency("x").is_err());
}

#[test]
fn display_line_uses_pretty_range() {
    let dep = PackageDependency::new("packageA", VersionRange::parse("1.0.0").unwrap());
    assert_eq!(dep.display_line(), "packageA >= 1.0.0");
}
