//! Local folder feeds: package directory layout, `package.toml` metadata,
//! and package file enumeration.

pub mod folder;
pub mod metadata;

pub use folder::FolderFeed;
pub use metadata::PackageMetadata;
