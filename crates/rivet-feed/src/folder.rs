//! A read-only package feed laid out on disk as `<root>/<id>/<version>/`.

use std::fs;
use std::path::{Path, PathBuf};

use rivet_core::package::{PackageId, PackageIdentity};
use rivet_core::runtime_graph::RuntimeGraph;
use rivet_core::version::PackageVersion;
use rivet_util::errors::RivetError;

use crate::metadata::{PackageMetadata, METADATA_FILE, RUNTIME_GRAPH_FILE};

/// A local folder feed. Package ids and versions map to lowercase directory
/// names; each version directory holds `package.toml`, an optional
/// `runtime.json`, and the package files.
#[derive(Debug, Clone)]
pub struct FolderFeed {
    root: PathBuf,
}

fn feed_error(message: String) -> RivetError {
    RivetError::Feed { message }
}

impl FolderFeed {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The root directory of this feed.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn id_dir(&self, id: &PackageId) -> PathBuf {
        self.root.join(id.key())
    }

    /// Directory holding one package version.
    pub fn package_dir(&self, identity: &PackageIdentity) -> PathBuf {
        self.id_dir(&identity.id)
            .join(identity.version.to_string().to_ascii_lowercase())
    }

    pub fn has_package(&self, identity: &PackageIdentity) -> bool {
        self.package_dir(identity).join(METADATA_FILE).is_file()
    }

    /// All versions of `id` present in the feed, ascending. Unknown ids give an empty list.
    pub fn list_versions(&self, id: &PackageId) -> miette::Result<Vec<PackageVersion>> {
        let dir = self.id_dir(id);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&dir)
            .map_err(|e| feed_error(format!("Failed to read {}: {e}", dir.display())))?;

        let mut versions = Vec::new();
        for entry in entries {
            let entry = entry.map_err(RivetError::Io)?;
            let path = entry.path();
            if !path.join(METADATA_FILE).is_file() {
                continue;
            }
            let name = entry.file_name();
            let name = name.to_string_lossy();
            match PackageVersion::parse(&name) {
                Ok(v) => versions.push(v),
                Err(_) => {
                    tracing::debug!("Skipping non-version directory {}", path.display());
                }
            }
        }
        versions.sort();
        versions.dedup();
        Ok(versions)
    }

    /// Read `package.toml`, or `None` when the version is not in the feed.
    pub fn read_metadata(&self, identity: &PackageIdentity) -> miette::Result<Option<PackageMetadata>> {
        let path = self.package_dir(identity).join(METADATA_FILE);
        if !path.is_file() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)
            .map_err(|e| feed_error(format!("Failed to read {}: {e}", path.display())))?;
        let meta = PackageMetadata::parse(&content)?;
        let declared = meta.identity()?;
        if declared != *identity {
            return Err(feed_error(format!(
                "{} declares {declared}, expected {identity}",
                path.display()
            ))
            .into());
        }
        Ok(Some(meta))
    }

    /// The package's `runtime.json` fragment, empty when absent.
    pub fn read_runtime_graph(&self, identity: &PackageIdentity) -> miette::Result<RuntimeGraph> {
        let path = self.package_dir(identity).join(RUNTIME_GRAPH_FILE);
        if !path.is_file() {
            return Ok(RuntimeGraph::new());
        }
        RuntimeGraph::from_path(&path)
    }

    /// Package file paths relative to the package directory, `/`-separated and sorted.
    /// The feed's own metadata file is not part of the package content.
    pub fn list_files(&self, identity: &PackageIdentity) -> miette::Result<Vec<String>> {
        let dir = self.package_dir(identity);
        let mut files = Vec::new();
        collect_files(&dir, &dir, &mut files)?;
        files.retain(|f| f != METADATA_FILE);
        files.sort();
        Ok(files)
    }

    /// Write a package into the feed. Existing files are overwritten.
    pub fn put_package(&self, meta: &PackageMetadata, files: &[(&str, &[u8])]) -> miette::Result<PathBuf> {
        let identity = meta.identity()?;
        let dir = self.package_dir(&identity);
        rivet_util::fs::ensure_dir(&dir).map_err(RivetError::Io)?;
        fs::write(dir.join(METADATA_FILE), meta.to_toml()?).map_err(RivetError::Io)?;
        for (rel, data) in files {
            let path = dir.join(rel);
            if let Some(parent) = path.parent() {
                rivet_util::fs::ensure_dir(parent).map_err(RivetError::Io)?;
            }
            fs::write(&path, data).map_err(RivetError::Io)?;
        }
        Ok(dir)
    }
}

fn collect_files(base: &Path, dir: &Path, out: &mut Vec<String>) -> miette::Result<()> {
    let entries = fs::read_dir(dir)
        .map_err(|e| feed_error(format!("Failed to read {}: {e}", dir.display())))?;
    for entry in entries {
        let path = entry.map_err(RivetError::Io)?.path();
        if path.is_dir() {
            collect_files(base, &path, out)?;
        } else if let Ok(rel) = path.strip_prefix(base) {
            let parts: Vec<String> = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            out.push(parts.join("/"));
        }
    }
    Ok(())
}
