//! Loading a project: manifest, global config, restore request, and feeds.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rivet_core::config::{dirs_path, GlobalConfig};
use rivet_core::manifest::{Manifest, MANIFEST_FILE};
use rivet_core::request::RestoreRequest;
use rivet_feed::folder::FolderFeed;
use rivet_resolver::{FeedProvider, RestoreOptions, RestoreResult};
use rivet_util::errors::RivetError;
use tokio::sync::watch;

/// Everything a command needs to restore one project.
#[derive(Debug, Clone)]
pub struct Project {
    pub root: PathBuf,
    pub manifest: Manifest,
    pub config: GlobalConfig,
    pub request: RestoreRequest,
    pub feeds: Vec<FolderFeed>,
}

/// The nearest directory at or above `start` holding a `rivet.toml`.
pub fn find_project_root(start: &Path) -> miette::Result<PathBuf> {
    rivet_util::fs::find_ancestor_with(start, MANIFEST_FILE).ok_or_else(|| {
        RivetError::Manifest {
            message: format!(
                "No {MANIFEST_FILE} found in {} or any parent directory",
                start.display()
            ),
        }
        .into()
    })
}

impl Project {
    /// Load the project at `root` with the global config from its default location.
    pub fn load(root: &Path, extra_runtimes: &[String], extra_sources: &[PathBuf]) -> miette::Result<Self> {
        Self::load_with_config(root, GlobalConfig::load()?, extra_runtimes, extra_sources)
    }

    /// Load the project at `root`.
    ///
    /// Feeds come from the manifest's `[sources]` (relative to `root`), then the
    /// global config (relative to the Rivet data directory), then
    /// `extra_sources`. Missing feed directories are skipped with a warning.
    pub fn load_with_config(
        root: &Path,
        config: GlobalConfig,
        extra_runtimes: &[String],
        extra_sources: &[PathBuf],
    ) -> miette::Result<Self> {
        let manifest = Manifest::from_path(&root.join(MANIFEST_FILE))?;
        let mut request = RestoreRequest::from_manifest(&manifest, root)?;
        for rid in extra_runtimes {
            request = request.with_runtime(rid.trim());
        }
        request.validate()?;

        let data_dir = dirs_path();
        let candidates = manifest
            .sources
            .values()
            .map(|p| root.join(p))
            .chain(config.sources.values().map(|p| data_dir.join(p)))
            .chain(extra_sources.iter().cloned());

        let mut feeds: Vec<FolderFeed> = Vec::new();
        for path in candidates {
            if !path.is_dir() {
                tracing::warn!("Skipping missing feed {}", path.display());
                rivet_util::progress::status_warn(
                    "Warning",
                    &format!("feed {} does not exist", path.display()),
                );
                continue;
            }
            if feeds.iter().any(|f| f.root() == path) {
                continue;
            }
            feeds.push(FolderFeed::new(path));
        }
        tracing::debug!("Project {} uses {} feed(s)", request.project, feeds.len());

        Ok(Self {
            root: root.to_path_buf(),
            manifest,
            config,
            request,
            feeds,
        })
    }

    /// Fingerprint of the request plus the feed locations.
    pub fn fingerprint(&self) -> String {
        let feeds: Vec<String> = self
            .feeds
            .iter()
            .map(|f| f.root().display().to_string())
            .collect();
        self.request.fingerprint(feeds.iter().map(String::as_str))
    }

    pub fn restore_options(&self) -> RestoreOptions {
        RestoreOptions::from(&self.config.restore)
    }

    /// Run the restore against the project's feeds.
    pub async fn resolve(&self) -> miette::Result<RestoreResult> {
        if self.feeds.is_empty() {
            tracing::warn!("{} has no package feeds", self.request.project);
        }
        let provider = Arc::new(FeedProvider::new(self.feeds.clone()));
        let (_cancel_tx, cancel) = watch::channel(false);
        rivet_resolver::restore(&self.request, provider, &self.restore_options(), cancel).await
    }
}
