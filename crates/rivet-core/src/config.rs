use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rivet_util::errors::RivetError;

/// Global user configuration loaded from `~/.rivet/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalConfig {
    #[serde(default)]
    pub restore: RestoreConfig,

    /// Extra folder feeds, consulted after the project's own.
    #[serde(default)]
    pub sources: BTreeMap<String, String>,
}

/// How a version conflict affects its target graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// The target graph fails.
    #[default]
    Error,
    /// The conflict is reported as a warning only.
    Warn,
}

/// Restore settings from `[restore]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreConfig {
    #[serde(default = "default_max_concurrent_fetches", rename = "max-concurrent-fetches")]
    pub max_concurrent_fetches: usize,
    #[serde(default, rename = "conflict-policy")]
    pub conflict_policy: ConflictPolicy,
}

impl Default for RestoreConfig {
    fn default() -> Self {
        Self {
            max_concurrent_fetches: default_max_concurrent_fetches(),
            conflict_policy: ConflictPolicy::default(),
        }
    }
}

fn default_max_concurrent_fetches() -> usize {
    8
}

impl GlobalConfig {
    /// Load the global configuration, or return defaults if the file doesn't exist.
    pub fn load() -> miette::Result<Self> {
        Self::load_from(&Self::default_path())
    }

    pub fn load_from(path: &Path) -> miette::Result<Self> {
        if !path.is_file() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| RivetError::Generic {
            message: format!("Failed to read global config: {e}"),
        })?;
        let config: GlobalConfig = toml::from_str(&content).map_err(|e| RivetError::Generic {
            message: format!("Failed to parse global config: {e}"),
        })?;
        if config.restore.max_concurrent_fetches == 0 {
            return Err(RivetError::Generic {
                message: "max-concurrent-fetches must be at least 1".to_string(),
            }
            .into());
        }
        Ok(config)
    }

    /// Returns the default path to the global config file.
    pub fn default_path() -> PathBuf {
        dirs_path().join("config.toml")
    }
}

/// Returns the Rivet data directory: `$RIVET_HOME`, or `~/.rivet/`.
pub fn dirs_path() -> PathBuf {
    if let Ok(home) = std::env::var("RIVET_HOME") {
        if !home.is_empty() {
            return PathBuf::from(home);
        }
    }
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());
    Path::new(&home).join(".rivet")
}
