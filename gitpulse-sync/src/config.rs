use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use gitpulse_core::{ClassifierConfig, Error, Result};

fn default_branch() -> String {
    "main".to_string()
}

fn default_interval() -> u64 {
    5
}

fn default_process_limit() -> usize {
    5
}

/// Configuration for the whole pipeline.
///
/// Every path is explicit; components never resolve directories from the
/// environment, which keeps tests hermetic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Directory being observed.
    pub project_root: PathBuf,
    /// Checkpoint repository root (the bookkeeping directory). Exclusively
    /// owned by the executor; nothing else writes to it.
    pub repo_root: PathBuf,
    /// Remote the checkpoint repository pushes to.
    pub remote_url: Option<String>,
    #[serde(default = "default_branch")]
    pub branch: String,
    /// Minutes between scheduled flushes.
    #[serde(default = "default_interval")]
    pub interval_minutes: u64,
    #[serde(default)]
    pub exclude_patterns: Option<Vec<String>>,
    #[serde(default)]
    pub allowed_extensions: Option<Vec<String>>,
    /// Maximum concurrent git subprocesses across the executor.
    #[serde(default = "default_process_limit")]
    pub process_limit: usize,
}

impl SyncConfig {
    pub fn new(project_root: PathBuf, repo_root: PathBuf) -> Self {
        Self {
            project_root,
            repo_root,
            remote_url: None,
            branch: default_branch(),
            interval_minutes: default_interval(),
            exclude_patterns: None,
            allowed_extensions: None,
            process_limit: default_process_limit(),
        }
    }

    pub fn with_remote_url(mut self, url: impl Into<String>) -> Self {
        self.remote_url = Some(url.into());
        self
    }

    pub fn with_interval_minutes(mut self, minutes: u64) -> Self {
        self.interval_minutes = minutes;
        self
    }

    /// Load from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw).map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    /// Classifier settings derived from this config, defaults filled in.
    pub fn classifier_config(&self) -> ClassifierConfig {
        let mut config = ClassifierConfig::new(self.repo_root.clone());
        if let Some(patterns) = &self.exclude_patterns {
            config = config.with_exclude_patterns(patterns.clone());
        }
        if let Some(extensions) = &self.allowed_extensions {
            config = config.with_allowed_extensions(extensions.clone());
        }
        config
    }
}
