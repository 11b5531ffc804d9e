pub mod init;
pub mod start;
pub mod status;

use std::path::{Path, PathBuf};

use anyhow::Result;
use gitpulse_sync::SyncConfig;

pub const CONFIG_FILE: &str = "gitpulse.toml";
pub const REPO_DIR: &str = ".gitpulse";

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

/// Load the config next to the tracked directory, falling back to defaults
/// when no file exists yet.
pub fn load_config(root: &Path, custom: Option<PathBuf>) -> Result<SyncConfig> {
    let path = custom.unwrap_or_else(|| config_path(root));
    if path.exists() {
        Ok(SyncConfig::load(&path)?)
    } else {
        Ok(SyncConfig::new(root.to_path_buf(), root.join(REPO_DIR)))
    }
}
