use std::path::PathBuf;

use anyhow::{bail, Result};
use colored::Colorize;

use gitpulse_core::EventHub;
use gitpulse_sync::{SyncConfig, SyncExecutor};

use super::{config_path, REPO_DIR};

pub async fn run(path: PathBuf, remote: Option<String>, interval: u64) -> Result<()> {
    let root = std::fs::canonicalize(&path)?;
    let config_file = config_path(&root);

    if config_file.exists() {
        bail!(
            "{} already exists, edit it instead of re-initializing",
            config_file.display()
        );
    }

    let mut config = SyncConfig::new(root.clone(), root.join(REPO_DIR))
        .with_interval_minutes(interval);
    if let Some(url) = remote {
        config = config.with_remote_url(url);
    }

    std::fs::write(&config_file, toml::to_string_pretty(&config)?)?;

    println!("{}", "Initialized gitpulse".bold().cyan());
    println!("   {}: {}", "Tracking".bold(), root.display());
    println!("   {}: {}", "Config".bold(), config_file.display());
    println!("   {}: every {} min", "Checkpoints".bold(), interval);

    match &config.remote_url {
        Some(url) => {
            let executor = SyncExecutor::new(&config, EventHub::new());
            executor.ensure_repository(url).await?;
            println!("   {}: {}", "Remote".bold(), url.green());
        }
        None => {
            println!(
                "   {}: none (checkpoints stay local until one is set)",
                "Remote".bold()
            );
        }
    }

    println!();
    println!("Run {} to begin tracking", "gitpulse start".cyan());

    Ok(())
}
