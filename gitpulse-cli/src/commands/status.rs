use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use colored::Colorize;
use tokio::sync::Semaphore;

use gitpulse_sync::git::GitRepo;

use super::load_config;

pub async fn run(path: PathBuf) -> Result<()> {
    let root = std::fs::canonicalize(&path)?;
    let config = load_config(&root, None)?;

    println!("{}", "Checkpoint Status".bold().cyan());
    println!("  {}: {}", "Tracking".bold(), config.project_root.display());
    println!("  {}: {}", "Repository".bold(), config.repo_root.display());
    println!(
        "  {}: every {} min on {}",
        "Checkpoints".bold(),
        config.interval_minutes,
        config.branch.cyan()
    );
    match &config.remote_url {
        Some(url) => println!("  {}: {}", "Remote".bold(), url.green()),
        None => println!("  {}: {}", "Remote".bold(), "none (local only)".yellow()),
    }
    println!();

    let repo = GitRepo::new(
        config.repo_root.clone(),
        config.branch.clone(),
        Arc::new(Semaphore::new(config.process_limit.max(1))),
    );

    if !repo.is_initialized() {
        println!("{}", "No checkpoint repository yet".red());
        println!("Run {} to create one", "gitpulse start".cyan());
        return Ok(());
    }

    match repo.head_summary().await {
        Ok(summary) => {
            println!("{} {}", "Latest checkpoint:".bold(), summary);
        }
        Err(_) => {
            println!("{}", "Repository exists but has no checkpoints yet".yellow());
        }
    }

    Ok(())
}
