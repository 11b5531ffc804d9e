use std::path::PathBuf;

use anyhow::Result;
use colored::Colorize;

use gitpulse_core::SyncEvent;
use gitpulse_sync::SyncService;

use super::load_config;

pub async fn run(path: PathBuf, config: Option<PathBuf>) -> Result<()> {
    let root = std::fs::canonicalize(&path)?;
    let config = load_config(&root, config)?;

    println!("{}", "Starting gitpulse...".bold().cyan());
    println!("   {}: {}", "Watching".bold(), config.project_root.display());
    println!("   {}: {}", "Repository".bold(), config.repo_root.display());
    println!(
        "   {}: every {} min",
        "Checkpoints".bold(),
        config.interval_minutes
    );
    match &config.remote_url {
        Some(url) => println!("   {}: {}", "Remote".bold(), url.green()),
        None => println!("   {}: {}", "Remote".bold(), "none (local only)".yellow()),
    }
    println!();
    println!("{}", "Press Ctrl+C to stop".dimmed());
    println!();

    let mut service = SyncService::new(config);
    if service.config().remote_url.is_some() {
        service.ensure_repository().await?;
    }

    let mut events = service.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                SyncEvent::Commit { message } => {
                    println!("{} {}", "✓".green(), message);
                }
                SyncEvent::Push { branch } => {
                    println!("{} pushed {}", "↑".green(), branch.cyan());
                }
                SyncEvent::Error { message } => {
                    println!("{} {}", "✗".red(), message.red());
                }
                SyncEvent::OperationStart { .. } | SyncEvent::OperationEnd { .. } => {}
            }
        }
    });

    service.watch()?;
    service.start();

    tokio::signal::ctrl_c().await?;
    println!();
    println!("{}", "Stopping...".dimmed());
    service.shutdown();

    Ok(())
}
