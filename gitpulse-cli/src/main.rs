use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

use commands::{init, start, status};

#[derive(Parser)]
#[command(name = "gitpulse")]
#[command(version, about = "Scheduled git checkpointing for working directories", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a gitpulse.toml and bootstrap the checkpoint repository
    Init {
        /// Directory to track (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Remote the checkpoint repository pushes to
        #[arg(short, long)]
        remote: Option<String>,

        /// Minutes between scheduled checkpoints
        #[arg(short, long, default_value = "5")]
        interval: u64,
    },

    /// Watch a directory and checkpoint it on a timer
    Start {
        /// Directory to track (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Config file (defaults to gitpulse.toml in the tracked directory)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Show checkpoint configuration and repository state
    Status {
        /// Directory to inspect (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init {
            path,
            remote,
            interval,
        } => {
            init::run(path, remote, interval).await?;
        }
        Commands::Start { path, config } => {
            start::run(path, config).await?;
        }
        Commands::Status { path } => {
            status::run(path).await?;
        }
    }

    Ok(())
}
