use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use agentwatch::GroupLayout;

mod cli;

#[derive(Parser)]
#[command(name = "agentwatch")]
#[command(about = "Supervise AI coding CLIs and get notified when they wait for you")]
#[command(version)]
struct Cli {
    /// Path to the config file (defaults to ~/.agentwatch/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start agent sessions in the given directories and watch them
    Watch {
        /// Working directories, one session each (defaults to the current directory)
        paths: Vec<PathBuf>,

        /// Layout hint for a multi-session group
        #[arg(long, default_value = "tabs")]
        layout: GroupLayout,

        /// Send stdin to every session of the group
        #[arg(long)]
        broadcast: bool,
    },

    /// Forward a hook payload from stdin to the running watcher
    Hook,

    /// Write a default ~/.agentwatch/config.toml
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    match cli.command {
        Commands::Watch {
            paths,
            layout,
            broadcast,
        } => {
            cli::watch::watch_command(cli.config.as_deref(), paths, layout, broadcast).await?;
        }
        Commands::Hook => {
            cli::hook::hook_command(cli.config.as_deref()).await;
        }
        Commands::Init { force } => {
            cli::init::init_command(cli.config, force)?;
        }
    }

    Ok(())
}
