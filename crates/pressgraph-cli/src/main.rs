use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pressgraph_core::AppConfig;

mod commands;

#[derive(Parser)]
#[command(name = "pressgraph")]
#[command(author, version, about = "Publishes press-release feeds to Telegraph and Telegram")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override the done-log file location
    #[arg(long)]
    state_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Process all configured channels once
    Run,
    /// List the channels the current environment configures
    Channels,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();

    let mut config = AppConfig::from_env()?;
    if let Some(state_file) = cli.state_file {
        config.state_file = state_file;
    }

    match cli.command {
        Some(Commands::Run) | None => commands::run::run(&config).await,
        Some(Commands::Channels) => commands::channels::run(&config),
    }
}
