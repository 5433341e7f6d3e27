// ABOUTME: CLI entry point for fairing-replicator
// ABOUTME: Parses commands, initializes logging on stderr and routes to handlers

use clap::{Parser, Subcommand};
use fairing_replicator::commands;
use fairing_replicator::replication::ReplicationState;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "fairing-replicator")]
#[command(about = "Incremental replication of Fairing survey responses", long_about = None)]
#[command(version)]
struct Cli {
    /// Set the log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    log: String,
    /// Fairing API token (overrides secret_token in the config file)
    #[arg(
        long = "secret-token",
        env = "FAIRING_SECRET_TOKEN",
        global = true,
        hide_env_values = true
    )]
    secret_token: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replicate new survey responses since the last checkpoint
    ///
    /// Without a checkpoint the first run searches for the oldest responses
    /// after start_date; later runs resume after the last emitted response.
    Sync {
        /// Path to the JSON or TOML tap configuration
        #[arg(long)]
        config: PathBuf,
        /// Path to the replication state file
        #[arg(long)]
        state: Option<PathBuf>,
    },
    /// Export all survey questions
    Questions {
        /// Path to the JSON or TOML tap configuration
        #[arg(long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    // 1. RUST_LOG environment variable has highest precedence
    // 2. --log flag is used if RUST_LOG is not set
    // stdout carries records, so logs go to stderr
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(cli.log.clone()));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Sync { config, state } => {
            let opts = commands::sync::SyncOptions {
                config_path: config,
                state_path: state.unwrap_or_else(ReplicationState::default_path),
                secret_token: cli.secret_token,
            };
            commands::sync::run(opts, std::io::stdout().lock()).await?;
        }
        Commands::Questions { config } => {
            let opts = commands::questions::QuestionsOptions {
                config_path: config,
                secret_token: cli.secret_token,
            };
            commands::questions::run(opts, std::io::stdout().lock()).await?;
        }
    }

    Ok(())
}
