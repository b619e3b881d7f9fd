//! Syncward CLI - Command-line interface for Syncward
//!
//! Provides commands for:
//! - Managing sync sessions and their triggers
//! - Running a session immediately
//! - Pausing and resuming sessions
//! - Browsing rsync daemons
//! - Viewing the sync log and configuration

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use syncward_core::config::Config;
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{
    config::ConfigCommand,
    logs::LogsCommand,
    pause::{PauseCommand, ResumeCommand},
    remote::RemoteCommand,
    sessions::SessionsCommand,
    sync::SyncCommand,
    CliContext,
};
use output::{get_formatter, OutputFormat};

#[derive(Debug, Parser)]
#[command(name = "syncward", version, about = "Trigger-driven rsync synchronization")]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Manage sync sessions
    #[command(subcommand)]
    Sessions(SessionsCommand),
    /// Sync a session now
    Sync(SyncCommand),
    /// Pause trigger-initiated syncs of a session
    Pause(PauseCommand),
    /// Resume a paused session
    Resume(ResumeCommand),
    /// Browse an rsync daemon
    #[command(subcommand)]
    Remote(RemoteCommand),
    /// View the sync log
    Logs(LogsCommand),
    /// View and manage configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Diagnostics go to stderr so JSON output stays parseable
    let filter = match cli.verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };
    let ctx = CliContext {
        format,
        config_path: cli.config.unwrap_or_else(Config::default_path),
    };

    if let Err(e) = run(cli.command, &ctx).await {
        get_formatter(format).error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run(command: Commands, ctx: &CliContext) -> Result<()> {
    match command {
        Commands::Sessions(cmd) => cmd.execute(ctx).await,
        Commands::Sync(cmd) => cmd.execute(ctx).await,
        Commands::Pause(cmd) => cmd.execute(ctx).await,
        Commands::Resume(cmd) => cmd.execute(ctx).await,
        Commands::Remote(cmd) => cmd.execute(ctx).await,
        Commands::Logs(cmd) => cmd.execute(ctx).await,
        Commands::Config(cmd) => cmd.execute(ctx).await,
    }
}
