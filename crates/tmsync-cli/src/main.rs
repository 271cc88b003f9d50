//! tmsync CLI - Command-line interface for tmsync
//!
//! Provides commands for:
//! - Importing plan files into the remote test management system
//! - Uploading execution results and closing runs
//! - Removing synchronized artifacts
//! - Inspecting the sync state and the configuration

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tmsync_core::config::Config;

mod commands;
mod output;

use commands::{
    completions::CompletionsCommand, config::ConfigCommand, import::ImportCommand,
    remove::RemoveCommand, runs::RunsCommand, status::StatusCommand,
    upload::UploadResultsCommand, CommandContext,
};
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(
    name = "tmsync",
    version,
    about = "Synchronize local test plans with TestRail, Azure DevOps and Jira"
)]
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

    /// Minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Push plan files to the remote suites
    Import(ImportCommand),
    /// Upload an execution summary into runs
    UploadResults(UploadResultsCommand),
    /// Manage remote runs
    #[command(subcommand)]
    Runs(RunsCommand),
    /// Delete the remote cases of a plan file and forget it
    Remove(RemoveCommand),
    /// Show the synchronization state
    Status(StatusCommand),
    /// View and manage configuration
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Generate shell completions
    Completions(CompletionsCommand),
}

/// Reads the config file; a missing file means defaults
fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        Config::load(path)
    } else {
        Ok(Config::default())
    }
}

fn init_tracing(verbose: u8, quiet: bool, json: bool, configured: &str) {
    let filter = match (verbose, quiet) {
        (0, true) => "error",
        (0, false) => configured,
        (1, _) => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };
    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);

    // Config commands inspect the file themselves, even when it is broken
    let loaded = load_config(&config_path);
    let level = loaded
        .as_ref()
        .map(|c| c.logging.level.clone())
        .unwrap_or_else(|_| "info".to_string());
    init_tracing(cli.verbose, cli.quiet, cli.json, &level);

    let result = match cli.command {
        Commands::Config(cmd) => cmd.execute(&config_path, format, cli.quiet).await,
        Commands::Completions(cmd) => cmd.execute(format).await,
        command => match loaded {
            Ok(config) => {
                let ctx = CommandContext {
                    config,
                    config_path,
                    format,
                    quiet: cli.quiet,
                };
                run(command, &ctx).await
            }
            Err(e) => Err(e),
        },
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            output::get_formatter(format, cli.quiet).error(&format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands, ctx: &CommandContext) -> Result<ExitCode> {
    match command {
        Commands::Import(cmd) => cmd.execute(ctx).await,
        Commands::UploadResults(cmd) => cmd.execute(ctx).await,
        Commands::Runs(cmd) => cmd.execute(ctx).await,
        Commands::Remove(cmd) => cmd.execute(ctx).await,
        Commands::Status(cmd) => cmd.execute(ctx).await,
        Commands::Config(_) | Commands::Completions(_) => Ok(ExitCode::SUCCESS),
    }
}
