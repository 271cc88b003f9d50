//! Config command - View and manage the tmsync configuration
//!
//! Provides the `tmsync config` CLI command which:
//! 1. Shows the effective configuration (YAML or JSON)
//! 2. Validates the configuration file and reports errors
//! 3. Writes a default configuration file to start from

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Subcommand;
use tracing::info;

use tmsync_core::config::Config;

use super::exit_status;
use crate::output::{counted, get_formatter, OutputFormat};

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display the effective configuration
    Show,
    /// Validate the configuration file
    Validate,
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

impl ConfigCommand {
    pub async fn execute(
        &self,
        config_path: &Path,
        format: OutputFormat,
        quiet: bool,
    ) -> Result<ExitCode> {
        match self {
            ConfigCommand::Show => execute_show(config_path, format, quiet),
            ConfigCommand::Validate => execute_validate(config_path, format, quiet),
            ConfigCommand::Init { force } => execute_init(config_path, *force, format, quiet),
        }
    }
}

fn execute_show(config_path: &Path, format: OutputFormat, quiet: bool) -> Result<ExitCode> {
    let formatter = get_formatter(format, quiet);
    let config = if config_path.exists() {
        Config::load(config_path)?
    } else {
        Config::default()
    };

    info!(config_path = %config_path.display(), "Showing configuration");

    if format == OutputFormat::Json {
        let json =
            serde_json::to_value(&config).context("Failed to serialize configuration to JSON")?;
        formatter.print_json(&json);
    } else {
        formatter.success(&format!("Configuration ({})", config_path.display()));
        let yaml =
            serde_yaml::to_string(&config).context("Failed to serialize configuration to YAML")?;
        for line in yaml.lines() {
            formatter.info(line);
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn execute_validate(config_path: &Path, format: OutputFormat, quiet: bool) -> Result<ExitCode> {
    let formatter = get_formatter(format, quiet);
    let json = format == OutputFormat::Json;

    if !config_path.exists() {
        let message = format!("Configuration file not found at {}", config_path.display());
        if json {
            formatter.print_json(&serde_json::json!({
                "valid": false,
                "configPath": config_path.display().to_string(),
                "errors": [message],
            }));
        } else {
            formatter.error(&message);
            formatter.info("Run 'tmsync config init' to create one.");
        }
        return Ok(ExitCode::FAILURE);
    }

    let config = match Config::load(config_path) {
        Ok(config) => config,
        Err(e) => {
            if json {
                formatter.print_json(&serde_json::json!({
                    "valid": false,
                    "configPath": config_path.display().to_string(),
                    "errors": [format!("{e:#}")],
                }));
            } else {
                formatter.error(&format!("{e:#}"));
            }
            return Ok(ExitCode::FAILURE);
        }
    };

    info!(config_path = %config_path.display(), "Validating configuration");
    let errors = config.validate();

    if json {
        let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
        formatter.print_json(&serde_json::json!({
            "valid": errors.is_empty(),
            "configPath": config_path.display().to_string(),
            "errors": messages,
        }));
    } else if errors.is_empty() {
        formatter.success("Configuration is valid");
        formatter.info(&format!("File: {}", config_path.display()));
    } else {
        formatter.error(&format!(
            "Configuration has {}:",
            counted(errors.len(), "error")
        ));
        formatter.info(&format!("File: {}", config_path.display()));
        for error in &errors {
            formatter.info(&format!("  {} - {}", error.field, error.message));
        }
    }

    Ok(exit_status(errors.is_empty()))
}

fn execute_init(
    config_path: &Path,
    force: bool,
    format: OutputFormat,
    quiet: bool,
) -> Result<ExitCode> {
    let formatter = get_formatter(format, quiet);

    if config_path.exists() && !force {
        formatter.error(&format!(
            "{} already exists (use --force to overwrite)",
            config_path.display()
        ));
        return Ok(ExitCode::FAILURE);
    }

    Config::default().save(config_path)?;
    info!(config_path = %config_path.display(), "Wrote default configuration");

    if format == OutputFormat::Json {
        formatter.print_json(&serde_json::json!({
            "success": true,
            "configPath": config_path.display().to_string(),
        }));
    } else {
        formatter.success(&format!("Wrote {}", config_path.display()));
        formatter.info("Set project.id and the backend section before importing.");
    }
    Ok(ExitCode::SUCCESS)
}
