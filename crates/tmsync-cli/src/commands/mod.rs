//! CLI subcommands and the wiring they share

pub mod completions;
pub mod config;
pub mod import;
pub mod remove;
pub mod runs;
pub mod status;
pub mod upload;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Result};
use tracing::info;

use tmsync_core::config::Config;
use tmsync_core::ports::ITmsBackend;
use tmsync_local::JsonStateStore;

use crate::output::{get_formatter, OutputFormat, OutputFormatter};

/// Settings shared by every command that works on a project
pub struct CommandContext {
    pub config: Config,
    pub config_path: PathBuf,
    pub format: OutputFormat,
    pub quiet: bool,
}

impl CommandContext {
    pub fn formatter(&self) -> Box<dyn OutputFormatter> {
        get_formatter(self.format, self.quiet)
    }

    pub fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }

    pub fn state_store(&self) -> Arc<JsonStateStore> {
        Arc::new(JsonStateStore::new(&self.config.sync.state_dir))
    }

    /// Validates the configuration and builds the configured backend
    pub fn backend(&self) -> Result<Arc<dyn ITmsBackend>> {
        let errors = self.config.validate();
        if !errors.is_empty() {
            let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            bail!(
                "invalid configuration {}: {}",
                self.config_path.display(),
                messages.join("; ")
            );
        }
        info!(config_path = %self.config_path.display(), "Loaded configuration");
        tmsync_backends::create_backend(&self.config.backend)
    }

    /// Local user named in the origin stamp of created cases
    pub fn origin_user(&self) -> String {
        std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .ok()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| self.config.backend.user.clone())
    }
}

pub fn exit_status(ok: bool) -> ExitCode {
    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
