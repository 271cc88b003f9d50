//! Status command - Display the synchronization state
//!
//! Provides the `tmsync status` CLI command which:
//! 1. Lists every synchronized artifact with its suite and case count
//! 2. Shows the scenario/case mapping of one artifact when a file is given
//!
//! Only the local state document is read; the backend is never contacted.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use tmsync_core::domain::{artifact_key, FileEntry};
use tmsync_core::ports::IStateStore;
use tmsync_local::plan_key;

use super::CommandContext;
use crate::output::{counted, OutputFormatter};

#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Show the case mapping of this plan file
    pub file: Option<PathBuf>,

    /// Subplan of the given file
    #[arg(long, requires = "file")]
    pub subplan: Option<String>,
}

impl StatusCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<ExitCode> {
        let formatter = ctx.formatter();
        let store = ctx.state_store();
        let state = store
            .load(&ctx.config.project.id)
            .await
            .context("Failed to load sync state")?;

        info!(
            project = %state.project_id,
            state_file = %ctx.config.state_file().display(),
            "Showing status"
        );

        match &self.file {
            Some(file) => {
                let key = artifact_key(&plan_key(file), self.subplan.as_deref());
                match state.find_entry(&key) {
                    Some(entry) => show_entry(ctx, entry, &*formatter),
                    None => {
                        formatter.error(&format!("{key} has not been imported"));
                        return Ok(ExitCode::FAILURE);
                    }
                }
            }
            None if ctx.is_json() => {
                formatter.print_json(&serde_json::to_value(&state)?);
            }
            None => {
                formatter.success(&format!(
                    "Project '{}': {}",
                    state.project_id,
                    counted(state.files.len(), "synchronized file")
                ));
                formatter.info(&format!("State: {}", ctx.config.state_file().display()));
                for entry in &state.files {
                    formatter.info(&format!(
                        "{}  suite {}  {}",
                        entry.path,
                        entry.suite_id,
                        counted(entry.scenarios.len(), "case")
                    ));
                }
            }
        }

        Ok(ExitCode::SUCCESS)
    }
}

fn show_entry(ctx: &CommandContext, entry: &FileEntry, formatter: &dyn OutputFormatter) {
    if ctx.is_json() {
        formatter.print_json(&serde_json::json!(entry));
        return;
    }

    formatter.success(&format!("{} -> suite {} ({})", entry.path, entry.suite_id, entry.suite_name));
    if let Some(url) = &entry.suite_url {
        formatter.info(&format!("url: {url}"));
    }
    if let Some(section) = &entry.section_id {
        formatter.info(&format!("section: {section}"));
    }
    for scenario in &entry.scenarios {
        let marker = match entry.fingerprint(&scenario.name) {
            Some(fp) if fp.is_known() => "",
            _ => "  (will be updated on next import)",
        };
        formatter.info(&format!("{}  case {}{marker}", scenario.name, scenario.case_id));
    }
}
