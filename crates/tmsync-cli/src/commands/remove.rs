//! Remove command - Delete the remote cases of a plan file
//!
//! `tmsync remove <FILE>` deletes every recorded case of the artifact and
//! drops it from the sync state. Cases whose deletion failed stay recorded,
//! so the command can simply be re-run.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Args;

use tmsync_core::domain::artifact_key;
use tmsync_local::plan_key;
use tmsync_sync::Synchronizer;

use super::{exit_status, CommandContext};
use crate::output::{counted, remote_failure};

#[derive(Debug, Args)]
pub struct RemoveCommand {
    /// Plan file as it was imported
    pub file: PathBuf,

    /// Remove the import of this subplan instead of the whole file
    #[arg(long)]
    pub subplan: Option<String>,
}

impl RemoveCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<ExitCode> {
        let formatter = ctx.formatter();
        let key = artifact_key(&plan_key(&self.file), self.subplan.as_deref());

        let sync = Synchronizer::new(ctx.backend()?, ctx.state_store(), &ctx.config);
        let report = sync.remove(&key).await?;

        if ctx.is_json() {
            formatter.print_json(&serde_json::json!({
                "removal": report,
                "success": report.failed.is_empty(),
            }));
        } else {
            if report.entry_removed {
                formatter.success(&format!(
                    "{key}: removed, {} deleted",
                    counted(report.deleted.len(), "case")
                ));
            } else {
                formatter.error(&format!(
                    "{key}: {} could not be deleted, run the command again",
                    counted(report.failed.len(), "case")
                ));
            }
            for failure in &report.failed {
                remote_failure(&*formatter, &key, failure);
            }
        }

        Ok(exit_status(report.entry_removed))
    }
}
