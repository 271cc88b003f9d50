//! Runs command - Manage remote runs
//!
//! `tmsync runs close <SUITE_ID>` completes every active run of a suite.

use std::process::ExitCode;

use anyhow::Result;
use clap::Subcommand;

use tmsync_core::domain::SuiteId;
use tmsync_sync::ResultUploader;

use super::{exit_status, CommandContext};
use crate::output::{counted, remote_failure};

#[derive(Debug, Subcommand)]
pub enum RunsCommand {
    /// Close all active runs of a suite
    Close {
        /// Remote suite id (TestRail suite, Azure test plan, Jira test plan key)
        suite_id: String,
    },
}

impl RunsCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<ExitCode> {
        match self {
            RunsCommand::Close { suite_id } => close(ctx, suite_id).await,
        }
    }
}

async fn close(ctx: &CommandContext, suite_id: &str) -> Result<ExitCode> {
    let formatter = ctx.formatter();
    let suite_id = SuiteId::new(suite_id)?;

    let uploader = ResultUploader::new(ctx.backend()?, ctx.state_store(), &ctx.config);
    let report = uploader.close_active_runs(&suite_id).await?;

    if ctx.is_json() {
        formatter.print_json(&serde_json::json!({
            "suiteId": report.suite_id,
            "closed": report.closed,
            "failures": report.failures,
            "success": report.failures.is_empty(),
        }));
    } else {
        if report.closed.is_empty() && report.failures.is_empty() {
            formatter.success(&format!("Suite {suite_id} has no active runs"));
        } else if !report.closed.is_empty() {
            formatter.success(&format!(
                "Closed {} of suite {suite_id}",
                counted(report.closed.len(), "run")
            ));
            for run in &report.closed {
                formatter.info(&format!("run {run}"));
            }
        }
        for failure in &report.failures {
            remote_failure(&*formatter, &format!("suite {suite_id}"), failure);
        }
    }

    Ok(exit_status(report.failures.is_empty()))
}
