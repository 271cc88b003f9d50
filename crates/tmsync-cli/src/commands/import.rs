//! Import command - Push plan files to the remote TMS
//!
//! Provides the `tmsync import` CLI command which:
//! 1. Parses every plan file (a file that fails to parse is reported and skipped)
//! 2. Builds the configured backend and the state store
//! 3. Runs the Synchronizer over the parsed artifacts and saves the state once
//! 4. Prints a per-artifact summary; any failure yields a non-zero exit status

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use tracing::warn;

use tmsync_core::domain::TestArtifact;
use tmsync_core::ports::{IArtifactParser, IStateStore};
use tmsync_local::YamlPlanParser;
use tmsync_sync::{plan_artifact, ArtifactPlan, ImportReport, Synchronizer};

use super::{exit_status, CommandContext};
use crate::output::{counted, failure_summary, remote_failure, OutputFormatter};

#[derive(Debug, Args)]
pub struct ImportCommand {
    /// Plan files to synchronize
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Only synchronize the named subplan of each file
    #[arg(long)]
    pub subplan: Option<String>,

    /// Show what would be done without calling the backend
    #[arg(long)]
    pub dry_run: bool,
}

impl ImportCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<ExitCode> {
        let formatter = ctx.formatter();

        let parser = YamlPlanParser::new();
        let mut artifacts: Vec<TestArtifact> = Vec::new();
        let mut parse_errors: Vec<(String, String)> = Vec::new();
        for file in &self.files {
            match parser.parse(file, self.subplan.as_deref()).await {
                Ok(artifact) => artifacts.push(artifact),
                Err(e) => {
                    warn!(path = %file.display(), error = %e, "Skipping plan file");
                    parse_errors.push((file.display().to_string(), format!("{e:#}")));
                }
            }
        }

        let ok = if self.dry_run {
            self.dry_run(ctx, &artifacts, &parse_errors, &*formatter)
                .await?
        } else {
            let sync = Synchronizer::new(ctx.backend()?, ctx.state_store(), &ctx.config)
                .with_user(ctx.origin_user());
            let report = sync.import_all(&artifacts).await?;
            print_report(ctx, &report, &parse_errors, &*formatter);
            !report.has_errors()
        };

        Ok(exit_status(ok && parse_errors.is_empty()))
    }

    async fn dry_run(
        &self,
        ctx: &CommandContext,
        artifacts: &[TestArtifact],
        parse_errors: &[(String, String)],
        formatter: &dyn OutputFormatter,
    ) -> Result<bool> {
        let state = ctx
            .state_store()
            .load(&ctx.config.project.id)
            .await
            .context("Failed to load sync state")?;
        let prune = ctx.config.sync.prune_removed_scenarios;
        let plans: Vec<ArtifactPlan> = artifacts
            .iter()
            .map(|a| plan_artifact(state.find_entry(&a.path), a, prune))
            .collect();

        if ctx.is_json() {
            formatter.print_json(&serde_json::json!({
                "dryRun": true,
                "artifacts": plans,
                "parseErrors": parse_errors_json(parse_errors),
            }));
            return Ok(true);
        }

        formatter.info("Dry run mode - no changes will be made");
        for plan in &plans {
            if plan.is_noop() {
                formatter.success(&format!("{}: up to date", plan.path));
                continue;
            }
            formatter.success(&format!("{}:", plan.path));
            if plan.create_suite {
                formatter.info("create suite");
            }
            if plan.update_suite {
                formatter.info("update suite description");
            }
            if plan.create_section {
                formatter.info("create section");
            }
            for name in &plan.create {
                formatter.info(&format!("create case  {name}"));
            }
            for name in &plan.update {
                formatter.info(&format!("update case  {name}"));
            }
            for name in &plan.removed {
                let action = if plan.prune { "delete case" } else { "orphan case" };
                formatter.info(&format!("{action}  {name}"));
            }
            if plan.reorder {
                formatter.info("reorder cases");
            }
        }
        for (path, error) in parse_errors {
            formatter.error(&format!("{path}: {error}"));
        }
        Ok(true)
    }
}

fn parse_errors_json(parse_errors: &[(String, String)]) -> serde_json::Value {
    parse_errors
        .iter()
        .map(|(path, error)| serde_json::json!({ "path": path, "error": error }))
        .collect()
}

fn print_report(
    ctx: &CommandContext,
    report: &ImportReport,
    parse_errors: &[(String, String)],
    formatter: &dyn OutputFormatter,
) {
    if ctx.is_json() {
        formatter.print_json(&serde_json::json!({
            "artifacts": report.artifacts,
            "parseErrors": parse_errors_json(parse_errors),
            "success": !report.has_errors() && parse_errors.is_empty(),
        }));
        return;
    }

    for artifact in &report.artifacts {
        let counts = format!(
            "{} created, {} updated, {} unchanged",
            artifact.created, artifact.updated, artifact.unchanged
        );
        match &artifact.error {
            None => formatter.success(&format!("{}: {counts}", artifact.path)),
            Some(err) => {
                remote_failure(formatter, &artifact.path, err);
                formatter.info(&format!("completed before the failure: {counts}"));
            }
        }
        if let Some(url) = &artifact.suite_url {
            formatter.info(&format!("suite: {url}"));
        }
        if artifact.deleted > 0 {
            formatter.info(&format!(
                "deleted {}",
                counted(artifact.deleted as usize, "removed case")
            ));
        }
        if artifact.orphaned > 0 {
            formatter.warn(&format!(
                "{}: {} left on the remote (enable sync.prune_removed_scenarios to delete)",
                artifact.path,
                counted(artifact.orphaned as usize, "removed scenario")
            ));
        }
        if artifact.reordered {
            formatter.info("cases reordered");
        }
    }

    for (path, error) in parse_errors {
        formatter.error(&format!("{path}: {error}"));
    }

    failure_summary(
        formatter,
        report.failures().count() + parse_errors.len(),
        report.artifacts.len() + parse_errors.len(),
        "file",
    );
}
