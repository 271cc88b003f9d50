//! Upload command - Push an execution summary into runs
//!
//! `tmsync upload-results <OUTPUT_DIR>` reads the summary file from the output
//! directory, maps every scenario result to its recorded case and reports it
//! into the active run of the suite (creating one when none is open).

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Args;

use tmsync_core::ports::ISummarySource;
use tmsync_local::JsonSummaryReader;
use tmsync_sync::{ResultUploader, UploadReport};

use super::{exit_status, CommandContext};
use crate::output::{counted, failure_summary, remote_failure, OutputFormatter};

#[derive(Debug, Args)]
pub struct UploadResultsCommand {
    /// Directory the test run wrote its summary and attachments to
    pub output_dir: PathBuf,

    /// Close the run after the results were uploaded
    #[arg(long)]
    pub close_run: bool,
}

impl UploadResultsCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<ExitCode> {
        let formatter = ctx.formatter();

        let reader = JsonSummaryReader::new(&ctx.config.results.summary_file);
        let summary = reader.read(&self.output_dir).await?;

        let uploader = ResultUploader::new(ctx.backend()?, ctx.state_store(), &ctx.config);
        let close_run = self.close_run || ctx.config.results.close_run;
        let report = uploader.upload(&summary, close_run).await?;

        print_report(ctx, &report, &*formatter);
        Ok(exit_status(!report.has_errors()))
    }
}

fn print_report(ctx: &CommandContext, report: &UploadReport, formatter: &dyn OutputFormatter) {
    if ctx.is_json() {
        formatter.print_json(&serde_json::json!({
            "files": report.files,
            "success": !report.has_errors(),
        }));
        return;
    }

    if report.files.is_empty() {
        formatter.success("Summary contains no results");
        return;
    }

    for file in &report.files {
        if !file.synchronized {
            formatter.error(&format!(
                "{}: never imported, {} skipped (run 'tmsync import' first)",
                file.path,
                counted(file.skipped.len(), "result")
            ));
            continue;
        }

        let Some(run) = &file.run else {
            if file.failures.is_empty() {
                formatter.warn(&format!("{}: no result maps to a synchronized case", file.path));
            }
            for failure in &file.failures {
                remote_failure(formatter, &file.path, failure);
            }
            continue;
        };

        let verb = if file.run_created { "created" } else { "reused" };
        formatter.success(&format!(
            "{}: {} reported to run {} ({verb})",
            file.path,
            counted(file.reported.len(), "result"),
            run.id
        ));
        if let Some(url) = &run.url {
            formatter.info(&format!("run: {url}"));
        }
        if file.attachments > 0 {
            formatter.info(&format!(
                "{} uploaded",
                counted(file.attachments as usize, "attachment")
            ));
        }
        if file.closed {
            formatter.info("run closed");
        }
        for name in &file.skipped {
            formatter.warn(&format!("{}: '{name}' has no recorded case, skipped", file.path));
        }
        for failure in &file.failures {
            remote_failure(formatter, &file.path, failure);
        }
    }

    let failed = report.files.iter().filter(|f| !f.is_ok()).count();
    failure_summary(formatter, failed, report.files.len(), "file");
}
