//! Result uploader
//!
//! Pushes a finished execution summary into runs of the remote TMS. Case ids
//! are resolved through the sync-state document only; the remote is never
//! searched by name.
//!
//! ## Per-file flow
//!
//! 1. Map scenario results to recorded case ids (unmapped ones are skipped)
//! 2. Reuse the first active run of the suite, or create one holding exactly
//!    the mapped cases
//! 3. Upload attachments, then one result per case (best effort)
//! 4. Optionally close the run

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use tmsync_core::config::Config;
use tmsync_core::domain::{
    CaseId, CaseResult, ExecutionSummary, FileEntry, FileResults, RemoteRun, RunId, SuiteId,
};
use tmsync_core::ports::{IStateStore, ITmsBackend, TmsError, TmsResult};

// ============================================================================
// Reports
// ============================================================================

/// Outcome of uploading the results of one artifact
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileUploadReport {
    /// Artifact key
    pub path: String,
    /// False when the artifact has no entry in the state document
    pub synchronized: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suite_id: Option<SuiteId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run: Option<RemoteRun>,
    pub run_created: bool,
    /// Cases whose result was recorded
    pub reported: Vec<CaseId>,
    /// Scenarios without a recorded case
    pub skipped: Vec<String>,
    pub attachments: u32,
    pub closed: bool,
    pub failures: Vec<TmsError>,
}

impl FileUploadReport {
    fn new(path: String) -> Self {
        Self {
            path,
            ..Self::default()
        }
    }

    pub fn is_ok(&self) -> bool {
        self.synchronized && self.failures.is_empty()
    }
}

/// Outcome of one upload invocation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UploadReport {
    pub files: Vec<FileUploadReport>,
}

impl UploadReport {
    pub fn has_errors(&self) -> bool {
        self.files.iter().any(|f| !f.is_ok())
    }
}

/// Outcome of closing the active runs of a suite
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseReport {
    pub suite_id: Option<SuiteId>,
    pub closed: Vec<RunId>,
    pub failures: Vec<TmsError>,
}

// ============================================================================
// ResultUploader
// ============================================================================

/// Pushes execution results and manages runs
pub struct ResultUploader {
    backend: Arc<dyn ITmsBackend>,
    store: Arc<dyn IStateStore>,
    project_id: String,
}

impl ResultUploader {
    pub fn new(backend: Arc<dyn ITmsBackend>, store: Arc<dyn IStateStore>, config: &Config) -> Self {
        Self {
            backend,
            store,
            project_id: config.project.id.clone(),
        }
    }

    /// Uploads every file of `summary`
    ///
    /// # Errors
    /// Only loading the state document fails the whole call; remote
    /// failures are collected per file.
    #[instrument(skip(self, summary), fields(project = %self.project_id, files = summary.files.len()))]
    pub async fn upload(&self, summary: &ExecutionSummary, close_run: bool) -> Result<UploadReport> {
        let state = self
            .store
            .load(&self.project_id)
            .await
            .context("Failed to load sync state")?;

        let mut report = UploadReport::default();
        for file in &summary.files {
            let key = file.artifact_key();
            let file_report = match state.find_entry(&key) {
                Some(entry) => self.upload_file(file, entry, close_run).await,
                None => {
                    warn!(path = %key, "Results for an artifact that was never imported");
                    let mut file_report = FileUploadReport::new(key);
                    file_report.skipped = file.scenarios.iter().map(|s| s.name.clone()).collect();
                    file_report
                }
            };
            report.files.push(file_report);
        }
        Ok(report)
    }

    /// Uploads the results of one artifact into a run of its suite
    pub async fn upload_file(
        &self,
        file: &FileResults,
        entry: &FileEntry,
        close_run: bool,
    ) -> FileUploadReport {
        let mut report = FileUploadReport::new(entry.path.clone());
        report.synchronized = true;
        report.suite_id = Some(entry.suite_id.clone());

        let mut results = Vec::new();
        for scenario in &file.scenarios {
            match entry.case_id(&scenario.name) {
                Some(case_id) => results.push(CaseResult {
                    case_id: case_id.clone(),
                    outcome: scenario.outcome,
                    comment: scenario.comment(),
                    elapsed: scenario.duration(),
                }),
                None => {
                    warn!(path = %entry.path, scenario = %scenario.name, "No case recorded, result skipped");
                    report.skipped.push(scenario.name.clone());
                }
            }
        }

        if results.is_empty() {
            debug!(path = %entry.path, "Nothing to report");
            return report;
        }

        let case_ids: Vec<CaseId> = results.iter().map(|r| r.case_id.clone()).collect();
        let run = match self.resolve_run(entry, &case_ids).await {
            Ok((run, created)) => {
                report.run_created = created;
                run
            }
            Err(err) => {
                warn!(path = %entry.path, error = %err, "No run to report into");
                report.failures.push(err);
                return report;
            }
        };

        for attachment in file.all_attachments() {
            match self.backend.upload_attachment(&run.id, attachment).await {
                Ok(()) => report.attachments += 1,
                Err(err) => {
                    warn!(attachment = %attachment.display(), error = %err, "Attachment upload failed");
                    report.failures.push(err);
                }
            }
        }

        for result in &results {
            match self
                .backend
                .add_results(&run.id, std::slice::from_ref(result))
                .await
            {
                Ok(()) => report.reported.push(result.case_id.clone()),
                Err(err) => {
                    warn!(case_id = %result.case_id, error = %err, "Result upload failed");
                    report.failures.push(err);
                }
            }
        }

        if close_run {
            match self.backend.close_run(&run.id).await {
                Ok(()) => report.closed = true,
                Err(err) => report.failures.push(err),
            }
        }

        info!(
            path = %entry.path,
            run_id = %run.id,
            reported = report.reported.len(),
            skipped = report.skipped.len(),
            failures = report.failures.len(),
            "Results uploaded"
        );
        report.run = Some(run);
        report
    }

    /// Closes every active run of a suite
    ///
    /// # Errors
    /// Fails when the active runs cannot be listed; individual close
    /// failures are collected in the report.
    #[instrument(skip(self))]
    pub async fn close_active_runs(&self, suite_id: &SuiteId) -> Result<CloseReport> {
        let runs = self
            .backend
            .get_active_runs(suite_id)
            .await
            .context("Failed to list active runs")?;

        let mut report = CloseReport {
            suite_id: Some(suite_id.clone()),
            ..CloseReport::default()
        };
        for run in runs {
            match self.backend.close_run(&run.id).await {
                Ok(()) => {
                    info!(run_id = %run.id, "Closed run");
                    report.closed.push(run.id);
                }
                Err(err) => {
                    warn!(run_id = %run.id, error = %err, "Failed to close run");
                    report.failures.push(err);
                }
            }
        }
        Ok(report)
    }

    async fn resolve_run(
        &self,
        entry: &FileEntry,
        case_ids: &[CaseId],
    ) -> TmsResult<(RemoteRun, bool)> {
        let active = self.backend.get_active_runs(&entry.suite_id).await?;
        if let Some(run) = active.into_iter().next() {
            debug!(run_id = %run.id, "Reusing active run");
            return Ok((run, false));
        }

        let run = self
            .backend
            .create_run(&entry.suite_id, &entry.suite_name, case_ids)
            .await?;
        info!(run_id = %run.id, cases = case_ids.len(), "Created run");
        Ok((run, true))
    }
}
