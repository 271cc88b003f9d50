//! TestRailBackend - ITmsBackend implementation for the TestRail API v2
//!
//! TestRail maps one-to-one onto the port: suites, sections and cases are
//! native concepts, and runs can be restricted to an explicit case list.
//!
//! ## Design Notes
//!
//! - All endpoints live under `index.php?/api/v2/`, so the endpoint and its
//!   parameters travel in the query string rather than the path.
//! - Every write is a `POST` with a JSON body, deletes included.
//! - Numeric ids are sent as JSON numbers; TestRail rejects quoted ids in
//!   some endpoints.
//! - Reordering re-appends the cases to their section in the given order
//!   with `move_cases_to_section`.

use std::path::Path;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use tmsync_core::domain::{
    BackendKind, CaseContainer, CaseDraft, CaseId, CaseResult, Outcome, RemoteRun, RemoteSuite,
    RunId, SectionId, SuiteId,
};
use tmsync_core::ports::{ITmsBackend, TmsError, TmsResult};

use crate::http::HttpClient;
use crate::{read_attachment, remote_id};

/// API prefix appended to the instance URL
const API_PREFIX: &str = "/index.php?/api/v2/";

/// Template with separated steps ("Test Case (Steps)")
const STEPS_TEMPLATE_ID: u32 = 2;

// ============================================================================
// TestRail API response types
// ============================================================================

#[derive(Debug, Deserialize)]
struct SuiteResponse {
    id: u64,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IdResponse {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct RunResponse {
    id: u64,
    name: String,
    #[serde(default)]
    is_completed: bool,
    url: Option<String>,
}

impl RunResponse {
    fn into_remote(self, operation: &str) -> TmsResult<RemoteRun> {
        Ok(RemoteRun {
            id: remote_id(operation, self.id)?,
            name: self.name,
            is_completed: self.is_completed,
            url: self.url,
        })
    }
}

/// `get_runs` answers with a bare array on older instances and with a
/// paginated envelope since TestRail 6.7
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RunsResponse {
    Bare(Vec<RunResponse>),
    Paginated { runs: Vec<RunResponse> },
}

impl RunsResponse {
    fn into_runs(self) -> Vec<RunResponse> {
        match self {
            Self::Bare(runs) | Self::Paginated { runs } => runs,
        }
    }
}

// ============================================================================
// TestRailBackend
// ============================================================================

/// Adapter for a TestRail instance
pub struct TestRailBackend {
    http: HttpClient,
    project_id: String,
}

impl TestRailBackend {
    /// Creates a backend for one TestRail project
    ///
    /// # Arguments
    /// * `http` - Client whose base URL is the TestRail instance URL
    /// * `project_id` - Numeric TestRail project id
    pub fn new(http: HttpClient, project_id: impl Into<String>) -> Self {
        Self {
            http,
            project_id: project_id.into(),
        }
    }

    fn api(&self, method: Method, endpoint: &str) -> reqwest::RequestBuilder {
        self.http.request(method, &format!("{API_PREFIX}{endpoint}"))
    }

    fn post(&self, endpoint: &str, body: &Value) -> reqwest::RequestBuilder {
        self.api(Method::POST, endpoint).json(body)
    }
}

/// Status ids of the built-in TestRail statuses
fn status_id(outcome: Outcome) -> u32 {
    match outcome {
        Outcome::Passed => 1,
        Outcome::Failed => 5,
        Outcome::Skipped => 4,
    }
}

/// TestRail timespan notation ("1m 5s"); `None` below one second
fn timespan(elapsed: Duration) -> Option<String> {
    let secs = elapsed.as_secs();
    match (secs / 60, secs % 60) {
        (0, 0) => None,
        (0, s) => Some(format!("{s}s")),
        (m, 0) => Some(format!("{m}m")),
        (m, s) => Some(format!("{m}m {s}s")),
    }
}

/// Numeric ids as JSON numbers, anything else as a string
fn id_value(id: &str) -> Value {
    id.parse::<u64>()
        .map(Value::from)
        .unwrap_or_else(|_| Value::from(id))
}

fn case_body(draft: &CaseDraft) -> Value {
    json!({
        "title": draft.title,
        "template_id": STEPS_TEMPLATE_ID,
        "custom_preconds": draft.description,
        "custom_steps_separated": draft
            .steps
            .iter()
            .map(|s| json!({ "content": s.content, "expected": s.expected }))
            .collect::<Vec<_>>(),
    })
}

#[async_trait::async_trait]
impl ITmsBackend for TestRailBackend {
    fn source(&self) -> BackendKind {
        BackendKind::TestRail
    }

    async fn create_suite(&self, name: &str, description: &str) -> TmsResult<RemoteSuite> {
        debug!(name, "TestRailBackend::create_suite");
        let suite: SuiteResponse = self
            .http
            .send_json(
                "add_suite",
                self.post(
                    &format!("add_suite/{}", self.project_id),
                    &json!({ "name": name, "description": description }),
                ),
            )
            .await?;
        Ok(RemoteSuite {
            id: remote_id("add_suite", suite.id)?,
            url: suite.url,
        })
    }

    async fn update_suite(&self, suite_id: &SuiteId, description: &str) -> TmsResult<()> {
        debug!(suite_id = %suite_id, "TestRailBackend::update_suite");
        self.http
            .send_empty(
                "update_suite",
                self.post(
                    &format!("update_suite/{suite_id}"),
                    &json!({ "description": description }),
                ),
            )
            .await
    }

    async fn add_section(&self, suite_id: &SuiteId, name: &str) -> TmsResult<SectionId> {
        debug!(suite_id = %suite_id, name, "TestRailBackend::add_section");
        let section: IdResponse = self
            .http
            .send_json(
                "add_section",
                self.post(
                    &format!("add_section/{}", self.project_id),
                    &json!({ "suite_id": id_value(suite_id.as_str()), "name": name }),
                ),
            )
            .await?;
        remote_id("add_section", section.id)
    }

    async fn add_or_update_case(
        &self,
        container: &CaseContainer,
        draft: &CaseDraft,
        existing: Option<&CaseId>,
    ) -> TmsResult<CaseId> {
        let body = case_body(draft);
        match existing {
            Some(case_id) => {
                debug!(case_id = %case_id, title = %draft.title, "TestRailBackend::update_case");
                self.http
                    .send_empty("update_case", self.post(&format!("update_case/{case_id}"), &body))
                    .await?;
                Ok(case_id.clone())
            }
            None => {
                let section_id = container.section_id.as_ref().ok_or_else(|| {
                    TmsError::local("add_case", "TestRail cases require a section")
                })?;
                debug!(section_id = %section_id, title = %draft.title, "TestRailBackend::add_case");
                let case: IdResponse = self
                    .http
                    .send_json("add_case", self.post(&format!("add_case/{section_id}"), &body))
                    .await?;
                remote_id("add_case", case.id)
            }
        }
    }

    async fn delete_case(&self, case_id: &CaseId) -> TmsResult<()> {
        debug!(case_id = %case_id, "TestRailBackend::delete_case");
        self.http
            .send_empty(
                "delete_case",
                self.post(&format!("delete_case/{case_id}"), &json!({})),
            )
            .await
    }

    async fn reorder_cases(
        &self,
        suite_id: &SuiteId,
        section_id: Option<&SectionId>,
        ordered: &[CaseId],
    ) -> TmsResult<()> {
        let section_id = section_id.ok_or_else(|| {
            TmsError::local("move_cases_to_section", "TestRail reordering requires a section")
        })?;
        debug!(
            suite_id = %suite_id,
            section_id = %section_id,
            count = ordered.len(),
            "TestRailBackend::reorder_cases"
        );
        let case_ids: Vec<Value> = ordered.iter().map(|c| id_value(c.as_str())).collect();
        self.http
            .send_empty(
                "move_cases_to_section",
                self.post(
                    &format!("move_cases_to_section/{section_id}"),
                    &json!({ "suite_id": id_value(suite_id.as_str()), "case_ids": case_ids }),
                ),
            )
            .await
    }

    async fn get_active_runs(&self, suite_id: &SuiteId) -> TmsResult<Vec<RemoteRun>> {
        debug!(suite_id = %suite_id, "TestRailBackend::get_active_runs");
        let runs: RunsResponse = self
            .http
            .send_json(
                "get_runs",
                self.api(
                    Method::GET,
                    &format!(
                        "get_runs/{}&suite_id={suite_id}&is_completed=0",
                        self.project_id
                    ),
                ),
            )
            .await?;
        runs.into_runs()
            .into_iter()
            .filter(|r| !r.is_completed)
            .map(|r| r.into_remote("get_runs"))
            .collect()
    }

    async fn create_run(
        &self,
        suite_id: &SuiteId,
        name: &str,
        case_ids: &[CaseId],
    ) -> TmsResult<RemoteRun> {
        debug!(suite_id = %suite_id, name, cases = case_ids.len(), "TestRailBackend::create_run");
        let case_ids: Vec<Value> = case_ids.iter().map(|c| id_value(c.as_str())).collect();
        let run: RunResponse = self
            .http
            .send_json(
                "add_run",
                self.post(
                    &format!("add_run/{}", self.project_id),
                    &json!({
                        "suite_id": id_value(suite_id.as_str()),
                        "name": name,
                        "include_all": false,
                        "case_ids": case_ids,
                    }),
                ),
            )
            .await?;
        run.into_remote("add_run")
    }

    async fn close_run(&self, run_id: &RunId) -> TmsResult<()> {
        debug!(run_id = %run_id, "TestRailBackend::close_run");
        self.http
            .send_empty("close_run", self.post(&format!("close_run/{run_id}"), &json!({})))
            .await
    }

    async fn add_results(&self, run_id: &RunId, results: &[CaseResult]) -> TmsResult<()> {
        debug!(run_id = %run_id, count = results.len(), "TestRailBackend::add_results");
        let results: Vec<Value> = results
            .iter()
            .map(|r| {
                let mut entry = json!({
                    "case_id": id_value(r.case_id.as_str()),
                    "status_id": status_id(r.outcome),
                    "comment": r.comment,
                });
                if let Some(elapsed) = timespan(r.elapsed) {
                    entry["elapsed"] = Value::from(elapsed);
                }
                entry
            })
            .collect();
        self.http
            .send_empty(
                "add_results_for_cases",
                self.post(
                    &format!("add_results_for_cases/{run_id}"),
                    &json!({ "results": results }),
                ),
            )
            .await
    }

    async fn upload_attachment(&self, run_id: &RunId, path: &Path) -> TmsResult<()> {
        debug!(run_id = %run_id, path = %path.display(), "TestRailBackend::upload_attachment");
        let (file_name, data) = read_attachment("add_attachment_to_run", path).await?;
        let form = Form::new().part("attachment", Part::bytes(data).file_name(file_name));
        self.http
            .send_empty(
                "add_attachment_to_run",
                self.api(Method::POST, &format!("add_attachment_to_run/{run_id}"))
                    .multipart(form),
            )
            .await
    }
}
