//! AzureBackend - ITmsBackend implementation for Azure DevOps Test Plans
//!
//! Concept mapping:
//!
//! | port     | Azure DevOps                                   |
//! |----------|------------------------------------------------|
//! | suite    | test plan                                      |
//! | section  | static test suite under the plan's root suite  |
//! | case     | `Test Case` work item, added to the section    |
//! | run      | automated test run bound to the plan           |
//!
//! ## Design Notes
//!
//! - Authentication is basic auth with an empty user and a personal access
//!   token as the password.
//! - Work items are written with JSON-patch documents; steps are stored in
//!   the `Microsoft.VSTS.TCM.Steps` XML field.
//! - Runs are created as automated runs, so results can be reported by
//!   test-case reference without resolving test points first. A run
//!   therefore contains exactly the cases results are reported for.

use std::path::Path;

use base64::Engine;
use reqwest::header::CONTENT_TYPE;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use tmsync_core::domain::{
    BackendKind, CaseContainer, CaseDraft, CaseId, CaseResult, Outcome, RemoteRun, RemoteSuite,
    RunId, SectionId, StepDraft, SuiteId,
};
use tmsync_core::ports::{ITmsBackend, TmsError, TmsResult};

use crate::http::HttpClient;
use crate::{read_attachment, remote_id};

/// REST API version pinned for every request
const API_VERSION: &str = "7.0";

const JSON_PATCH: &str = "application/json-patch+json";

/// Run state reported for finished runs
const COMPLETED: &str = "Completed";

// ============================================================================
// Azure DevOps response types
// ============================================================================

#[derive(Debug, Deserialize)]
struct IdResponse {
    id: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlanResponse {
    id: u64,
    root_suite: Option<IdResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RunResponse {
    id: u64,
    name: String,
    #[serde(default)]
    state: String,
    web_access_url: Option<String>,
}

impl RunResponse {
    fn into_remote(self, operation: &str) -> TmsResult<RemoteRun> {
        Ok(RemoteRun {
            id: remote_id(operation, self.id)?,
            is_completed: self.state.eq_ignore_ascii_case(COMPLETED),
            name: self.name,
            url: self.web_access_url,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    value: Vec<T>,
}

// ============================================================================
// AzureBackend
// ============================================================================

/// Adapter for one Azure DevOps project
pub struct AzureBackend {
    /// Client whose base URL is `{organization_url}/{project}`
    http: HttpClient,
}

impl AzureBackend {
    /// Creates a backend
    ///
    /// # Arguments
    /// * `http` - Client whose base URL is `{organization_url}/{project}`
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    fn api(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, &format!("/_apis/{path}"))
            .query(&[("api-version", API_VERSION)])
    }

    fn plan_url(&self, plan_id: u64) -> String {
        format!("{}/_testPlans/define?planId={plan_id}", self.http.base_url())
    }

    fn field_patch(draft: &CaseDraft) -> Value {
        json!([
            { "op": "add", "path": "/fields/System.Title", "value": draft.title },
            { "op": "add", "path": "/fields/System.Description", "value": draft.description },
            { "op": "add", "path": "/fields/Microsoft.VSTS.TCM.Steps", "value": steps_xml(&draft.steps) },
        ])
    }

    async fn add_case_to_suite(
        &self,
        plan_id: &SuiteId,
        suite_id: &SectionId,
        case_id: &CaseId,
    ) -> TmsResult<()> {
        self.http
            .send_empty(
                "add_test_case_to_suite",
                self.api(
                    Method::POST,
                    &format!("testplan/Plans/{plan_id}/Suites/{suite_id}/TestCase"),
                )
                .json(&json!([{ "workItem": { "id": numeric(case_id.as_str()) } }])),
            )
            .await
    }
}

fn outcome_name(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::Passed => "Passed",
        Outcome::Failed => "Failed",
        Outcome::Skipped => "NotExecuted",
    }
}

fn numeric(id: &str) -> Value {
    id.parse::<u64>()
        .map(Value::from)
        .unwrap_or_else(|_| Value::from(id))
}

fn xml_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// Renders steps in the Test Case `Steps` field format
///
/// Step ids start at 2; `last` is the id of the final step. The
/// `parameterizedString` content is HTML, escaped once more for XML.
fn steps_xml(steps: &[StepDraft]) -> String {
    let mut xml = format!(r#"<steps id="0" last="{}">"#, steps.len() + 1);
    for (index, step) in steps.iter().enumerate() {
        xml.push_str(&format!(
            concat!(
                r#"<step id="{}" type="ActionStep">"#,
                r#"<parameterizedString isformatted="true">{}</parameterizedString>"#,
                r#"<parameterizedString isformatted="true">{}</parameterizedString>"#,
                "<description/></step>"
            ),
            index + 2,
            xml_escape(&step.content),
            xml_escape(&step.expected),
        ));
    }
    xml.push_str("</steps>");
    xml
}

#[async_trait::async_trait]
impl ITmsBackend for AzureBackend {
    fn source(&self) -> BackendKind {
        BackendKind::Azure
    }

    async fn create_suite(&self, name: &str, description: &str) -> TmsResult<RemoteSuite> {
        debug!(name, "AzureBackend::create_suite");
        let plan: PlanResponse = self
            .http
            .send_json(
                "create_test_plan",
                self.api(Method::POST, "testplan/plans")
                    .json(&json!({ "name": name, "description": description })),
            )
            .await?;
        Ok(RemoteSuite {
            id: remote_id("create_test_plan", plan.id)?,
            url: Some(self.plan_url(plan.id)),
        })
    }

    async fn update_suite(&self, suite_id: &SuiteId, description: &str) -> TmsResult<()> {
        debug!(plan_id = %suite_id, "AzureBackend::update_suite");
        self.http
            .send_empty(
                "update_test_plan",
                self.api(Method::PATCH, &format!("testplan/plans/{suite_id}"))
                    .json(&json!({ "description": description })),
            )
            .await
    }

    async fn add_section(&self, suite_id: &SuiteId, name: &str) -> TmsResult<SectionId> {
        debug!(plan_id = %suite_id, name, "AzureBackend::add_section");
        let plan: PlanResponse = self
            .http
            .send_json(
                "get_test_plan",
                self.api(Method::GET, &format!("testplan/plans/{suite_id}")),
            )
            .await?;
        let root = plan.root_suite.ok_or_else(|| {
            TmsError::local("get_test_plan", format!("plan {suite_id} has no root suite"))
        })?;

        let suite: IdResponse = self
            .http
            .send_json(
                "create_test_suite",
                self.api(Method::POST, &format!("testplan/Plans/{suite_id}/suites"))
                    .json(&json!({
                        "suiteType": "staticTestSuite",
                        "name": name,
                        "parentSuite": { "id": root.id },
                    })),
            )
            .await?;
        remote_id("create_test_suite", suite.id)
    }

    async fn add_or_update_case(
        &self,
        container: &CaseContainer,
        draft: &CaseDraft,
        existing: Option<&CaseId>,
    ) -> TmsResult<CaseId> {
        let patch = Self::field_patch(draft);
        if let Some(case_id) = existing {
            debug!(case_id = %case_id, title = %draft.title, "AzureBackend::update_case");
            self.http
                .send_empty(
                    "update_work_item",
                    self.api(Method::PATCH, &format!("wit/workitems/{case_id}"))
                        .header(CONTENT_TYPE, JSON_PATCH)
                        .body(patch.to_string()),
                )
                .await?;
            return Ok(case_id.clone());
        }

        let section_id = container.section_id.as_ref().ok_or_else(|| {
            TmsError::local("create_work_item", "Azure test cases require a test suite")
        })?;
        debug!(suite_id = %section_id, title = %draft.title, "AzureBackend::add_case");
        let item: IdResponse = self
            .http
            .send_json(
                "create_work_item",
                self.api(Method::POST, "wit/workitems/$Test%20Case")
                    .header(CONTENT_TYPE, JSON_PATCH)
                    .body(patch.to_string()),
            )
            .await?;
        let case_id: CaseId = remote_id("create_work_item", item.id)?;
        if let Err(err) = self.link_case(container, &case_id).await {
            warn!(
                case_id = %case_id,
                error = %err,
                "Test case created but not added to its suite"
            );
            return Err(err.with_created_case(case_id));
        }
        Ok(case_id)
    }

    async fn link_case(&self, container: &CaseContainer, case_id: &CaseId) -> TmsResult<()> {
        let section_id = container.section_id.as_ref().ok_or_else(|| {
            TmsError::local("add_test_case_to_suite", "Azure test cases require a test suite")
        })?;
        debug!(suite_id = %section_id, case_id = %case_id, "AzureBackend::link_case");
        self.add_case_to_suite(&container.suite_id, section_id, case_id)
            .await
    }

    async fn delete_case(&self, case_id: &CaseId) -> TmsResult<()> {
        debug!(case_id = %case_id, "AzureBackend::delete_case");
        self.http
            .send_empty(
                "delete_test_case",
                self.api(Method::DELETE, &format!("test/testcases/{case_id}")),
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
            TmsError::local("reorder_suite_entries", "Azure reordering requires a test suite")
        })?;
        debug!(
            plan_id = %suite_id,
            suite_id = %section_id,
            count = ordered.len(),
            "AzureBackend::reorder_cases"
        );
        let entries: Vec<Value> = ordered
            .iter()
            .enumerate()
            .map(|(index, case_id)| {
                json!({
                    "id": numeric(case_id.as_str()),
                    "sequenceNumber": index,
                    "suiteEntryType": "testCase",
                })
            })
            .collect();
        self.http
            .send_empty(
                "reorder_suite_entries",
                self.api(Method::PATCH, &format!("testplan/suiteentry/{section_id}"))
                    .json(&entries),
            )
            .await
    }

    async fn get_active_runs(&self, suite_id: &SuiteId) -> TmsResult<Vec<RemoteRun>> {
        debug!(plan_id = %suite_id, "AzureBackend::get_active_runs");
        let runs: ListResponse<RunResponse> = self
            .http
            .send_json(
                "get_test_runs",
                self.api(Method::GET, "test/runs").query(&[
                    ("planId", suite_id.as_str()),
                    ("includeRunDetails", "true"),
                ]),
            )
            .await?;
        runs.value
            .into_iter()
            .filter(|r| !r.state.eq_ignore_ascii_case(COMPLETED))
            .map(|r| r.into_remote("get_test_runs"))
            .collect()
    }

    async fn create_run(
        &self,
        suite_id: &SuiteId,
        name: &str,
        case_ids: &[CaseId],
    ) -> TmsResult<RemoteRun> {
        debug!(plan_id = %suite_id, name, cases = case_ids.len(), "AzureBackend::create_run");
        let run: RunResponse = self
            .http
            .send_json(
                "create_test_run",
                self.api(Method::POST, "test/runs").json(&json!({
                    "name": name,
                    "plan": { "id": numeric(suite_id.as_str()) },
                    "automated": true,
                    "state": "InProgress",
                })),
            )
            .await?;
        run.into_remote("create_test_run")
    }

    async fn close_run(&self, run_id: &RunId) -> TmsResult<()> {
        debug!(run_id = %run_id, "AzureBackend::close_run");
        self.http
            .send_empty(
                "update_test_run",
                self.api(Method::PATCH, &format!("test/runs/{run_id}"))
                    .json(&json!({ "state": COMPLETED })),
            )
            .await
    }

    async fn add_results(&self, run_id: &RunId, results: &[CaseResult]) -> TmsResult<()> {
        debug!(run_id = %run_id, count = results.len(), "AzureBackend::add_results");
        let body: Vec<Value> = results
            .iter()
            .map(|r| {
                json!({
                    "testCase": { "id": r.case_id.as_str() },
                    "automatedTestName": format!("tmsync.case.{}", r.case_id),
                    "outcome": outcome_name(r.outcome),
                    "comment": r.comment,
                    "durationInMs": r.elapsed.as_millis() as u64,
                    "state": COMPLETED,
                })
            })
            .collect();
        self.http
            .send_empty(
                "add_test_results",
                self.api(Method::POST, &format!("test/Runs/{run_id}/results"))
                    .json(&body),
            )
            .await
    }

    async fn upload_attachment(&self, run_id: &RunId, path: &Path) -> TmsResult<()> {
        debug!(run_id = %run_id, path = %path.display(), "AzureBackend::upload_attachment");
        let (file_name, data) = read_attachment("create_test_run_attachment", path).await?;
        let stream = base64::engine::general_purpose::STANDARD.encode(data);
        self.http
            .send_empty(
                "create_test_run_attachment",
                self.api(Method::POST, &format!("test/Runs/{run_id}/attachments"))
                    .json(&json!({
                        "stream": stream,
                        "fileName": file_name,
                        "comment": "",
                        "attachmentType": "GeneralAttachment",
                    })),
            )
            .await
    }
}
