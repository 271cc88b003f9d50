//! JiraBackend - ITmsBackend implementation for Jira with Xray
//!
//! Concept mapping:
//!
//! | port     | Jira / Xray                                        |
//! |----------|----------------------------------------------------|
//! | suite    | `Test Plan` issue                                  |
//! | section  | none; the plan key stands in for the section id    |
//! | case     | `Test` issue, added to the plan                    |
//! | run      | `Test Execution` issue linked to the plan          |
//!
//! Identifiers are issue keys (`QA-42`), not numbers.
//!
//! ## Design Notes
//!
//! - Steps are rendered into the issue description as a wiki-markup table,
//!   so the adapter works without Xray's manual-step custom field.
//! - Xray keeps no case order inside a plan; `reorder_cases` is a logged no-op.
//! - Closing a run performs the configured workflow transition.

use std::path::Path;

use reqwest::multipart::{Form, Part};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use tmsync_core::config::JiraConfig;
use tmsync_core::domain::{
    BackendKind, CaseContainer, CaseDraft, CaseId, CaseResult, Outcome, RemoteRun, RemoteSuite,
    RunId, SectionId, StepDraft, SuiteId,
};
use tmsync_core::ports::{ITmsBackend, TmsError, TmsResult};

use crate::http::HttpClient;
use crate::{read_attachment, remote_id};

// ============================================================================
// Jira response types
// ============================================================================

#[derive(Debug, Deserialize)]
struct CreatedIssue {
    key: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    issues: Vec<SearchIssue>,
}

#[derive(Debug, Deserialize)]
struct SearchIssue {
    key: String,
    fields: SearchFields,
}

#[derive(Debug, Deserialize)]
struct SearchFields {
    #[serde(default)]
    summary: String,
    status: Option<IssueStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IssueStatus {
    status_category: Option<StatusCategory>,
}

#[derive(Debug, Deserialize)]
struct StatusCategory {
    key: String,
}

impl SearchIssue {
    fn is_done(&self) -> bool {
        self.fields
            .status
            .as_ref()
            .and_then(|s| s.status_category.as_ref())
            .is_some_and(|c| c.key == "done")
    }
}

// ============================================================================
// JiraBackend
// ============================================================================

/// Adapter for one Jira project with Xray installed
pub struct JiraBackend {
    http: HttpClient,
    project_key: String,
    config: JiraConfig,
}

impl JiraBackend {
    /// Creates a backend
    ///
    /// # Arguments
    /// * `http` - Client whose base URL is the Jira site URL
    /// * `project_key` - Jira project key, e.g. `QA`
    /// * `config` - Issue types and close transition
    pub fn new(http: HttpClient, project_key: impl Into<String>, config: JiraConfig) -> Self {
        Self {
            http,
            project_key: project_key.into(),
            config,
        }
    }

    fn rest(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        self.http.request(method, &format!("/rest/{path}"))
    }

    fn browse_url(&self, key: &str) -> String {
        format!("{}/browse/{key}", self.http.base_url())
    }

    async fn create_issue(
        &self,
        operation: &str,
        issue_type: &str,
        summary: &str,
        description: &str,
    ) -> TmsResult<String> {
        let issue: CreatedIssue = self
            .http
            .send_json(
                operation,
                self.rest(Method::POST, "api/2/issue").json(&json!({
                    "fields": {
                        "project": { "key": self.project_key },
                        "issuetype": { "name": issue_type },
                        "summary": summary,
                        "description": description,
                    }
                })),
            )
            .await?;
        Ok(issue.key)
    }

    async fn add_to(&self, operation: &str, path: &str, keys: &[&str]) -> TmsResult<()> {
        self.http
            .send_empty(
                operation,
                self.rest(Method::POST, path).json(&json!({ "add": keys })),
            )
            .await
    }
}

fn xray_status(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::Passed => "PASS",
        Outcome::Failed => "FAIL",
        Outcome::Skipped => "TODO",
    }
}

/// Escapes characters with meaning inside a wiki-markup table cell
fn wiki_cell(text: &str) -> String {
    let escaped = text.replace('|', "\\|").replace('\n', " \\\\ ");
    if escaped.trim().is_empty() {
        " ".to_string()
    } else {
        escaped
    }
}

/// Issue description: free text followed by a steps table
fn issue_description(description: &str, steps: &[StepDraft]) -> String {
    let mut out = description.to_string();
    if steps.is_empty() {
        return out;
    }
    if !out.is_empty() {
        out.push_str("\n\n");
    }
    out.push_str("||#||Step||Expected Result||\n");
    for (index, step) in steps.iter().enumerate() {
        out.push_str(&format!(
            "|{}|{}|{}|\n",
            index + 1,
            wiki_cell(&step.content),
            wiki_cell(&step.expected)
        ));
    }
    out
}

#[async_trait::async_trait]
impl ITmsBackend for JiraBackend {
    fn source(&self) -> BackendKind {
        BackendKind::Jira
    }

    async fn create_suite(&self, name: &str, description: &str) -> TmsResult<RemoteSuite> {
        debug!(name, "JiraBackend::create_suite");
        let key = self
            .create_issue(
                "create_test_plan",
                &self.config.plan_issue_type,
                name,
                description,
            )
            .await?;
        Ok(RemoteSuite {
            url: Some(self.browse_url(&key)),
            id: remote_id("create_test_plan", key)?,
        })
    }

    async fn update_suite(&self, suite_id: &SuiteId, description: &str) -> TmsResult<()> {
        debug!(plan = %suite_id, "JiraBackend::update_suite");
        self.http
            .send_empty(
                "update_test_plan",
                self.rest(Method::PUT, &format!("api/2/issue/{suite_id}"))
                    .json(&json!({ "fields": { "description": description } })),
            )
            .await
    }

    async fn add_section(&self, suite_id: &SuiteId, name: &str) -> TmsResult<SectionId> {
        debug!(plan = %suite_id, name, "JiraBackend::add_section (plans have no sections)");
        remote_id("add_section", suite_id.as_str())
    }

    async fn add_or_update_case(
        &self,
        container: &CaseContainer,
        draft: &CaseDraft,
        existing: Option<&CaseId>,
    ) -> TmsResult<CaseId> {
        let description = issue_description(&draft.description, &draft.steps);
        if let Some(case_id) = existing {
            debug!(test = %case_id, title = %draft.title, "JiraBackend::update_case");
            self.http
                .send_empty(
                    "update_test",
                    self.rest(Method::PUT, &format!("api/2/issue/{case_id}"))
                        .json(&json!({
                            "fields": { "summary": draft.title, "description": description }
                        })),
                )
                .await?;
            return Ok(case_id.clone());
        }

        debug!(plan = %container.suite_id, title = %draft.title, "JiraBackend::add_case");
        let key = self
            .create_issue(
                "create_test",
                &self.config.test_issue_type,
                &draft.title,
                &description,
            )
            .await?;
        let case_id: CaseId = remote_id("create_test", key)?;
        if let Err(err) = self.link_case(container, &case_id).await {
            warn!(test = %case_id, error = %err, "Test created but not added to its plan");
            return Err(err.with_created_case(case_id));
        }
        Ok(case_id)
    }

    async fn link_case(&self, container: &CaseContainer, case_id: &CaseId) -> TmsResult<()> {
        debug!(plan = %container.suite_id, test = %case_id, "JiraBackend::link_case");
        self.add_to(
            "add_test_to_plan",
            &format!("raven/1.0/api/testplan/{}/test", container.suite_id),
            &[case_id.as_str()],
        )
        .await
    }

    async fn delete_case(&self, case_id: &CaseId) -> TmsResult<()> {
        debug!(test = %case_id, "JiraBackend::delete_case");
        self.http
            .send_empty(
                "delete_test",
                self.rest(Method::DELETE, &format!("api/2/issue/{case_id}")),
            )
            .await
    }

    async fn reorder_cases(
        &self,
        suite_id: &SuiteId,
        _section_id: Option<&SectionId>,
        ordered: &[CaseId],
    ) -> TmsResult<()> {
        info!(
            plan = %suite_id,
            count = ordered.len(),
            "Xray test plans keep no case order; skipping reorder"
        );
        Ok(())
    }

    async fn get_active_runs(&self, suite_id: &SuiteId) -> TmsResult<Vec<RemoteRun>> {
        debug!(plan = %suite_id, "JiraBackend::get_active_runs");
        let jql = format!(
            "issue in testPlanTestExecutions(\"{suite_id}\") AND statusCategory != Done ORDER BY created ASC"
        );
        let found: SearchResponse = self
            .http
            .send_json(
                "search_test_executions",
                self.rest(Method::GET, "api/2/search")
                    .query(&[("jql", jql.as_str()), ("fields", "summary,status")]),
            )
            .await?;
        found
            .issues
            .into_iter()
            .filter(|issue| !issue.is_done())
            .map(|issue| -> TmsResult<RemoteRun> {
                Ok(RemoteRun {
                    url: Some(self.browse_url(&issue.key)),
                    id: remote_id("search_test_executions", &issue.key)?,
                    name: issue.fields.summary,
                    is_completed: false,
                })
            })
            .collect()
    }

    async fn create_run(
        &self,
        suite_id: &SuiteId,
        name: &str,
        case_ids: &[CaseId],
    ) -> TmsResult<RemoteRun> {
        debug!(plan = %suite_id, name, cases = case_ids.len(), "JiraBackend::create_run");
        let key = self
            .create_issue(
                "create_test_execution",
                &self.config.execution_issue_type,
                name,
                "",
            )
            .await?;
        let tests: Vec<&str> = case_ids.iter().map(CaseId::as_str).collect();
        self.add_to(
            "add_tests_to_execution",
            &format!("raven/1.0/api/testexec/{key}/test"),
            &tests,
        )
        .await?;
        self.add_to(
            "add_execution_to_plan",
            &format!("raven/1.0/api/testplan/{suite_id}/testexecution"),
            &[key.as_str()],
        )
        .await?;
        Ok(RemoteRun {
            url: Some(self.browse_url(&key)),
            id: remote_id("create_test_execution", &key)?,
            name: name.to_string(),
            is_completed: false,
        })
    }

    async fn close_run(&self, run_id: &RunId) -> TmsResult<()> {
        let transition = self.config.close_transition_id.as_deref().ok_or_else(|| {
            TmsError::local(
                "transition_test_execution",
                "no close transition configured (backend.jira.close_transition_id)",
            )
        })?;
        debug!(execution = %run_id, transition, "JiraBackend::close_run");
        self.http
            .send_empty(
                "transition_test_execution",
                self.rest(Method::POST, &format!("api/2/issue/{run_id}/transitions"))
                    .json(&json!({ "transition": { "id": transition } })),
            )
            .await
    }

    async fn add_results(&self, run_id: &RunId, results: &[CaseResult]) -> TmsResult<()> {
        debug!(execution = %run_id, count = results.len(), "JiraBackend::add_results");
        let tests: Vec<Value> = results
            .iter()
            .map(|r| {
                json!({
                    "testKey": r.case_id.as_str(),
                    "status": xray_status(r.outcome),
                    "comment": r.comment,
                })
            })
            .collect();
        self.http
            .send_empty(
                "import_execution_results",
                self.rest(Method::POST, "raven/1.0/import/execution").json(&json!({
                    "testExecutionKey": run_id.as_str(),
                    "tests": tests,
                })),
            )
            .await
    }

    async fn upload_attachment(&self, run_id: &RunId, path: &Path) -> TmsResult<()> {
        debug!(execution = %run_id, path = %path.display(), "JiraBackend::upload_attachment");
        let (file_name, data) = read_attachment("add_attachment", path).await?;
        let form = Form::new().part("file", Part::bytes(data).file_name(file_name));
        self.http
            .send_empty(
                "add_attachment",
                self.rest(Method::POST, &format!("api/2/issue/{run_id}/attachments"))
                    .header("X-Atlassian-Token", "no-check")
                    .multipart(form),
            )
            .await
    }
}
