//! Integration tests for the Jira/Xray adapter

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use tmsync_core::domain::{CaseContainer, CaseId, CaseResult, Outcome, RunId, SectionId, SuiteId};
use tmsync_core::ports::ITmsBackend;

use crate::common;

fn plan() -> SuiteId {
    SuiteId::new("QA-1").unwrap()
}

#[tokio::test]
async fn test_create_suite_creates_test_plan_issue() {
    let (server, backend) = common::setup_jira(None).await;

    Mock::given(method("POST"))
        .and(path("/rest/api/2/issue"))
        .and(body_partial_json(json!({
            "fields": {
                "project": { "key": "QA" },
                "issuetype": { "name": "Test Plan" },
                "summary": "Checkout"
            }
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "10001",
            "key": "QA-1",
            "self": "https://jira/rest/api/2/issue/10001"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let created = backend.create_suite("Checkout", "Happy path").await.unwrap();
    assert_eq!(created.id.as_str(), "QA-1");
    assert_eq!(created.url, Some(format!("{}/browse/QA-1", server.uri())));
}

#[tokio::test]
async fn test_add_section_returns_plan_key_without_request() {
    let (server, backend) = common::setup_jira(None).await;

    let section = backend.add_section(&plan(), "Checkout").await.unwrap();
    assert_eq!(section.as_str(), "QA-1");
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_new_case_is_test_issue_added_to_plan() {
    let (server, backend) = common::setup_jira(None).await;

    Mock::given(method("POST"))
        .and(path("/rest/api/2/issue"))
        .and(body_partial_json(json!({
            "fields": { "issuetype": { "name": "Test" }, "summary": "Login" }
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": "10002", "key": "QA-2" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/raven/1.0/api/testplan/QA-1/test"))
        .and(body_partial_json(json!({ "add": ["QA-2"] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let container = CaseContainer::new(plan(), Some(SectionId::new("QA-1").unwrap()));
    let case_id = backend
        .add_or_update_case(&container, &common::login_draft(), None)
        .await
        .unwrap();
    assert_eq!(case_id.as_str(), "QA-2");
}

#[tokio::test]
async fn test_failed_plan_link_reports_created_test() {
    let (server, backend) = common::setup_jira(None).await;

    Mock::given(method("POST"))
        .and(path("/rest/api/2/issue"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": "10002", "key": "QA-2" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/raven/1.0/api/testplan/QA-1/test"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({ "errorMessages": ["plan is locked"] })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let container = CaseContainer::new(plan(), Some(SectionId::new("QA-1").unwrap()));
    let err = backend
        .add_or_update_case(&container, &common::login_draft(), None)
        .await
        .unwrap_err();

    assert_eq!(err.operation, "add_test_to_plan");
    assert_eq!(err.status, Some(400));
    assert_eq!(err.created_case, Some(CaseId::new("QA-2").unwrap()));
}

#[tokio::test]
async fn test_existing_case_is_updated_with_put() {
    let (server, backend) = common::setup_jira(None).await;

    Mock::given(method("PUT"))
        .and(path("/rest/api/2/issue/QA-2"))
        .and(body_partial_json(json!({ "fields": { "summary": "Login" } })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let container = CaseContainer::new(plan(), None);
    let existing = CaseId::new("QA-2").unwrap();
    let case_id = backend
        .add_or_update_case(&container, &common::login_draft(), Some(&existing))
        .await
        .unwrap();
    assert_eq!(case_id, existing);
}

#[tokio::test]
async fn test_reorder_is_a_no_op() {
    let (server, backend) = common::setup_jira(None).await;

    backend
        .reorder_cases(&plan(), None, &[CaseId::new("QA-3").unwrap()])
        .await
        .unwrap();
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_active_runs_use_jql() {
    let (server, backend) = common::setup_jira(None).await;

    Mock::given(method("GET"))
        .and(path("/rest/api/2/search"))
        .and(query_param(
            "jql",
            "issue in testPlanTestExecutions(\"QA-1\") AND statusCategory != Done ORDER BY created ASC",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "issues": [
                { "key": "QA-7", "fields": { "summary": "Checkout", "status": { "statusCategory": { "key": "indeterminate" } } } }
            ]
        })))
        .mount(&server)
        .await;

    let runs = backend.get_active_runs(&plan()).await.unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].id.as_str(), "QA-7");
    assert_eq!(runs[0].name, "Checkout");
}

#[tokio::test]
async fn test_create_run_builds_linked_execution() {
    let (server, backend) = common::setup_jira(None).await;

    Mock::given(method("POST"))
        .and(path("/rest/api/2/issue"))
        .and(body_partial_json(json!({
            "fields": { "issuetype": { "name": "Test Execution" } }
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": "1", "key": "QA-8" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/raven/1.0/api/testexec/QA-8/test"))
        .and(body_partial_json(json!({ "add": ["QA-2", "QA-3"] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/raven/1.0/api/testplan/QA-1/testexecution"))
        .and(body_partial_json(json!({ "add": ["QA-8"] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let cases = vec![CaseId::new("QA-2").unwrap(), CaseId::new("QA-3").unwrap()];
    let run = backend.create_run(&plan(), "Checkout", &cases).await.unwrap();
    assert_eq!(run.id.as_str(), "QA-8");
    assert!(!run.is_completed);
}

#[tokio::test]
async fn test_close_run_requires_transition() {
    let (server, backend) = common::setup_jira(None).await;

    let err = backend
        .close_run(&RunId::new("QA-8").unwrap())
        .await
        .unwrap_err();
    assert!(err.remote_message.contains("close_transition_id"));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_close_run_applies_transition() {
    let (server, backend) = common::setup_jira(Some("31")).await;

    Mock::given(method("POST"))
        .and(path("/rest/api/2/issue/QA-8/transitions"))
        .and(body_partial_json(json!({ "transition": { "id": "31" } })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    backend
        .close_run(&RunId::new("QA-8").unwrap())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_results_are_imported_with_xray_statuses() {
    let (server, backend) = common::setup_jira(None).await;

    Mock::given(method("POST"))
        .and(path("/rest/raven/1.0/import/execution"))
        .and(body_partial_json(json!({
            "testExecutionKey": "QA-8",
            "tests": [
                { "testKey": "QA-2", "status": "FAIL" },
                { "testKey": "QA-3", "status": "TODO" }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "testExecIssue": { "key": "QA-8" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let results = vec![
        CaseResult {
            case_id: CaseId::new("QA-2").unwrap(),
            outcome: Outcome::Failed,
            comment: "assertion failed".to_string(),
            elapsed: Duration::from_secs(3),
        },
        CaseResult {
            case_id: CaseId::new("QA-3").unwrap(),
            outcome: Outcome::Skipped,
            comment: String::new(),
            elapsed: Duration::ZERO,
        },
    ];
    backend
        .add_results(&RunId::new("QA-8").unwrap(), &results)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_attachment_disables_xsrf_check() {
    let (server, backend) = common::setup_jira(None).await;

    Mock::given(method("POST"))
        .and(path("/rest/api/2/issue/QA-8/attachments"))
        .and(header("X-Atlassian-Token", "no-check"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": "1" }])))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("login.png");
    std::fs::write(&file, [0x89, b'P', b'N', b'G']).unwrap();

    backend
        .upload_attachment(&RunId::new("QA-8").unwrap(), &file)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_error_messages_are_joined() {
    let (server, backend) = common::setup_jira(None).await;

    Mock::given(method("DELETE"))
        .and(path("/rest/api/2/issue/QA-404"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "errorMessages": ["Issue does not exist or you do not have permission to see it."],
            "errors": {}
        })))
        .mount(&server)
        .await;

    let err = backend
        .delete_case(&CaseId::new("QA-404").unwrap())
        .await
        .unwrap_err();
    assert_eq!(err.status, Some(404));
    assert_eq!(
        err.remote_message,
        "Issue does not exist or you do not have permission to see it."
    );
}
