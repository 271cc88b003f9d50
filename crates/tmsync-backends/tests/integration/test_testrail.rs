//! Integration tests for the TestRail adapter

use std::io::Write;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use tmsync_core::domain::{CaseContainer, CaseId, CaseResult, Outcome, RunId, SectionId, SuiteId};
use tmsync_core::ports::ITmsBackend;

use crate::common::{self, testrail_api};

fn id<T: TryFrom<String>>(raw: &str) -> T
where
    T::Error: std::fmt::Debug,
{
    T::try_from(raw.to_string()).unwrap()
}

// ============================================================================
// Suites and sections
// ============================================================================

#[tokio::test]
async fn test_create_suite_returns_id_and_url() {
    let (server, backend) = common::setup_testrail().await;

    Mock::given(method("POST"))
        .and(path("/index.php"))
        .and(testrail_api("add_suite/1"))
        .and(body_partial_json(json!({ "name": "Checkout", "description": "Happy path" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 10,
            "name": "Checkout",
            "url": "https://tr.example.com/index.php?/suites/view/10"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let suite = backend.create_suite("Checkout", "Happy path").await.unwrap();
    assert_eq!(suite.id.as_str(), "10");
    assert_eq!(
        suite.url.as_deref(),
        Some("https://tr.example.com/index.php?/suites/view/10")
    );
}

#[tokio::test]
async fn test_add_section_sends_numeric_suite_id() {
    let (server, backend) = common::setup_testrail().await;

    Mock::given(method("POST"))
        .and(testrail_api("add_section/1"))
        .and(body_partial_json(json!({ "suite_id": 10, "name": "Checkout" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 77 })))
        .expect(1)
        .mount(&server)
        .await;

    let section = backend.add_section(&id("10"), "Checkout").await.unwrap();
    assert_eq!(section.as_str(), "77");
}

// ============================================================================
// Cases
// ============================================================================

#[tokio::test]
async fn test_new_case_is_added_to_section() {
    let (server, backend) = common::setup_testrail().await;

    Mock::given(method("POST"))
        .and(testrail_api("add_case/77"))
        .and(body_partial_json(json!({
            "title": "Login",
            "template_id": 2,
            "custom_steps_separated": [
                { "content": "open the login page", "expected": "form is shown" },
                { "content": "submit credentials", "expected": "dashboard is shown" }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 123 })))
        .expect(1)
        .mount(&server)
        .await;

    let container = CaseContainer::new(id("10"), Some(id("77")));
    let case_id = backend
        .add_or_update_case(&container, &common::login_draft(), None)
        .await
        .unwrap();
    assert_eq!(case_id.as_str(), "123");
}

#[tokio::test]
async fn test_existing_case_is_updated_in_place() {
    let (server, backend) = common::setup_testrail().await;

    Mock::given(method("POST"))
        .and(testrail_api("update_case/123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 123 })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(testrail_api("add_case/77"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let container = CaseContainer::new(id("10"), Some(id("77")));
    let existing: CaseId = id("123");
    let case_id = backend
        .add_or_update_case(&container, &common::login_draft(), Some(&existing))
        .await
        .unwrap();
    assert_eq!(case_id, existing);
}

#[tokio::test]
async fn test_new_case_without_section_fails_locally() {
    let (server, backend) = common::setup_testrail().await;

    let container = CaseContainer::new(id("10"), None);
    let err = backend
        .add_or_update_case(&container, &common::login_draft(), None)
        .await
        .unwrap_err();
    assert_eq!(err.operation, "add_case");
    assert!(err.status.is_none());
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_reorder_moves_cases_in_order() {
    let (server, backend) = common::setup_testrail().await;

    Mock::given(method("POST"))
        .and(testrail_api("move_cases_to_section/77"))
        .and(body_partial_json(json!({ "suite_id": 10, "case_ids": [3, 1, 2] })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let ordered: Vec<CaseId> = vec![id("3"), id("1"), id("2")];
    let section: SectionId = id("77");
    backend
        .reorder_cases(&id("10"), Some(&section), &ordered)
        .await
        .unwrap();
}

// ============================================================================
// Runs and results
// ============================================================================

#[tokio::test]
async fn test_active_runs_accepts_paginated_shape() {
    let (server, backend) = common::setup_testrail().await;

    Mock::given(method("GET"))
        .and(testrail_api("get_runs/1"))
        .and(query_param("suite_id", "10"))
        .and(query_param("is_completed", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "offset": 0,
            "limit": 250,
            "size": 2,
            "runs": [
                { "id": 5, "name": "Checkout", "is_completed": false, "url": "https://tr/runs/5" },
                { "id": 4, "name": "Checkout", "is_completed": true }
            ]
        })))
        .mount(&server)
        .await;

    let runs = backend.get_active_runs(&id("10")).await.unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].id.as_str(), "5");
    assert!(!runs[0].is_completed);
}

#[tokio::test]
async fn test_active_runs_accepts_bare_array() {
    let (server, backend) = common::setup_testrail().await;

    Mock::given(method("GET"))
        .and(testrail_api("get_runs/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": 8, "name": "Checkout", "is_completed": false }
        ])))
        .mount(&server)
        .await;

    let runs = backend.get_active_runs(&id("10")).await.unwrap();
    assert_eq!(runs[0].id.as_str(), "8");
}

#[tokio::test]
async fn test_create_run_includes_exact_cases() {
    let (server, backend) = common::setup_testrail().await;

    Mock::given(method("POST"))
        .and(testrail_api("add_run/1"))
        .and(body_partial_json(json!({
            "suite_id": 10,
            "name": "Checkout",
            "include_all": false,
            "case_ids": [123, 124]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 9, "name": "Checkout", "is_completed": false
        })))
        .expect(1)
        .mount(&server)
        .await;

    let cases: Vec<CaseId> = vec![id("123"), id("124")];
    let run = backend
        .create_run(&id("10"), "Checkout", &cases)
        .await
        .unwrap();
    assert_eq!(run.id.as_str(), "9");
    assert_eq!(run.name, "Checkout");
}

#[tokio::test]
async fn test_add_results_maps_statuses() {
    let (server, backend) = common::setup_testrail().await;

    Mock::given(method("POST"))
        .and(testrail_api("add_results_for_cases/9"))
        .and(body_partial_json(json!({
            "results": [
                { "case_id": 123, "status_id": 1, "elapsed": "1m 5s" },
                { "case_id": 124, "status_id": 4 }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let results = vec![
        CaseResult {
            case_id: id("123"),
            outcome: Outcome::Passed,
            comment: "ok".to_string(),
            elapsed: Duration::from_secs(65),
        },
        CaseResult {
            case_id: id("124"),
            outcome: Outcome::Skipped,
            comment: "not run".to_string(),
            elapsed: Duration::ZERO,
        },
    ];
    let run: RunId = id("9");
    backend.add_results(&run, &results).await.unwrap();
}

#[tokio::test]
async fn test_close_run() {
    let (server, backend) = common::setup_testrail().await;

    Mock::given(method("POST"))
        .and(testrail_api("close_run/9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 9, "is_completed": true })))
        .expect(1)
        .mount(&server)
        .await;

    backend.close_run(&id("9")).await.unwrap();
}

#[tokio::test]
async fn test_upload_attachment_sends_multipart() {
    let (server, backend) = common::setup_testrail().await;

    Mock::given(method("POST"))
        .and(testrail_api("add_attachment_to_run/9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "attachment_id": 443 })))
        .expect(1)
        .mount(&server)
        .await;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"<html>report</html>").unwrap();
    file.flush().unwrap();

    backend
        .upload_attachment(&id("9"), file.path())
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let content_type = requests[0]
        .headers
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.starts_with("multipart/form-data"));
    assert!(String::from_utf8_lossy(&requests[0].body).contains("<html>report</html>"));
}

#[tokio::test]
async fn test_missing_attachment_is_local_error() {
    let (_server, backend) = common::setup_testrail().await;

    let err = backend
        .upload_attachment(&id("9"), std::path::Path::new("/nonexistent/report.html"))
        .await
        .unwrap_err();
    assert!(err.status.is_none());
    assert!(err.remote_message.contains("report.html"));
}

// ============================================================================
// Errors
// ============================================================================

#[tokio::test]
async fn test_error_status_carries_remote_message() {
    let (server, backend) = common::setup_testrail().await;

    Mock::given(method("POST"))
        .and(testrail_api("add_section/1"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "Field :suite_id is not a valid test suite."
        })))
        .mount(&server)
        .await;

    let suite: SuiteId = id("999");
    let err = backend.add_section(&suite, "Checkout").await.unwrap_err();
    assert_eq!(err.operation, "add_section");
    assert_eq!(err.status, Some(400));
    assert_eq!(err.remote_message, "Field :suite_id is not a valid test suite.");
}

#[tokio::test]
async fn test_success_status_with_error_field_is_an_error() {
    let (server, backend) = common::setup_testrail().await;

    Mock::given(method("POST"))
        .and(testrail_api("update_suite/10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": "No permissions to modify suites"
        })))
        .mount(&server)
        .await;

    let err = backend.update_suite(&id("10"), "text").await.unwrap_err();
    assert_eq!(err.status, Some(200));
    assert_eq!(err.remote_message, "No permissions to modify suites");
}
