//! Integration tests for the Azure DevOps adapter

use std::io::Write;

use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use tmsync_core::domain::{CaseContainer, CaseId, RunId, SectionId, SuiteId};
use tmsync_core::ports::ITmsBackend;

use crate::common;

const BASE: &str = "/acme/Shop/_apis";

fn suite(raw: &str) -> SuiteId {
    SuiteId::new(raw).unwrap()
}

#[tokio::test]
async fn test_create_suite_creates_test_plan() {
    let (server, backend) = common::setup_azure().await;

    Mock::given(method("POST"))
        .and(path(format!("{BASE}/testplan/plans")))
        .and(query_param("api-version", "7.0"))
        .and(body_partial_json(json!({ "name": "Checkout" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 31,
            "name": "Checkout",
            "rootSuite": { "id": 32 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let created = backend.create_suite("Checkout", "").await.unwrap();
    assert_eq!(created.id.as_str(), "31");
    assert!(created
        .url
        .unwrap()
        .ends_with("/acme/Shop/_testPlans/define?planId=31"));
}

#[tokio::test]
async fn test_add_section_creates_static_suite_under_root() {
    let (server, backend) = common::setup_azure().await;

    Mock::given(method("GET"))
        .and(path(format!("{BASE}/testplan/plans/31")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 31,
            "rootSuite": { "id": 32 }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{BASE}/testplan/Plans/31/suites")))
        .and(body_partial_json(json!({
            "suiteType": "staticTestSuite",
            "name": "Checkout",
            "parentSuite": { "id": 32 }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 40 })))
        .expect(1)
        .mount(&server)
        .await;

    let section = backend.add_section(&suite("31"), "Checkout").await.unwrap();
    assert_eq!(section.as_str(), "40");
}

#[tokio::test]
async fn test_new_case_is_work_item_added_to_suite() {
    let (server, backend) = common::setup_azure().await;

    Mock::given(method("POST"))
        .and(path(format!("{BASE}/wit/workitems/$Test%20Case")))
        .and(header("content-type", "application/json-patch+json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 501 })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{BASE}/testplan/Plans/31/Suites/40/TestCase")))
        .and(body_partial_json(json!([{ "workItem": { "id": 501 } }])))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let container = CaseContainer::new(suite("31"), Some(SectionId::new("40").unwrap()));
    let case_id = backend
        .add_or_update_case(&container, &common::login_draft(), None)
        .await
        .unwrap();
    assert_eq!(case_id.as_str(), "501");

    let requests = server.received_requests().await.unwrap();
    let patch: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(patch[0]["path"], "/fields/System.Title");
    assert_eq!(patch[0]["value"], "Login");
    let steps = patch[2]["value"].as_str().unwrap();
    assert!(steps.contains(r#"<step id="3" type="ActionStep">"#));
}

#[tokio::test]
async fn test_failed_suite_link_reports_created_work_item() {
    let (server, backend) = common::setup_azure().await;

    Mock::given(method("POST"))
        .and(path(format!("{BASE}/wit/workitems/$Test%20Case")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 501 })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{BASE}/testplan/Plans/31/Suites/40/TestCase")))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "message": "boom" })))
        .expect(1)
        .mount(&server)
        .await;

    let container = CaseContainer::new(suite("31"), Some(SectionId::new("40").unwrap()));
    let err = backend
        .add_or_update_case(&container, &common::login_draft(), None)
        .await
        .unwrap_err();

    assert_eq!(err.operation, "add_test_case_to_suite");
    assert_eq!(err.remote_message, "boom");
    assert_eq!(err.created_case, Some(CaseId::new("501").unwrap()));
}

#[tokio::test]
async fn test_link_case_adds_existing_work_item_to_suite() {
    let (server, backend) = common::setup_azure().await;

    Mock::given(method("POST"))
        .and(path(format!("{BASE}/testplan/Plans/31/Suites/40/TestCase")))
        .and(body_partial_json(json!([{ "workItem": { "id": 501 } }])))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let container = CaseContainer::new(suite("31"), Some(SectionId::new("40").unwrap()));
    backend
        .link_case(&container, &CaseId::new("501").unwrap())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_existing_case_is_patched() {
    let (server, backend) = common::setup_azure().await;

    Mock::given(method("PATCH"))
        .and(path(format!("{BASE}/wit/workitems/501")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 501 })))
        .expect(1)
        .mount(&server)
        .await;

    let container = CaseContainer::new(suite("31"), Some(SectionId::new("40").unwrap()));
    let existing = CaseId::new("501").unwrap();
    let case_id = backend
        .add_or_update_case(&container, &common::login_draft(), Some(&existing))
        .await
        .unwrap();
    assert_eq!(case_id, existing);
}

#[tokio::test]
async fn test_delete_case() {
    let (server, backend) = common::setup_azure().await;

    Mock::given(method("DELETE"))
        .and(path(format!("{BASE}/test/testcases/501")))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    backend
        .delete_case(&CaseId::new("501").unwrap())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_reorder_sets_sequence_numbers() {
    let (server, backend) = common::setup_azure().await;

    Mock::given(method("PATCH"))
        .and(path(format!("{BASE}/testplan/suiteentry/40")))
        .and(body_partial_json(json!([
            { "id": 502, "sequenceNumber": 0 },
            { "id": 501, "sequenceNumber": 1 }
        ])))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let ordered = vec![CaseId::new("502").unwrap(), CaseId::new("501").unwrap()];
    let section = SectionId::new("40").unwrap();
    backend
        .reorder_cases(&suite("31"), Some(&section), &ordered)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_active_runs_skip_completed() {
    let (server, backend) = common::setup_azure().await;

    Mock::given(method("GET"))
        .and(path(format!("{BASE}/test/runs")))
        .and(query_param("planId", "31"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 2,
            "value": [
                { "id": 900, "name": "Checkout", "state": "Completed" },
                { "id": 901, "name": "Checkout", "state": "InProgress", "webAccessUrl": "https://dev/runs/901" }
            ]
        })))
        .mount(&server)
        .await;

    let runs = backend.get_active_runs(&suite("31")).await.unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].id.as_str(), "901");
    assert_eq!(runs[0].url.as_deref(), Some("https://dev/runs/901"));
}

#[tokio::test]
async fn test_close_run_marks_completed() {
    let (server, backend) = common::setup_azure().await;

    Mock::given(method("PATCH"))
        .and(path(format!("{BASE}/test/runs/901")))
        .and(body_partial_json(json!({ "state": "Completed" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 901 })))
        .expect(1)
        .mount(&server)
        .await;

    backend.close_run(&RunId::new("901").unwrap()).await.unwrap();
}

#[tokio::test]
async fn test_attachment_is_base64_stream() {
    let (server, backend) = common::setup_azure().await;

    Mock::given(method("POST"))
        .and(path(format!("{BASE}/test/Runs/901/attachments")))
        .and(body_partial_json(json!({ "stream": "aGVsbG8=" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 1 })))
        .expect(1)
        .mount(&server)
        .await;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"hello").unwrap();
    file.flush().unwrap();

    backend
        .upload_attachment(&RunId::new("901").unwrap(), file.path())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_error_message_field_is_reported() {
    let (server, backend) = common::setup_azure().await;

    Mock::given(method("POST"))
        .and(path(format!("{BASE}/testplan/plans")))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "$id": "1",
            "message": "TF400813: The user is not authorized to access this resource."
        })))
        .mount(&server)
        .await;

    let err = backend.create_suite("Checkout", "").await.unwrap_err();
    assert_eq!(err.status, Some(401));
    assert!(err.remote_message.starts_with("TF400813"));
}
