//! Import synchronizer against the recording backend

use std::sync::Arc;

use tmsync_core::domain::{CaseId, Step};
use tmsync_sync::Synchronizer;

use crate::common::{self, Call, MemoryStore, MockBackend};

fn case(id: &str) -> CaseId {
    CaseId::new(id).unwrap()
}

fn setup(prune: bool) -> (Arc<MockBackend>, Arc<MemoryStore>, Synchronizer) {
    let backend = MockBackend::new();
    let store = MemoryStore::new();
    let sync = Synchronizer::new(backend.clone(), store.clone(), &common::config(prune));
    (backend, store, sync)
}

#[tokio::test]
async fn test_first_import_creates_suite_section_and_cases() {
    let (backend, store, sync) = setup(false);
    let artifact = common::artifact("plans/login.yaml", &["A", "B"]);

    let report = sync.import(&artifact).await.unwrap();
    assert!(report.is_ok());
    assert!(report.suite_created);
    assert_eq!(report.created, 2);
    assert!(!report.reordered);

    assert_eq!(
        backend.calls(),
        vec![
            Call::CreateSuite("Suite plans/login.yaml".to_string()),
            Call::AddSection("Suite plans/login.yaml".to_string()),
            Call::CreateCase("A".to_string()),
            Call::CreateCase("B".to_string()),
        ]
    );

    let state = store.snapshot();
    let entry = state.find_entry("plans/login.yaml").unwrap();
    assert_eq!(entry.suite_id.as_str(), "S1");
    assert_eq!(entry.section_id.as_ref().unwrap().as_str(), "SEC2");
    assert_eq!(entry.ordered_case_ids(), vec![case("C3"), case("C4")]);
    assert!(entry.is_consistent());

    let descriptions = backend.suite_descriptions();
    assert_eq!(descriptions.len(), 1);
    assert!(descriptions[0].contains("Project: demo"));
    assert!(descriptions[0].contains("File: plans/login.yaml"));
    assert!(descriptions[0].contains("Created by: tmsync"));
}

#[tokio::test]
async fn test_second_import_of_unchanged_artifact_is_idempotent() {
    let (backend, store, sync) = setup(false);
    let artifact = common::artifact("plans/login.yaml", &["A", "B"]);
    sync.import(&artifact).await.unwrap();
    let before = store.snapshot();
    backend.reset_calls();

    let report = sync.import(&artifact).await.unwrap();
    assert_eq!(report.unchanged, 2);
    assert!(backend.calls().is_empty());
    assert_eq!(store.snapshot(), before);
}

#[tokio::test]
async fn test_changed_step_updates_recorded_case_only() {
    let (backend, _store, sync) = setup(false);
    let mut artifact = common::artifact("plans/login.yaml", &["A", "B"]);
    sync.import(&artifact).await.unwrap();
    backend.reset_calls();

    artifact.scenarios[1].steps[0].description = "run B twice".to_string();
    let report = sync.import(&artifact).await.unwrap();

    assert_eq!(report.updated, 1);
    assert_eq!(report.created, 0);
    assert_eq!(backend.calls(), vec![Call::UpdateCase(case("C4"))]);
}

#[tokio::test]
async fn test_new_scenario_is_created_and_recorded() {
    let (backend, store, sync) = setup(false);
    sync.import(&common::artifact("plans/login.yaml", &["A", "B"]))
        .await
        .unwrap();
    backend.reset_calls();

    let report = sync
        .import(&common::artifact("plans/login.yaml", &["A", "B", "C"]))
        .await
        .unwrap();

    assert_eq!(report.created, 1);
    assert!(!report.reordered);
    assert_eq!(backend.calls(), vec![Call::CreateCase("C".to_string())]);

    let state = store.snapshot();
    let entry = state.find_entry("plans/login.yaml").unwrap();
    assert_eq!(entry.case_id("C"), Some(&case("C5")));
    assert!(entry.fingerprint("C").unwrap().is_known());
}

#[tokio::test]
async fn test_swapped_scenarios_issue_one_reorder() {
    let (backend, store, sync) = setup(false);
    sync.import(&common::artifact("plans/login.yaml", &["A", "B"]))
        .await
        .unwrap();
    backend.reset_calls();

    let report = sync
        .import(&common::artifact("plans/login.yaml", &["B", "A"]))
        .await
        .unwrap();

    assert!(report.reordered);
    assert_eq!(report.unchanged, 2);
    assert_eq!(backend.calls(), vec![Call::Reorder(vec![case("C4"), case("C3")])]);
    assert_eq!(
        store
            .snapshot()
            .find_entry("plans/login.yaml")
            .unwrap()
            .scenario_names(),
        vec!["B", "A"]
    );

    backend.reset_calls();
    sync.import(&common::artifact("plans/login.yaml", &["B", "A"]))
        .await
        .unwrap();
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn test_inserted_scenario_is_reordered_into_place() {
    let (backend, _store, sync) = setup(false);
    sync.import(&common::artifact("plans/login.yaml", &["A", "B"]))
        .await
        .unwrap();
    backend.reset_calls();

    sync.import(&common::artifact("plans/login.yaml", &["A", "N", "B"]))
        .await
        .unwrap();

    assert_eq!(
        backend.calls(),
        vec![
            Call::CreateCase("N".to_string()),
            Call::Reorder(vec![case("C3"), case("C5"), case("C4")]),
        ]
    );
}

#[tokio::test]
async fn test_removed_scenario_is_orphaned_without_pruning() {
    let (backend, store, sync) = setup(false);
    sync.import(&common::artifact("plans/login.yaml", &["A", "B"]))
        .await
        .unwrap();
    backend.reset_calls();

    let report = sync
        .import(&common::artifact("plans/login.yaml", &["A"]))
        .await
        .unwrap();

    assert_eq!(report.orphaned, 1);
    assert_eq!(report.deleted, 0);
    assert!(backend.calls().is_empty());
    let state = store.snapshot();
    let entry = state.find_entry("plans/login.yaml").unwrap();
    assert!(entry.case_id("B").is_none());
    assert!(entry.is_consistent());
}

#[tokio::test]
async fn test_removed_scenario_is_deleted_when_pruning() {
    let (backend, _store, sync) = setup(true);
    sync.import(&common::artifact("plans/login.yaml", &["A", "B"]))
        .await
        .unwrap();
    backend.reset_calls();

    let report = sync
        .import(&common::artifact("plans/login.yaml", &["B"]))
        .await
        .unwrap();

    assert_eq!(report.deleted, 1);
    assert!(!report.reordered);
    assert_eq!(backend.calls(), vec![Call::DeleteCase(case("C3"))]);
}

#[tokio::test]
async fn test_renamed_scenario_creates_new_case() {
    let (backend, _store, sync) = setup(false);
    sync.import(&common::artifact("plans/login.yaml", &["A", "B"]))
        .await
        .unwrap();
    backend.reset_calls();

    let report = sync
        .import(&common::artifact("plans/login.yaml", &["A", "B2"]))
        .await
        .unwrap();

    assert_eq!(report.created, 1);
    assert_eq!(report.orphaned, 1);
    assert_eq!(backend.calls(), vec![Call::CreateCase("B2".to_string())]);
}

#[tokio::test]
async fn test_suite_description_change_updates_suite() {
    let (backend, _store, sync) = setup(false);
    let artifact = common::artifact("plans/login.yaml", &["A"]);
    sync.import(&artifact).await.unwrap();
    backend.reset_calls();

    let report = sync
        .import(&artifact.with_description("Now with a description"))
        .await
        .unwrap();

    assert!(report.suite_updated);
    assert_eq!(
        backend.calls(),
        vec![Call::UpdateSuite(tmsync_core::domain::SuiteId::new("S1").unwrap())]
    );
    let pushed = backend.suite_descriptions().pop().unwrap();
    assert!(pushed.starts_with("Now with a description\n\nCreated by: tmsync"));
}

#[tokio::test]
async fn test_section_failure_does_not_stop_next_artifact() {
    let (backend, store, sync) = setup(false);
    backend.fail_on("add_section", "Suite plans/a.yaml");

    let artifacts = vec![
        common::artifact("plans/a.yaml", &["A1"]),
        common::artifact("plans/b.yaml", &["B1", "B2"]),
    ];
    let report = sync.import_all(&artifacts).await.unwrap();

    assert!(report.has_errors());
    let failed = &report.artifacts[0];
    assert_eq!(failed.error.as_ref().unwrap().operation, "add_section");
    assert_eq!(failed.created, 0);
    assert!(report.artifacts[1].is_ok());
    assert_eq!(report.artifacts[1].created, 2);
    assert_eq!(store.saves(), 1);

    let state = store.snapshot();
    let a = state.find_entry("plans/a.yaml").unwrap();
    assert!(a.section_id.is_none());
    assert!(a.scenarios.is_empty());
    assert_eq!(state.find_entry("plans/b.yaml").unwrap().scenarios.len(), 2);

    backend.clear_failures();
    backend.reset_calls();
    let report = sync.import_all(&artifacts).await.unwrap();
    assert!(!report.has_errors());
    assert!(!report.artifacts[0].suite_created);
    assert_eq!(
        backend.calls(),
        vec![
            Call::AddSection("Suite plans/a.yaml".to_string()),
            Call::CreateCase("A1".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_case_failure_keeps_earlier_cases() {
    let (backend, store, sync) = setup(false);
    backend.fail_on("add_case", "B");
    let artifact = common::artifact("plans/login.yaml", &["A", "B", "C"]);

    let report = sync.import(&artifact).await.unwrap();
    assert_eq!(report.created, 1);
    assert_eq!(report.error.as_ref().unwrap().operation, "add_case");

    let state = store.snapshot();
    let entry = state.find_entry("plans/login.yaml").unwrap();
    assert_eq!(entry.scenario_names(), vec!["A"]);

    backend.clear_failures();
    backend.reset_calls();
    let report = sync.import(&artifact).await.unwrap();
    assert_eq!(report.created, 2);
    assert_eq!(report.unchanged, 1);
    assert!(!backend
        .calls()
        .contains(&Call::CreateCase("A".to_string())));
}

#[tokio::test]
async fn test_half_created_case_is_resumed_not_duplicated() {
    let (backend, store, sync) = setup(false);
    backend.fail_on("link_case", "B");
    let artifact = common::artifact("plans/login.yaml", &["A", "B"]);

    let report = sync.import(&artifact).await.unwrap();
    assert_eq!(report.created, 1);
    assert_eq!(report.error.as_ref().unwrap().operation, "link_case");

    let state = store.snapshot();
    let entry = state.find_entry("plans/login.yaml").unwrap();
    assert_eq!(entry.case_id("B"), Some(&case("C4")));
    assert!(!entry.fingerprint("B").unwrap().is_known());
    assert!(entry.is_consistent());

    backend.clear_failures();
    backend.reset_calls();
    let report = sync.import(&artifact).await.unwrap();
    assert!(report.is_ok());
    assert_eq!(report.updated, 1);
    assert_eq!(report.unchanged, 1);
    assert_eq!(
        backend.calls(),
        vec![Call::UpdateCase(case("C4")), Call::LinkCase(case("C4"))]
    );

    backend.reset_calls();
    sync.import(&artifact).await.unwrap();
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn test_failed_suite_creation_leaves_no_entry() {
    let (backend, store, sync) = setup(false);
    backend.fail_on("create_suite", "Suite plans/login.yaml");

    let report = sync
        .import(&common::artifact("plans/login.yaml", &["A"]))
        .await
        .unwrap();

    assert!(report.suite_id.is_none());
    assert!(report.error.is_some());
    assert!(store.snapshot().is_empty());
}

#[tokio::test]
async fn test_dry_run_has_no_side_effects() {
    let (backend, store, sync) = setup(false);
    let mut artifact = common::artifact("plans/login.yaml", &["A", "B"]);
    sync.import(&artifact).await.unwrap();
    backend.reset_calls();
    let saves = store.saves();

    artifact.scenarios[0]
        .steps
        .push(Step::new("one more step"));
    let plan = sync.plan(&artifact).await.unwrap();

    assert_eq!(plan.update, vec!["A"]);
    assert_eq!(plan.unchanged, vec!["B"]);
    assert!(backend.calls().is_empty());
    assert_eq!(store.saves(), saves);
}

#[tokio::test]
async fn test_unchanged_import_has_no_case_mutations_across_artifacts() {
    let (backend, _store, sync) = setup(true);
    let artifacts = vec![
        common::artifact("plans/a.yaml", &["A1", "A2"]),
        common::artifact("plans/b.yaml", &["B1"]),
    ];
    sync.import_all(&artifacts).await.unwrap();
    backend.reset_calls();

    sync.import_all(&artifacts).await.unwrap();
    assert!(!backend.calls().iter().any(Call::mutates_cases));
}
