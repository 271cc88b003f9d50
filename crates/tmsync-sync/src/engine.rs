//! Import synchronizer
//!
//! The [`Synchronizer`] pushes local test artifacts to the remote TMS and
//! records the local/remote correspondence in the sync-state document.
//!
//! ## Per-artifact flow
//!
//! 1. **Suite**: reuse the recorded suite or create one; push the suite
//!    description when its fingerprint changed
//! 2. **Section**: reuse the recorded section or create one named after the suite
//! 3. **Cases**: per scenario, diff its fingerprint against the recorded one
//!    (new: create, changed: update in place, unchanged: no remote call)
//! 4. **Removed scenarios**: forget them (deleting the remote case when pruning)
//! 5. **Order**: reorder remote cases only when the local order differs from
//!    the order the remote is presumed to have
//!
//! A failing remote call aborts the rest of its artifact only. Everything
//! that succeeded before it is kept in the entry, and the document is saved
//! once after all artifacts were processed.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use tmsync_core::config::Config;
use tmsync_core::domain::{
    fingerprint, fingerprint_text, CaseContainer, CaseDraft, CaseId, FileEntry, Fingerprint,
    OriginStamp, SuiteId, SyncState, TestArtifact,
};
use tmsync_core::ports::{IStateStore, ITmsBackend, TmsError, TmsResult};

use crate::{is_gone, SyncError};

// ============================================================================
// Reports
// ============================================================================

/// Outcome of synchronizing one artifact
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactReport {
    /// Artifact key
    pub path: String,
    /// Remote suite, once known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suite_id: Option<SuiteId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suite_url: Option<String>,
    pub suite_created: bool,
    pub suite_updated: bool,
    pub created: u32,
    pub updated: u32,
    pub unchanged: u32,
    /// Remote cases deleted because their scenario disappeared
    pub deleted: u32,
    /// Scenarios dropped from the state while their remote case was kept
    pub orphaned: u32,
    pub reordered: bool,
    /// First failure; the remaining steps of the artifact were skipped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<TmsError>,
}

impl ArtifactReport {
    fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            ..Self::default()
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Outcome of one import invocation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub artifacts: Vec<ArtifactReport>,
}

impl ImportReport {
    /// Returns true when any artifact failed
    pub fn has_errors(&self) -> bool {
        self.artifacts.iter().any(|a| !a.is_ok())
    }

    /// Reports of the failed artifacts
    pub fn failures(&self) -> impl Iterator<Item = &ArtifactReport> {
        self.artifacts.iter().filter(|a| !a.is_ok())
    }
}

/// Actions an import would take for one artifact (dry run)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactPlan {
    pub path: String,
    pub create_suite: bool,
    pub update_suite: bool,
    pub create_section: bool,
    pub create: Vec<String>,
    pub update: Vec<String>,
    pub unchanged: Vec<String>,
    /// Recorded scenarios that no longer exist locally
    pub removed: Vec<String>,
    /// Whether removed scenarios would have their remote case deleted
    pub prune: bool,
    pub reorder: bool,
}

impl ArtifactPlan {
    /// Returns true when an import would not call the backend at all
    pub fn is_noop(&self) -> bool {
        !self.create_suite
            && !self.update_suite
            && !self.create_section
            && self.create.is_empty()
            && self.update.is_empty()
            && (self.removed.is_empty() || !self.prune)
            && !self.reorder
    }
}

/// Outcome of removing an artifact
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemovalReport {
    pub path: String,
    pub deleted: Vec<CaseId>,
    /// Cases whose deletion failed; they stay recorded for a re-run
    pub failed: Vec<TmsError>,
    /// Whether the entry left the state document
    pub entry_removed: bool,
}

// ============================================================================
// Synchronizer
// ============================================================================

/// Import orchestrator
///
/// ## Dependencies
///
/// - `backend`: remote TMS operations
/// - `store`: sync-state persistence, loaded and saved once per call
pub struct Synchronizer {
    backend: Arc<dyn ITmsBackend>,
    store: Arc<dyn IStateStore>,
    project_id: String,
    prune_removed: bool,
    user: String,
}

impl Synchronizer {
    /// Creates a synchronizer for the configured project
    ///
    /// # Arguments
    /// * `backend` - Remote TMS adapter (see `tmsync_backends::create_backend`)
    /// * `store` - Sync-state store
    /// * `config` - Project id and pruning policy
    pub fn new(backend: Arc<dyn ITmsBackend>, store: Arc<dyn IStateStore>, config: &Config) -> Self {
        Self {
            backend,
            store,
            project_id: config.project.id.clone(),
            prune_removed: config.sync.prune_removed_scenarios,
            user: config.backend.user.clone(),
        }
    }

    /// Sets the user named in the origin stamp of created cases
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    /// Synchronizes one artifact
    pub async fn import(&self, artifact: &TestArtifact) -> Result<ArtifactReport> {
        let mut report = self.import_all(std::slice::from_ref(artifact)).await?;
        report
            .artifacts
            .pop()
            .context("import produced no report")
    }

    /// Synchronizes artifacts in order and saves the state once
    ///
    /// # Errors
    /// Only loading or saving the state document fails the whole call;
    /// remote failures are reported per artifact.
    #[instrument(skip(self, artifacts), fields(project = %self.project_id, count = artifacts.len()))]
    pub async fn import_all(&self, artifacts: &[TestArtifact]) -> Result<ImportReport> {
        let mut state = self
            .store
            .load(&self.project_id)
            .await
            .context("Failed to load sync state")?;

        let mut report = ImportReport::default();
        for artifact in artifacts {
            let artifact_report = self.sync_artifact(&mut state, artifact).await;
            match &artifact_report.error {
                Some(err) => warn!(path = %artifact.path, error = %err, "Artifact sync failed"),
                None => info!(
                    path = %artifact.path,
                    created = artifact_report.created,
                    updated = artifact_report.updated,
                    unchanged = artifact_report.unchanged,
                    reordered = artifact_report.reordered,
                    "Artifact synchronized"
                ),
            }
            report.artifacts.push(artifact_report);
        }

        self.store
            .save(&state)
            .await
            .context("Failed to save sync state")?;
        Ok(report)
    }

    /// Computes what an import of `artifacts` would do, without side effects
    pub async fn plan_all(&self, artifacts: &[TestArtifact]) -> Result<Vec<ArtifactPlan>> {
        let state = self
            .store
            .load(&self.project_id)
            .await
            .context("Failed to load sync state")?;
        Ok(artifacts
            .iter()
            .map(|a| plan_artifact(state.find_entry(&a.path), a, self.prune_removed))
            .collect())
    }

    /// Dry run of a single artifact
    pub async fn plan(&self, artifact: &TestArtifact) -> Result<ArtifactPlan> {
        let mut plans = self.plan_all(std::slice::from_ref(artifact)).await?;
        plans.pop().context("plan produced no result")
    }

    /// Deletes the remote cases of an artifact and forgets it
    ///
    /// Deletion is best effort. The entry leaves the state document only when
    /// every case is gone; otherwise the remaining cases stay recorded.
    #[instrument(skip(self), fields(project = %self.project_id))]
    pub async fn remove(&self, path: &str) -> Result<RemovalReport> {
        let mut state = self
            .store
            .load(&self.project_id)
            .await
            .context("Failed to load sync state")?;
        let mut entry = state
            .find_entry(path)
            .cloned()
            .ok_or_else(|| SyncError::UnknownArtifact(path.to_string()))?;

        let mut report = RemovalReport {
            path: path.to_string(),
            ..RemovalReport::default()
        };
        let names: Vec<String> = entry.scenario_names().into_iter().map(String::from).collect();
        for name in names {
            let Some(case_id) = entry.case_id(&name).cloned() else {
                continue;
            };
            match self.delete_case(&case_id).await {
                Ok(()) => {
                    entry.forget_case(&name);
                    report.deleted.push(case_id);
                }
                Err(err) => {
                    warn!(case_id = %case_id, error = %err, "Failed to delete case");
                    report.failed.push(err);
                }
            }
        }

        if report.failed.is_empty() {
            state.remove_entry(path);
            report.entry_removed = true;
            info!(path, deleted = report.deleted.len(), "Artifact removed");
        } else {
            state.upsert_entry(entry);
        }

        self.store
            .save(&state)
            .await
            .context("Failed to save sync state")?;
        Ok(report)
    }

    // ========================================================================
    // Per-artifact steps
    // ========================================================================

    async fn sync_artifact(&self, state: &mut SyncState, artifact: &TestArtifact) -> ArtifactReport {
        let mut report = ArtifactReport::new(&artifact.path);

        let mut entry = match state.find_entry(&artifact.path).cloned() {
            Some(entry) => entry,
            None => match self.create_suite(artifact).await {
                Ok(entry) => {
                    report.suite_created = true;
                    entry
                }
                Err(err) => {
                    report.error = Some(err);
                    return report;
                }
            },
        };
        report.suite_id = Some(entry.suite_id.clone());
        report.suite_url = entry.suite_url.clone();

        let result = self.sync_entry(artifact, &mut entry, &mut report).await;
        state.upsert_entry(entry);
        if let Err(err) = result {
            report.error = Some(err);
        }
        report
    }

    async fn create_suite(&self, artifact: &TestArtifact) -> TmsResult<FileEntry> {
        let description = artifact.description.as_deref().unwrap_or_default();
        let origin = OriginStamp::now(&self.project_id, &artifact.path, &self.user);
        let suite = self
            .backend
            .create_suite(&artifact.name, &origin.stamp(description))
            .await?;
        info!(path = %artifact.path, suite_id = %suite.id, "Created suite");

        let mut entry = FileEntry::new(&artifact.path, suite.id, &artifact.name, suite.url);
        entry.suite_fingerprint = Some(fingerprint_text(description));
        Ok(entry)
    }

    async fn sync_entry(
        &self,
        artifact: &TestArtifact,
        entry: &mut FileEntry,
        report: &mut ArtifactReport,
    ) -> TmsResult<()> {
        let description = artifact.description.as_deref().unwrap_or_default();
        let suite_fingerprint = fingerprint_text(description);
        if entry.suite_fingerprint.as_ref() != Some(&suite_fingerprint) {
            let origin = OriginStamp::now(&self.project_id, &artifact.path, &self.user);
            self.backend
                .update_suite(&entry.suite_id, &origin.stamp(description))
                .await?;
            entry.suite_fingerprint = Some(suite_fingerprint);
            report.suite_updated = true;
        }

        let section_id = match &entry.section_id {
            Some(section) => section.clone(),
            None => {
                let section = self
                    .backend
                    .add_section(&entry.suite_id, &entry.suite_name)
                    .await?;
                debug!(suite_id = %entry.suite_id, section_id = %section, "Created section");
                entry.section_id = Some(section.clone());
                section
            }
        };
        let container = CaseContainer::new(entry.suite_id.clone(), Some(section_id));

        for scenario in &artifact.scenarios {
            let current = fingerprint(scenario);
            match entry.case_id(&scenario.name).cloned() {
                None => {
                    let origin = OriginStamp::now(&self.project_id, &artifact.path, &self.user);
                    let draft = CaseDraft::from_scenario(scenario, Some(&origin));
                    let case_id = match self
                        .backend
                        .add_or_update_case(&container, &draft, None)
                        .await
                    {
                        Ok(case_id) => case_id,
                        Err(mut err) => {
                            // Keep the half-created case; the unknown fingerprint
                            // makes the next run update and attach it.
                            if let Some(case_id) = err.created_case.take() {
                                warn!(
                                    scenario = %scenario.name,
                                    case_id = %case_id,
                                    "Case created but not attached, will resume on next import"
                                );
                                entry.record_case(&scenario.name, case_id, Fingerprint::unknown());
                            }
                            return Err(err);
                        }
                    };
                    debug!(scenario = %scenario.name, case_id = %case_id, "Created case");
                    entry.record_case(&scenario.name, case_id, current);
                    report.created += 1;
                }
                Some(case_id) if entry.fingerprint(&scenario.name) != Some(&current) => {
                    let unattached = entry
                        .fingerprint(&scenario.name)
                        .map_or(true, |recorded| !recorded.is_known());
                    let origin = OriginStamp::now(&self.project_id, &artifact.path, &self.user);
                    let draft = CaseDraft::from_scenario(scenario, Some(&origin));
                    let case_id = self
                        .backend
                        .add_or_update_case(&container, &draft, Some(&case_id))
                        .await?;
                    if unattached {
                        self.backend.link_case(&container, &case_id).await?;
                    }
                    debug!(scenario = %scenario.name, case_id = %case_id, "Updated case");
                    entry.record_case(&scenario.name, case_id, current);
                    report.updated += 1;
                }
                Some(_) => report.unchanged += 1,
            }
        }

        let local: HashSet<&str> = artifact.scenario_names().into_iter().collect();
        let removed: Vec<String> = entry
            .scenario_names()
            .into_iter()
            .filter(|name| !local.contains(name))
            .map(String::from)
            .collect();
        for name in removed {
            if self.prune_removed {
                if let Some(case_id) = entry.case_id(&name).cloned() {
                    self.delete_case(&case_id).await?;
                    debug!(scenario = %name, case_id = %case_id, "Deleted case");
                }
                entry.forget_case(&name);
                report.deleted += 1;
            } else if let Some(case_id) = entry.forget_case(&name) {
                warn!(
                    path = %artifact.path,
                    scenario = %name,
                    case_id = %case_id,
                    "Scenario removed locally, remote case left in place"
                );
                report.orphaned += 1;
            }
        }

        // The remote holds the last pushed order minus removed cases, followed
        // by the cases created above; that is the entry's current order.
        let local_order = artifact.scenario_names();
        if entry.scenario_names() != local_order {
            let ordered: Vec<CaseId> = local_order
                .iter()
                .filter_map(|name| entry.case_id(name).cloned())
                .collect();
            self.backend
                .reorder_cases(&entry.suite_id, container.section_id.as_ref(), &ordered)
                .await?;
            entry.reorder(&local_order);
            report.reordered = true;
        }

        Ok(())
    }

    async fn delete_case(&self, case_id: &CaseId) -> TmsResult<()> {
        match self.backend.delete_case(case_id).await {
            Err(err) if is_gone(&err) => {
                debug!(case_id = %case_id, "Case already gone remotely");
                Ok(())
            }
            other => other,
        }
    }
}

/// Diffs an artifact against its recorded entry
pub fn plan_artifact(entry: Option<&FileEntry>, artifact: &TestArtifact, prune: bool) -> ArtifactPlan {
    let mut plan = ArtifactPlan {
        path: artifact.path.clone(),
        prune,
        ..ArtifactPlan::default()
    };

    let Some(entry) = entry else {
        plan.create_suite = true;
        plan.create_section = true;
        plan.create = artifact.scenario_names().into_iter().map(String::from).collect();
        return plan;
    };

    let description = artifact.description.as_deref().unwrap_or_default();
    plan.update_suite = entry.suite_fingerprint.as_ref() != Some(&fingerprint_text(description));
    plan.create_section = entry.section_id.is_none();

    for scenario in &artifact.scenarios {
        let name = scenario.name.clone();
        match entry.fingerprint(&scenario.name) {
            _ if entry.case_id(&scenario.name).is_none() => plan.create.push(name),
            Some(recorded) if *recorded == fingerprint(scenario) => plan.unchanged.push(name),
            _ => plan.update.push(name),
        }
    }

    let local: HashSet<&str> = artifact.scenario_names().into_iter().collect();
    plan.removed = entry
        .scenario_names()
        .into_iter()
        .filter(|name| !local.contains(name))
        .map(String::from)
        .collect();

    let presumed: Vec<&str> = entry
        .scenario_names()
        .into_iter()
        .filter(|name| local.contains(name))
        .chain(plan.create.iter().map(String::as_str))
        .collect();
    plan.reorder = presumed != artifact.scenario_names();
    plan
}
