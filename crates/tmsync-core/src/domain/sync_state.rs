//! Synchronization state document
//!
//! The [`SyncState`] is the single source of truth for "which remote entity
//! corresponds to which local entity". One document exists per project and
//! holds one [`FileEntry`] per synchronized artifact.
//!
//! ## Invariants
//!
//! - `FileEntry::cache` and `FileEntry::scenarios` are kept in lock-step:
//!   every scenario reference has a fingerprint and every fingerprint has a
//!   scenario reference. All mutation goes through [`FileEntry::record_case`]
//!   and [`FileEntry::forget_case`]; documents read from disk are brought back
//!   in line with [`SyncState::repair`].
//! - `FileEntry::scenarios` is stored in the last synchronized local order,
//!   which is also the order last pushed to the backend.
//!
//! The document is backward-readable: unknown fields are ignored and missing
//! optional fields default to absent.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::fingerprint::Fingerprint;
use super::newtypes::{CaseId, SectionId, SuiteId};

/// A synchronized scenario and the remote case it maps to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioRef {
    /// Scenario name (identity within the artifact)
    pub name: String,
    /// Remote case identifier
    pub case_id: CaseId,
}

/// Remote mapping of one local artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    /// Artifact key (file path, optionally `#subplan`)
    pub path: String,
    /// Remote suite identifier
    pub suite_id: SuiteId,
    /// Remote suite name, also used as the run name
    pub suite_name: String,
    /// Browser URL of the remote suite
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suite_url: Option<String>,
    /// Remote section holding the cases
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_id: Option<SectionId>,
    /// Fingerprint of the suite description last pushed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suite_fingerprint: Option<Fingerprint>,
    /// Scenario name -> fingerprint of the last synced content
    #[serde(default)]
    pub cache: BTreeMap<String, Fingerprint>,
    /// Synced scenarios in their last synchronized order
    #[serde(default)]
    pub scenarios: Vec<ScenarioRef>,
}

impl FileEntry {
    /// Creates an entry for a freshly created remote suite
    pub fn new(
        path: impl Into<String>,
        suite_id: SuiteId,
        suite_name: impl Into<String>,
        suite_url: Option<String>,
    ) -> Self {
        Self {
            path: path.into(),
            suite_id,
            suite_name: suite_name.into(),
            suite_url,
            section_id: None,
            suite_fingerprint: None,
            cache: BTreeMap::new(),
            scenarios: Vec::new(),
        }
    }

    /// Remote case id of a scenario, if it was ever synced
    pub fn case_id(&self, scenario: &str) -> Option<&CaseId> {
        self.scenarios
            .iter()
            .find(|s| s.name == scenario)
            .map(|s| &s.case_id)
    }

    /// Last synced fingerprint of a scenario
    pub fn fingerprint(&self, scenario: &str) -> Option<&Fingerprint> {
        self.cache.get(scenario)
    }

    /// Records a created or updated case
    ///
    /// An existing scenario keeps its position; a new one is appended, which
    /// matches where backends place newly created cases.
    pub fn record_case(&mut self, scenario: &str, case_id: CaseId, fingerprint: Fingerprint) {
        match self.scenarios.iter_mut().find(|s| s.name == scenario) {
            Some(existing) => existing.case_id = case_id,
            None => self.scenarios.push(ScenarioRef {
                name: scenario.to_string(),
                case_id,
            }),
        }
        self.cache.insert(scenario.to_string(), fingerprint);
    }

    /// Removes a scenario from both the cache and the references
    pub fn forget_case(&mut self, scenario: &str) -> Option<CaseId> {
        self.cache.remove(scenario);
        let index = self.scenarios.iter().position(|s| s.name == scenario)?;
        Some(self.scenarios.remove(index).case_id)
    }

    /// Case ids in stored order
    pub fn ordered_case_ids(&self) -> Vec<CaseId> {
        self.scenarios.iter().map(|s| s.case_id.clone()).collect()
    }

    /// Scenario names in stored order
    pub fn scenario_names(&self) -> Vec<&str> {
        self.scenarios.iter().map(|s| s.name.as_str()).collect()
    }

    /// Re-sorts the references to follow `order`
    ///
    /// Names not listed in `order` keep their relative order after the listed ones.
    pub fn reorder(&mut self, order: &[&str]) {
        let rank = |name: &str| order.iter().position(|o| *o == name).unwrap_or(usize::MAX);
        self.scenarios.sort_by_key(|s| rank(&s.name));
    }

    /// Restores the cache/scenarios lock-step
    ///
    /// A reference without a fingerprint receives the unknown fingerprint
    /// (forcing an update on the next sync, never a duplicate create). A
    /// fingerprint without a reference is dropped, as is a repeated reference.
    /// Returns a description of every repair made.
    pub fn repair(&mut self) -> Vec<String> {
        let mut repairs = Vec::new();

        let mut seen = std::collections::HashSet::new();
        self.scenarios.retain(|s| {
            let first = seen.insert(s.name.clone());
            if !first {
                repairs.push(format!("dropped duplicate reference '{}'", s.name));
            }
            first
        });

        for scenario in &self.scenarios {
            if !self.cache.contains_key(&scenario.name) {
                repairs.push(format!("missing fingerprint for '{}'", scenario.name));
                self.cache
                    .insert(scenario.name.clone(), Fingerprint::unknown());
            }
        }

        let names: std::collections::HashSet<&str> =
            self.scenarios.iter().map(|s| s.name.as_str()).collect();
        let orphaned: Vec<String> = self
            .cache
            .keys()
            .filter(|k| !names.contains(k.as_str()))
            .cloned()
            .collect();
        for name in orphaned {
            repairs.push(format!("dropped fingerprint without case for '{name}'"));
            self.cache.remove(&name);
        }

        repairs
    }

    /// Returns true when cache and scenarios are in lock-step
    pub fn is_consistent(&self) -> bool {
        self.cache.len() == self.scenarios.len()
            && self
                .scenarios
                .iter()
                .all(|s| self.cache.contains_key(&s.name))
    }
}

/// Persisted per-project synchronization document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncState {
    /// Local project identifier
    pub project_id: String,
    /// One entry per synchronized artifact
    #[serde(default)]
    pub files: Vec<FileEntry>,
}

impl SyncState {
    /// Creates an empty state (first sync)
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            files: Vec::new(),
        }
    }

    /// Looks up the entry of an artifact
    pub fn find_entry(&self, path: &str) -> Option<&FileEntry> {
        self.files.iter().find(|f| f.path == path)
    }

    /// Looks up the entry mapped to a remote suite
    pub fn find_by_suite(&self, suite_id: &SuiteId) -> Option<&FileEntry> {
        self.files.iter().find(|f| &f.suite_id == suite_id)
    }

    /// Inserts an entry or replaces the one with the same path in place
    pub fn upsert_entry(&mut self, entry: FileEntry) {
        match self.files.iter_mut().find(|f| f.path == entry.path) {
            Some(existing) => *existing = entry,
            None => self.files.push(entry),
        }
    }

    /// Removes and returns the entry of an artifact
    pub fn remove_entry(&mut self, path: &str) -> Option<FileEntry> {
        let index = self.files.iter().position(|f| f.path == path)?;
        Some(self.files.remove(index))
    }

    /// Repairs every entry, returning `(path, repair)` pairs
    pub fn repair(&mut self) -> Vec<(String, String)> {
        self.files
            .iter_mut()
            .flat_map(|entry| {
                let path = entry.path.clone();
                entry
                    .repair()
                    .into_iter()
                    .map(move |r| (path.clone(), r))
            })
            .collect()
    }

    /// Returns true when the document holds no entries
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
