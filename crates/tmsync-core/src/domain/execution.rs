//! Execution results
//!
//! An [`ExecutionSummary`] is produced by an external test run and consumed
//! read-only by the result uploader. It groups per-scenario results by
//! artifact, mirroring the layout of the sync-state document.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::artifact::artifact_key;

/// Final outcome of a scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// Every step passed
    Passed,
    /// At least one step failed
    Failed,
    /// The scenario did not run
    Skipped,
}

impl Outcome {
    /// Lowercase name used in logs and comments
    pub fn name(&self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

/// Result of one scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioResult {
    /// Scenario name as in the artifact
    pub name: String,
    /// Final outcome
    pub outcome: Outcome,
    /// Number of passed checks
    #[serde(default)]
    pub passed: u32,
    /// Number of failed checks
    #[serde(default)]
    pub failed: u32,
    /// Number of skipped checks
    #[serde(default)]
    pub skipped: u32,
    /// Wall-clock duration in milliseconds
    #[serde(default)]
    pub duration_ms: u64,
    /// Per-scenario attachments (screenshots, logs)
    #[serde(default)]
    pub attachments: Vec<PathBuf>,
}

impl ScenarioResult {
    /// Creates a result with zero counts
    pub fn new(name: impl Into<String>, outcome: Outcome) -> Self {
        Self {
            name: name.into(),
            outcome,
            passed: 0,
            failed: 0,
            skipped: 0,
            duration_ms: 0,
            attachments: Vec::new(),
        }
    }

    /// Duration as a [`Duration`]
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    /// Human-readable comment attached to the remote result
    pub fn comment(&self) -> String {
        format!(
            "{}: {} passed, {} failed, {} skipped in {:.1}s",
            self.outcome.name(),
            self.passed,
            self.failed,
            self.skipped,
            self.duration_ms as f64 / 1000.0
        )
    }
}

/// Results of one artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileResults {
    /// Artifact file path
    pub path: String,
    /// Subplan the run was restricted to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subplan: Option<String>,
    /// Run-level attachments (reports, videos)
    #[serde(default)]
    pub attachments: Vec<PathBuf>,
    /// Per-scenario results
    #[serde(default)]
    pub scenarios: Vec<ScenarioResult>,
}

impl FileResults {
    /// State-document key of the artifact these results belong to
    pub fn artifact_key(&self) -> String {
        artifact_key(&self.path, self.subplan.as_deref())
    }

    /// Every attachment: run-level first, then per scenario
    pub fn all_attachments(&self) -> Vec<&PathBuf> {
        self.attachments
            .iter()
            .chain(self.scenarios.iter().flat_map(|s| s.attachments.iter()))
            .collect()
    }
}

/// Finished execution summary
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionSummary {
    /// Results grouped per artifact
    #[serde(default)]
    pub files: Vec<FileResults>,
}

impl ExecutionSummary {
    /// Resolves relative attachment paths against `base`
    pub fn resolve_attachments(&mut self, base: &std::path::Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        for file in &mut self.files {
            file.attachments.iter_mut().for_each(resolve);
            for scenario in &mut file.scenarios {
                scenario.attachments.iter_mut().for_each(resolve);
            }
        }
    }
}
