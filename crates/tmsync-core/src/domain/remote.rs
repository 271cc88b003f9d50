//! Remote-side value types
//!
//! These are the values exchanged with a backend through
//! [`ITmsBackend`](crate::ports::ITmsBackend): what gets sent (drafts,
//! results) and what comes back (suites, runs). They are backend-agnostic;
//! each adapter maps them onto its own wire DTOs.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::artifact::Scenario;
use super::errors::DomainError;
use super::execution::Outcome;
use super::newtypes::{CaseId, RunId, SectionId, SuiteId};

/// Supported backend protocols
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// TestRail REST API v2
    TestRail,
    /// Azure DevOps Test Plans
    Azure,
    /// Jira with the Xray test management app
    Jira,
}

impl BackendKind {
    /// Lowercase name as used in the configuration file
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TestRail => "testrail",
            Self::Azure => "azure",
            Self::Jira => "jira",
        }
    }
}

impl Display for BackendKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "testrail" => Ok(Self::TestRail),
            "azure" | "azure_devops" | "azuredevops" => Ok(Self::Azure),
            "jira" | "xray" => Ok(Self::Jira),
            other => Err(DomainError::UnknownBackend(other.to_string())),
        }
    }
}

/// A suite as created on the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSuite {
    pub id: SuiteId,
    /// Browser URL, when the backend exposes one
    pub url: Option<String>,
}

/// An execution run on the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteRun {
    pub id: RunId,
    pub name: String,
    pub is_completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Where a case lives: a suite and, for backends with sections, a section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseContainer {
    pub suite_id: SuiteId,
    pub section_id: Option<SectionId>,
}

impl CaseContainer {
    pub fn new(suite_id: SuiteId, section_id: Option<SectionId>) -> Self {
        Self {
            suite_id,
            section_id,
        }
    }
}

/// One step of a case draft
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepDraft {
    pub content: String,
    pub expected: String,
}

/// Content of a case to create or update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseDraft {
    pub title: String,
    pub description: String,
    pub steps: Vec<StepDraft>,
}

impl CaseDraft {
    /// Builds a draft from a scenario
    ///
    /// When an origin stamp is given (creation), it is appended to the
    /// description so testers can trace a remote case back to its file.
    pub fn from_scenario(scenario: &Scenario, origin: Option<&OriginStamp>) -> Self {
        let description = scenario.description.clone().unwrap_or_default();
        let description = match origin {
            Some(origin) => origin.stamp(&description),
            None => description,
        };
        Self {
            title: scenario.name.clone(),
            description,
            steps: scenario
                .steps
                .iter()
                .map(|step| StepDraft {
                    content: step.description.clone(),
                    expected: step.expected.clone().unwrap_or_default(),
                })
                .collect(),
        }
    }
}

/// Structured origin description attached to created cases
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginStamp {
    pub project: String,
    pub file: String,
    pub user: String,
    pub tool_version: String,
    pub timestamp: DateTime<Utc>,
}

impl OriginStamp {
    /// Stamp for `file` in `project`, taken now
    pub fn now(project: &str, file: &str, user: &str) -> Self {
        Self {
            project: project.to_string(),
            file: file.to_string(),
            user: user.to_string(),
            tool_version: concat!("tmsync ", env!("CARGO_PKG_VERSION")).to_string(),
            timestamp: Utc::now(),
        }
    }

    /// `text` followed by the rendered stamp, separated by a blank line
    pub fn stamp(&self, text: &str) -> String {
        if text.trim().is_empty() {
            self.render()
        } else {
            format!("{text}\n\n{}", self.render())
        }
    }

    /// Plain-text rendering, one `key: value` per line
    pub fn render(&self) -> String {
        format!(
            "Created by: {}\nProject: {}\nFile: {}\nUser: {}\nDate: {}",
            self.tool_version,
            self.project,
            self.file,
            self.user,
            self.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
        )
    }
}

/// Result of one case within a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseResult {
    pub case_id: CaseId,
    pub outcome: Outcome,
    pub comment: String,
    pub elapsed: Duration,
}
