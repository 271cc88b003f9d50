//! Local test artifacts
//!
//! A [`TestArtifact`] is one locally-authored script or plan. Each of its
//! [`Scenario`]s maps 1:1 to a remote test case, identified by the scenario
//! name within the artifact. Remote identifiers are not stored here; they
//! live in the [`SyncState`](super::SyncState) document.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// Builds the state-document key of an artifact
///
/// A subplan import is tracked separately from the full artifact, so its
/// key carries the subplan name: `plans/login.yaml#smoke`.
pub fn artifact_key(path: &str, subplan: Option<&str>) -> String {
    match subplan {
        Some(name) => format!("{path}#{name}"),
        None => path.to_string(),
    }
}

/// A single step of a scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    /// What the tester (or script) does
    pub description: String,
    /// Expected outcome of the step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
}

impl Step {
    /// Creates a step without an expected outcome
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            expected: None,
        }
    }

    /// Sets the expected outcome
    pub fn with_expected(mut self, expected: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self
    }
}

/// A scenario: the local counterpart of one remote test case
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name, unique within its artifact
    pub name: String,
    /// Optional free-form description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Ordered steps
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Scenario {
    /// Creates a scenario with no steps
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            steps: Vec::new(),
        }
    }

    /// Sets the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Appends a step
    pub fn with_step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }
}

/// One local script/plan file, ready for synchronization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestArtifact {
    /// State-document key (file path, plus `#subplan` for subplan imports)
    pub path: String,
    /// Remote suite name
    pub name: String,
    /// Suite-level description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Ordered scenarios
    pub scenarios: Vec<Scenario>,
}

impl TestArtifact {
    /// Creates an artifact with no scenarios
    pub fn new(path: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            description: None,
            scenarios: Vec::new(),
        }
    }

    /// Sets the suite-level description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Appends a scenario
    pub fn with_scenario(mut self, scenario: Scenario) -> Self {
        self.scenarios.push(scenario);
        self
    }

    /// Scenario names in local order
    pub fn scenario_names(&self) -> Vec<&str> {
        self.scenarios.iter().map(|s| s.name.as_str()).collect()
    }

    /// Checks that scenario names are non-empty and unique
    ///
    /// Scenario identity is keyed by name, so duplicates would map two local
    /// scenarios onto one remote case.
    ///
    /// # Errors
    /// Returns the first offending scenario
    pub fn validate(&self) -> Result<(), DomainError> {
        let mut seen = HashSet::new();
        for (index, scenario) in self.scenarios.iter().enumerate() {
            if scenario.name.trim().is_empty() {
                return Err(DomainError::EmptyScenarioName {
                    artifact: self.path.clone(),
                    index: index + 1,
                });
            }
            if !seen.insert(scenario.name.as_str()) {
                return Err(DomainError::DuplicateScenario {
                    artifact: self.path.clone(),
                    scenario: scenario.name.clone(),
                });
            }
        }
        Ok(())
    }
}
