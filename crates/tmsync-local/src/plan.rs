//! YAML plan files
//!
//! A plan file lists the scenarios of one artifact and, optionally, named
//! subplans selecting a subset of them:
//!
//! ```yaml
//! name: Checkout flow
//! description: Happy path checks
//! scenarios:
//!   - name: Login
//!     steps:
//!       - description: open the login page
//!         expected: form is shown
//!       - submit credentials
//! subplans:
//!   smoke: [Login]
//! ```
//!
//! A step is either a mapping or a bare string (a step without an expected
//! outcome).

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};

use tmsync_core::domain::{artifact_key, DomainError, Scenario, Step, TestArtifact};
use tmsync_core::ports::IArtifactParser;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PlanFile {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    scenarios: Vec<PlanScenario>,
    #[serde(default)]
    subplans: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct PlanScenario {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    steps: Vec<PlanStep>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PlanStep {
    Text(String),
    Full {
        description: String,
        #[serde(default)]
        expected: Option<String>,
    },
}

impl From<PlanStep> for Step {
    fn from(step: PlanStep) -> Self {
        match step {
            PlanStep::Text(description) => Step::new(description),
            PlanStep::Full {
                description,
                expected,
            } => Step {
                description,
                expected,
            },
        }
    }
}

impl From<PlanScenario> for Scenario {
    fn from(scenario: PlanScenario) -> Self {
        Scenario {
            name: scenario.name,
            description: scenario.description,
            steps: scenario.steps.into_iter().map(Step::from).collect(),
        }
    }
}

/// [`IArtifactParser`] for YAML plan files
#[derive(Debug, Default, Clone)]
pub struct YamlPlanParser;

impl YamlPlanParser {
    pub fn new() -> Self {
        Self
    }

    /// Parses plan file contents
    ///
    /// `path` is only used for the artifact key and the default suite name.
    pub fn parse_str(
        &self,
        path: &Path,
        contents: &str,
        subplan: Option<&str>,
    ) -> anyhow::Result<TestArtifact> {
        let plan: PlanFile = serde_yaml::from_str(contents)
            .with_context(|| format!("invalid plan file {}", path.display()))?;

        let file_key = plan_key(path);
        let name = plan
            .name
            .filter(|n| !n.trim().is_empty())
            .or_else(|| {
                path.file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| file_key.clone());

        let mut artifact = TestArtifact {
            path: file_key.clone(),
            name,
            description: plan.description,
            scenarios: plan.scenarios.into_iter().map(Scenario::from).collect(),
        };
        artifact.validate()?;

        let Some(subplan) = subplan else {
            return Ok(artifact);
        };

        let selected = plan
            .subplans
            .get(subplan)
            .ok_or_else(|| DomainError::UnknownSubplan {
                artifact: file_key.clone(),
                subplan: subplan.to_string(),
            })?;

        let mut scenarios = Vec::with_capacity(selected.len());
        for wanted in selected {
            let scenario = artifact
                .scenarios
                .iter()
                .find(|s| &s.name == wanted)
                .ok_or_else(|| DomainError::UnknownScenario {
                    subplan: subplan.to_string(),
                    scenario: wanted.clone(),
                })?;
            scenarios.push(scenario.clone());
        }

        artifact.path = artifact_key(&file_key, Some(subplan));
        artifact.name = format!("{} - {subplan}", artifact.name);
        artifact.scenarios = scenarios;
        artifact.validate()?;
        Ok(artifact)
    }
}

/// State-document key of a plan file: the path as given, `/`-separated
pub fn plan_key(path: &Path) -> String {
    let key = path.to_string_lossy().replace('\\', "/");
    key.strip_prefix("./").map(str::to_string).unwrap_or(key)
}

#[async_trait]
impl IArtifactParser for YamlPlanParser {
    #[instrument(skip(self), fields(path = %path.display()))]
    async fn parse(&self, path: &Path, subplan: Option<&str>) -> anyhow::Result<TestArtifact> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read plan file {}", path.display()))?;
        let artifact = self.parse_str(path, &contents, subplan)?;
        debug!(
            key = %artifact.path,
            scenarios = artifact.scenarios.len(),
            "Parsed plan file"
        );
        Ok(artifact)
    }
}
