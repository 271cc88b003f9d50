//! Configuration module for tmsync.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::domain::BackendKind;

/// Environment variable that overrides `backend.api_key`.
pub const API_KEY_ENV: &str = "TMSYNC_API_KEY";

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for tmsync.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub project: ProjectConfig,
    pub backend: BackendConfig,
    pub sync: SyncConfig,
    pub results: ResultsConfig,
    pub logging: LoggingConfig,
}

/// Local project settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Project identifier; names the sync-state document.
    pub id: String,
}

/// Remote test management system settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Backend protocol: `testrail`, `azure`, or `jira`.
    pub source: String,
    /// Base URL (TestRail instance, Azure organization, Jira site).
    pub url: String,
    /// Login user. Unused by Azure DevOps (PAT only).
    pub user: String,
    /// API key / personal access token. Overridden by `TMSYNC_API_KEY`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Remote project: TestRail project id, Azure project name, or Jira project key.
    pub project: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Maximum retries of a rate-limited (HTTP 429) request.
    pub max_retries: u32,
    /// Jira/Xray specific settings.
    pub jira: JiraConfig,
}

/// Jira/Xray issue types and workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JiraConfig {
    pub plan_issue_type: String,
    pub test_issue_type: String,
    pub execution_issue_type: String,
    /// Workflow transition that closes a test execution. `None` disables closing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub close_transition_id: Option<String>,
}

/// Synchronization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Directory holding one `{project}.json` state document per project.
    pub state_dir: PathBuf,
    /// Delete remote cases of scenarios removed locally.
    pub prune_removed_scenarios: bool,
}

/// Result upload settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResultsConfig {
    /// File name of the execution summary inside the output directory.
    pub summary_file: String,
    /// Close the run after uploading results.
    pub close_run: bool,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Write the configuration as YAML, creating parent directories.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)
            .with_context(|| format!("Failed to write config file {}", path.display()))?;
        Ok(())
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/tmsync/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("tmsync")
            .join("config.yaml")
    }

    /// Path of the state document for the configured project.
    pub fn state_file(&self) -> PathBuf {
        self.sync.state_dir.join(format!("{}.json", self.project.id))
    }
}

impl BackendConfig {
    /// Parsed backend protocol.
    pub fn kind(&self) -> Result<BackendKind, crate::domain::DomainError> {
        self.source.parse()
    }

    /// API key with the environment override applied.
    pub fn api_key(&self) -> Option<String> {
        resolve_api_key(std::env::var(API_KEY_ENV).ok(), self.api_key.as_deref())
    }
}

fn resolve_api_key(env: Option<String>, configured: Option<&str>) -> Option<String> {
    env.filter(|v| !v.trim().is_empty())
        .or_else(|| configured.map(str::to_string))
        .filter(|v| !v.trim().is_empty())
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            id: "default".to_string(),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            source: "testrail".to_string(),
            url: String::new(),
            user: String::new(),
            api_key: None,
            project: String::new(),
            timeout_secs: 30,
            max_retries: 3,
            jira: JiraConfig::default(),
        }
    }
}

impl Default for JiraConfig {
    fn default() -> Self {
        Self {
            plan_issue_type: "Test Plan".to_string(),
            test_issue_type: "Test".to_string(),
            execution_issue_type: "Test Execution".to_string(),
            close_transition_id: None,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            state_dir: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("~/.local/share"))
                .join("tmsync"),
            prune_removed_scenarios: false,
        }
    }
}

impl Default for ResultsConfig {
    fn default() -> Self {
        Self {
            summary_file: "summary.json".to_string(),
            close_run: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"backend.url"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let mut push = |field: &str, message: String| {
            errors.push(ValidationError {
                field: field.into(),
                message,
            })
        };

        // --- project ---
        if self.project.id.trim().is_empty() {
            push("project.id", "must not be empty".into());
        } else if self.project.id.contains(['/', '\\']) || self.project.id.starts_with('.') {
            push(
                "project.id",
                format!("must be a plain file name: {}", self.project.id),
            );
        }

        // --- backend ---
        let kind = self.backend.kind();
        if let Err(e) = &kind {
            push(
                "backend.source",
                format!("{e}; expected one of: testrail, azure, jira"),
            );
        }
        if self.backend.url.trim().is_empty() {
            push("backend.url", "must not be empty".into());
        } else if !(self.backend.url.starts_with("http://")
            || self.backend.url.starts_with("https://"))
        {
            push(
                "backend.url",
                format!("must start with http:// or https://: {}", self.backend.url),
            );
        }
        if self.backend.project.trim().is_empty() {
            push("backend.project", "must not be empty".into());
        }
        if matches!(kind, Ok(BackendKind::TestRail | BackendKind::Jira))
            && self.backend.user.trim().is_empty()
        {
            push(
                "backend.user",
                format!("is required for {}", self.backend.source),
            );
        }
        if self.backend.timeout_secs == 0 {
            push("backend.timeout_secs", "must be greater than 0".into());
        }
        if kind == Ok(BackendKind::Jira) {
            if self.backend.jira.plan_issue_type.trim().is_empty() {
                push("backend.jira.plan_issue_type", "must not be empty".into());
            }
            if self.backend.jira.test_issue_type.trim().is_empty() {
                push("backend.jira.test_issue_type", "must not be empty".into());
            }
            if self.backend.jira.execution_issue_type.trim().is_empty() {
                push(
                    "backend.jira.execution_issue_type",
                    "must not be empty".into(),
                );
            }
        }

        // --- results ---
        if self.results.summary_file.trim().is_empty() {
            push("results.summary_file", "must not be empty".into());
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            push(
                "logging.level",
                format!(
                    "invalid level '{}'; expected one of: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            );
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for [`Config`].
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use tmsync_core::config::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .project_id("web-shop")
///     .backend_source("testrail")
///     .backend_url("https://example.testrail.io")
///     .logging_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn project_id(mut self, id: impl Into<String>) -> Self {
        self.config.project.id = id.into();
        self
    }

    // --- backend ---

    pub fn backend_source(mut self, source: impl Into<String>) -> Self {
        self.config.backend.source = source.into();
        self
    }

    pub fn backend_url(mut self, url: impl Into<String>) -> Self {
        self.config.backend.url = url.into();
        self
    }

    pub fn backend_user(mut self, user: impl Into<String>) -> Self {
        self.config.backend.user = user.into();
        self
    }

    pub fn backend_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.backend.api_key = Some(key.into());
        self
    }

    pub fn backend_project(mut self, project: impl Into<String>) -> Self {
        self.config.backend.project = project.into();
        self
    }

    pub fn backend_timeout_secs(mut self, seconds: u64) -> Self {
        self.config.backend.timeout_secs = seconds;
        self
    }

    pub fn backend_max_retries(mut self, retries: u32) -> Self {
        self.config.backend.max_retries = retries;
        self
    }

    pub fn jira_close_transition_id(mut self, id: impl Into<String>) -> Self {
        self.config.backend.jira.close_transition_id = Some(id.into());
        self
    }

    // --- sync ---

    pub fn sync_state_dir(mut self, dir: PathBuf) -> Self {
        self.config.sync.state_dir = dir;
        self
    }

    pub fn sync_prune_removed_scenarios(mut self, prune: bool) -> Self {
        self.config.sync.prune_removed_scenarios = prune;
        self
    }

    // --- results ---

    pub fn results_summary_file(mut self, file: impl Into<String>) -> Self {
        self.config.results.summary_file = file.into();
        self
    }

    pub fn results_close_run(mut self, close: bool) -> Self {
        self.config.results.close_run = close;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
