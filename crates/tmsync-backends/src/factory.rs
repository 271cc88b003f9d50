//! Backend factory
//!
//! Builds the adapter selected by `backend.source`. There is no shared or
//! global client: each call returns a fresh instance that callers pass to
//! the synchronizer and the result uploader explicitly.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::info;

use tmsync_core::config::{BackendConfig, API_KEY_ENV};
use tmsync_core::domain::BackendKind;
use tmsync_core::ports::ITmsBackend;

use crate::azure::AzureBackend;
use crate::http::HttpClient;
use crate::jira::JiraBackend;
use crate::testrail::TestRailBackend;

/// Configuration problems detected while building a backend
#[derive(Debug, Error)]
pub enum BackendSetupError {
    #[error("no API key configured: set backend.api_key or {API_KEY_ENV}")]
    MissingApiKey,

    #[error("backend.{0} must not be empty")]
    MissingField(&'static str),
}

/// Creates the configured backend adapter
pub fn create_backend(config: &BackendConfig) -> anyhow::Result<Arc<dyn ITmsBackend>> {
    let kind = config.kind()?;
    let api_key = config.api_key().ok_or(BackendSetupError::MissingApiKey)?;
    if config.url.trim().is_empty() {
        return Err(BackendSetupError::MissingField("url").into());
    }
    if config.project.trim().is_empty() {
        return Err(BackendSetupError::MissingField("project").into());
    }

    let timeout = Duration::from_secs(config.timeout_secs);
    let url = config.url.trim_end_matches('/');
    info!(source = %kind, url, project = %config.project, "Creating backend");

    let backend: Arc<dyn ITmsBackend> = match kind {
        BackendKind::TestRail => {
            let http = HttpClient::new(url, &config.user, api_key, timeout, config.max_retries)?;
            Arc::new(TestRailBackend::new(http, &config.project))
        }
        BackendKind::Azure => {
            let base = format!("{url}/{}", config.project.replace(' ', "%20"));
            let http = HttpClient::new(base, "", api_key, timeout, config.max_retries)?;
            Arc::new(AzureBackend::new(http))
        }
        BackendKind::Jira => {
            let http = HttpClient::new(url, &config.user, api_key, timeout, config.max_retries)?;
            Arc::new(JiraBackend::new(http, &config.project, config.jira.clone()))
        }
    };
    Ok(backend)
}
