//! TMS backend port (driven/secondary port)
//!
//! This module defines the capability set every remote test management
//! system must provide. The synchronizer and the result uploader only talk
//! to a backend through [`ITmsBackend`]; TestRail, Azure DevOps and Jira are
//! interchangeable implementations.
//!
//! ## Design Notes
//!
//! - Unlike the other ports, operations return the typed [`TmsError`]: the
//!   orchestration layer reports the failed operation and the remote message
//!   per artifact, so it needs them as data rather than as an opaque chain.
//! - Implementations never retry on their own beyond what their transport
//!   does, and never roll back partial success.
//! - Backends without a concept (e.g. sections in Jira) degrade to a no-op
//!   and document it.

use std::path::Path;

use serde::Serialize;
use thiserror::Error;

use crate::domain::{
    BackendKind, CaseContainer, CaseDraft, CaseId, CaseResult, RemoteRun, RemoteSuite, RunId,
    SectionId, SuiteId,
};

/// Failure of a remote operation
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
#[error(
    "{operation} failed{}: {remote_message}",
    .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
)]
pub struct TmsError {
    /// Backend operation that failed, e.g. `add_case`
    pub operation: String,
    /// HTTP status, when a response was received
    pub status: Option<u16>,
    /// Message reported by the remote (or by the transport)
    pub remote_message: String,
    /// Case that was created remotely before a later step of its creation failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_case: Option<CaseId>,
}

impl TmsError {
    /// Error reported by the remote
    pub fn remote(operation: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            status: Some(status),
            remote_message: message.into(),
            created_case: None,
        }
    }

    /// Error without a usable response (connection, timeout, decoding, local I/O)
    pub fn local(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            status: None,
            remote_message: message.into(),
            created_case: None,
        }
    }

    /// Marks `case_id` as created despite this failure
    pub fn with_created_case(mut self, case_id: CaseId) -> Self {
        self.created_case = Some(case_id);
        self
    }
}

/// Result type of backend operations
pub type TmsResult<T> = Result<T, TmsError>;

/// Port trait for remote test management operations
#[async_trait::async_trait]
pub trait ITmsBackend: Send + Sync {
    /// Which protocol this backend speaks
    fn source(&self) -> BackendKind;

    /// Creates a suite
    ///
    /// # Returns
    /// The new suite id and, when available, its browser URL
    async fn create_suite(&self, name: &str, description: &str) -> TmsResult<RemoteSuite>;

    /// Replaces the description of an existing suite
    async fn update_suite(&self, suite_id: &SuiteId, description: &str) -> TmsResult<()>;

    /// Creates a section inside a suite
    async fn add_section(&self, suite_id: &SuiteId, name: &str) -> TmsResult<SectionId>;

    /// Creates a case, or updates `existing` in place
    ///
    /// # Returns
    /// The case id (equal to `existing` on update)
    ///
    /// # Errors
    /// When creation takes several calls and a later one fails, the error
    /// carries the id of the already created case in
    /// [`TmsError::created_case`].
    async fn add_or_update_case(
        &self,
        container: &CaseContainer,
        draft: &CaseDraft,
        existing: Option<&CaseId>,
    ) -> TmsResult<CaseId>;

    /// Attaches an existing case to its container
    ///
    /// Backends that create cases directly inside a section have nothing to
    /// do here. Attaching an already attached case must succeed.
    async fn link_case(&self, _container: &CaseContainer, _case_id: &CaseId) -> TmsResult<()> {
        Ok(())
    }

    /// Deletes a case
    async fn delete_case(&self, case_id: &CaseId) -> TmsResult<()>;

    /// Puts the cases of a suite/section into the given order
    async fn reorder_cases(
        &self,
        suite_id: &SuiteId,
        section_id: Option<&SectionId>,
        ordered: &[CaseId],
    ) -> TmsResult<()>;

    /// Lists the runs of a suite that are not completed
    async fn get_active_runs(&self, suite_id: &SuiteId) -> TmsResult<Vec<RemoteRun>>;

    /// Creates a run containing exactly `case_ids`
    async fn create_run(
        &self,
        suite_id: &SuiteId,
        name: &str,
        case_ids: &[CaseId],
    ) -> TmsResult<RemoteRun>;

    /// Marks a run as completed
    async fn close_run(&self, run_id: &RunId) -> TmsResult<()>;

    /// Records results for cases of a run
    async fn add_results(&self, run_id: &RunId, results: &[CaseResult]) -> TmsResult<()>;

    /// Attaches a local file to a run
    async fn upload_attachment(&self, run_id: &RunId, path: &Path) -> TmsResult<()>;
}
