//! tmsync Backends - remote test management system adapters
//!
//! Provides [`ITmsBackend`](tmsync_core::ports::ITmsBackend) implementations for:
//! - TestRail (API v2)
//! - Azure DevOps Test Plans
//! - Jira with Xray
//!
//! ## Modules
//!
//! - [`http`] - Authenticated HTTP transport with 429 retry and error-message extraction
//! - [`testrail`] - TestRail adapter
//! - [`azure`] - Azure DevOps adapter
//! - [`jira`] - Jira/Xray adapter
//! - [`factory`] - Builds the configured adapter

pub mod azure;
pub mod factory;
pub mod http;
pub mod jira;
pub mod testrail;

use std::path::Path;

use tmsync_core::domain::DomainError;
use tmsync_core::ports::{TmsError, TmsResult};

pub use factory::{create_backend, BackendSetupError};

/// Converts an id found in a response into a domain identifier
pub(crate) fn remote_id<T>(operation: &str, raw: impl ToString) -> TmsResult<T>
where
    T: TryFrom<String, Error = DomainError>,
{
    T::try_from(raw.to_string())
        .map_err(|e| TmsError::local(operation, format!("invalid id in response: {e}")))
}

/// Reads a file to attach, returning its file name and contents
pub(crate) async fn read_attachment(operation: &str, path: &Path) -> TmsResult<(String, Vec<u8>)> {
    let data = tokio::fs::read(path)
        .await
        .map_err(|e| TmsError::local(operation, format!("{}: {e}", path.display())))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "attachment".to_string());
    Ok((file_name, data))
}
