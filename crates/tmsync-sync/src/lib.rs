//! tmsync Sync - import and result upload orchestration
//!
//! Provides:
//! - Pushing local artifacts to the remote TMS (suites, sections, cases, order)
//! - Removing a synchronized artifact and its remote cases
//! - Uploading execution results into runs, and closing runs
//!
//! ## Modules
//!
//! - [`engine`] - [`Synchronizer`], the import orchestrator
//! - [`uploader`] - [`ResultUploader`], results and run management

pub mod engine;
pub mod uploader;

use thiserror::Error;

use tmsync_core::ports::TmsError;

pub use engine::{
    plan_artifact, ArtifactPlan, ArtifactReport, ImportReport, RemovalReport, Synchronizer,
};
pub use uploader::{CloseReport, FileUploadReport, ResultUploader, UploadReport};

/// Errors that end an orchestration call before any per-artifact work
#[derive(Debug, Error)]
pub enum SyncError {
    /// The artifact has never been synchronized
    #[error("{0} is not synchronized (no entry in the state document)")]
    UnknownArtifact(String),

    /// A remote call needed before any per-artifact work failed
    #[error(transparent)]
    Remote(#[from] TmsError),
}

/// Returns true when the remote reports the entity as already gone
pub(crate) fn is_gone(err: &TmsError) -> bool {
    err.status == Some(404)
}
