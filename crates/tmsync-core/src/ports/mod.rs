//! Port definitions (hexagonal architecture interfaces)
//!
//! Ports are the boundaries the synchronization core depends on; their
//! implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`ITmsBackend`] - Remote test management system operations (TestRail, Azure DevOps, Jira)
//! - [`IStateStore`] - Persistence of the per-project sync-state document
//! - [`IArtifactParser`] - Discovery of local test artifacts
//! - [`ISummarySource`] - Access to finished execution summaries

pub mod artifact_source;
pub mod state_store;
pub mod tms_backend;

pub use artifact_source::{IArtifactParser, ISummarySource};
pub use state_store::IStateStore;
pub use tms_backend::{ITmsBackend, TmsError, TmsResult};
