//! Domain entities and business logic
//!
//! This module contains the core domain types for tmsync:
//! - Newtypes for remote identifiers (suite, section, case, run)
//! - Local test artifacts (scenarios and steps)
//! - Content fingerprints used for change detection
//! - The persisted synchronization state document
//! - Execution results consumed by the result uploader
//! - Remote-side value types exchanged with backends

pub mod artifact;
pub mod errors;
pub mod execution;
pub mod fingerprint;
pub mod newtypes;
pub mod remote;
pub mod sync_state;

// Re-export commonly used types
pub use artifact::{artifact_key, Scenario, Step, TestArtifact};
pub use errors::DomainError;
pub use execution::{ExecutionSummary, FileResults, Outcome, ScenarioResult};
pub use fingerprint::{fingerprint, fingerprint_text, Fingerprint};
pub use newtypes::*;
pub use remote::{
    BackendKind, CaseContainer, CaseDraft, CaseResult, OriginStamp, RemoteRun, RemoteSuite,
    StepDraft,
};
pub use sync_state::{FileEntry, ScenarioRef, SyncState};
