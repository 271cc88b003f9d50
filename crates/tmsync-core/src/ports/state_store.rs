//! State store port (driven/secondary port)
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because storage errors are adapter-specific;
//!   adapters may attach a typed error that callers can downcast.
//! - `load` of a project that was never synchronized returns an empty
//!   [`SyncState`], not an error.
//! - `save` is a commit point: it either replaces the whole document or
//!   leaves the previous one untouched.

use crate::domain::SyncState;

/// Port trait for sync-state persistence
#[async_trait::async_trait]
pub trait IStateStore: Send + Sync {
    /// Loads the state document of a project
    ///
    /// # Returns
    /// The stored document (lock-step repaired), or an empty one on first sync
    async fn load(&self, project_id: &str) -> anyhow::Result<SyncState>;

    /// Atomically replaces the stored document
    async fn save(&self, state: &SyncState) -> anyhow::Result<()>;
}
