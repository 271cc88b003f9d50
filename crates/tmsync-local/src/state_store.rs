//! JSON sync-state store
//!
//! Implements [`IStateStore`] with one pretty-printed JSON document per
//! project under a state directory: `{state_dir}/{project_id}.json`.
//!
//! ## Design Decisions
//!
//! - **Atomic save**: the document is serialized completely in memory,
//!   written to a `.tmp` sibling, flushed and fsynced, then renamed over the
//!   target. A failed save leaves the previous document in place.
//! - **Single writer**: saves are serialized through an async mutex.
//! - **Never replace a malformed document**: a file that does not parse is
//!   reported as [`StateStoreError::Malformed`] and left on disk untouched.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use tmsync_core::domain::SyncState;
use tmsync_core::ports::IStateStore;

/// Errors raised by [`JsonStateStore`]
#[derive(Debug, Error)]
pub enum StateStoreError {
    #[error("failed to access state document {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("state document {path} is malformed: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("state document {path} belongs to project '{found}', expected '{expected}'")]
    ProjectMismatch {
        path: PathBuf,
        expected: String,
        found: String,
    },

    #[error("invalid project id for a state document: '{0}'")]
    InvalidProjectId(String),
}

/// File-backed [`IStateStore`]
#[derive(Debug)]
pub struct JsonStateStore {
    state_dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonStateStore {
    /// Creates a store rooted at `state_dir`
    ///
    /// The directory is created lazily on the first save.
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Directory holding the state documents
    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    /// Path of the document of `project_id`
    pub fn document_path(&self, project_id: &str) -> Result<PathBuf, StateStoreError> {
        let trimmed = project_id.trim();
        if trimmed.is_empty()
            || trimmed.contains(['/', '\\'])
            || trimmed == "."
            || trimmed == ".."
        {
            return Err(StateStoreError::InvalidProjectId(project_id.to_string()));
        }
        Ok(self.state_dir.join(format!("{trimmed}.json")))
    }

    fn io_error(path: &Path, source: std::io::Error) -> StateStoreError {
        StateStoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    async fn write_atomic(&self, target: &Path, data: &[u8]) -> Result<(), StateStoreError> {
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Self::io_error(parent, e))?;
        }

        let mut tmp = target.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let written = async {
            let mut file = tokio::fs::File::create(&tmp).await?;
            file.write_all(data).await?;
            file.flush().await?;
            file.sync_all().await?;
            drop(file);
            tokio::fs::rename(&tmp, target).await
        }
        .await;

        if let Err(e) = written {
            // Best effort: the previous document is still intact
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(Self::io_error(target, e));
        }

        debug!(path = %target.display(), bytes = data.len(), "State document written");
        Ok(())
    }
}

#[async_trait]
impl IStateStore for JsonStateStore {
    #[instrument(skip(self), fields(dir = %self.state_dir.display()))]
    async fn load(&self, project_id: &str) -> anyhow::Result<SyncState> {
        let path = self.document_path(project_id)?;

        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No state document yet, starting empty");
                return Ok(SyncState::new(project_id.trim()));
            }
            Err(e) => return Err(Self::io_error(&path, e).into()),
        };

        let mut state: SyncState =
            serde_json::from_slice(&raw).map_err(|source| StateStoreError::Malformed {
                path: path.clone(),
                source,
            })?;

        if state.project_id.is_empty() {
            state.project_id = project_id.trim().to_string();
        } else if state.project_id != project_id.trim() {
            return Err(StateStoreError::ProjectMismatch {
                path,
                expected: project_id.trim().to_string(),
                found: state.project_id,
            }
            .into());
        }

        for (file, repair) in state.repair() {
            warn!(path = %file, repair = %repair, "Repaired state entry");
        }

        debug!(
            path = %path.display(),
            files = state.files.len(),
            "State document loaded"
        );
        Ok(state)
    }

    #[instrument(skip(self, state), fields(project = %state.project_id, files = state.files.len()))]
    async fn save(&self, state: &SyncState) -> anyhow::Result<()> {
        let path = self.document_path(&state.project_id)?;
        let data = serde_json::to_vec_pretty(state)?;

        let _guard = self.write_lock.lock().await;
        self.write_atomic(&path, &data).await?;
        Ok(())
    }
}
