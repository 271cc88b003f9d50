//! Execution summary reader
//!
//! Reads the JSON summary an external test run leaves in its output
//! directory (`summary.json` unless configured otherwise).

use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use tracing::{debug, instrument};

use tmsync_core::domain::ExecutionSummary;
use tmsync_core::ports::ISummarySource;

/// [`ISummarySource`] reading `{output_dir}/{file_name}`
#[derive(Debug, Clone)]
pub struct JsonSummaryReader {
    file_name: PathBuf,
}

impl JsonSummaryReader {
    pub fn new(file_name: impl Into<PathBuf>) -> Self {
        Self {
            file_name: file_name.into(),
        }
    }

    /// Location of the summary inside `output_dir`
    pub fn summary_path(&self, output_dir: &Path) -> PathBuf {
        output_dir.join(&self.file_name)
    }
}

impl Default for JsonSummaryReader {
    fn default() -> Self {
        Self::new("summary.json")
    }
}

#[async_trait]
impl ISummarySource for JsonSummaryReader {
    #[instrument(skip(self), fields(output_dir = %output_dir.display()))]
    async fn read(&self, output_dir: &Path) -> anyhow::Result<ExecutionSummary> {
        let path = self.summary_path(output_dir);
        let raw = tokio::fs::read(&path)
            .await
            .with_context(|| format!("failed to read execution summary {}", path.display()))?;
        let mut summary: ExecutionSummary = serde_json::from_slice(&raw)
            .with_context(|| format!("invalid execution summary {}", path.display()))?;

        summary.resolve_attachments(output_dir);
        debug!(files = summary.files.len(), "Execution summary loaded");
        Ok(summary)
    }
}
