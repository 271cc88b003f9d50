//! Local input ports: test artifacts and execution summaries

use std::path::Path;

use crate::domain::{ExecutionSummary, TestArtifact};

/// Port trait for reading local test artifacts
#[async_trait::async_trait]
pub trait IArtifactParser: Send + Sync {
    /// Parses one artifact file
    ///
    /// # Arguments
    /// * `path` - The artifact file
    /// * `subplan` - Restricts the artifact to a named subset of scenarios
    ///
    /// # Returns
    /// A validated artifact whose `path` is its state-document key
    async fn parse(&self, path: &Path, subplan: Option<&str>) -> anyhow::Result<TestArtifact>;
}

/// Port trait for reading a finished execution summary
#[async_trait::async_trait]
pub trait ISummarySource: Send + Sync {
    /// Reads the summary produced into `output_dir`
    ///
    /// Relative attachment paths in the returned summary are already
    /// resolved against `output_dir`.
    async fn read(&self, output_dir: &Path) -> anyhow::Result<ExecutionSummary>;
}
