//! tmsync Local - filesystem adapters
//!
//! Implements the local ports of `tmsync-core`:
//! - [`JsonStateStore`] - [`IStateStore`](tmsync_core::ports::IStateStore) backed by one JSON document per project
//! - [`YamlPlanParser`] - [`IArtifactParser`](tmsync_core::ports::IArtifactParser) for YAML plan files
//! - [`JsonSummaryReader`] - [`ISummarySource`](tmsync_core::ports::ISummarySource) for `summary.json`

pub mod plan;
pub mod state_store;
pub mod summary;

pub use plan::{plan_key, YamlPlanParser};
pub use state_store::{JsonStateStore, StateStoreError};
pub use summary::JsonSummaryReader;
