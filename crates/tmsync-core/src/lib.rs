//! tmsync Core - Domain logic and business rules
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `TestArtifact`, `Scenario`, `SyncState`, `ExecutionSummary`
//! - **Content fingerprints** - change detection for scenarios without remote queries
//! - **Port definitions** - Traits for adapters: `ITmsBackend`, `IStateStore`,
//!   `IArtifactParser`, `ISummarySource`
//! - **Configuration** - the YAML configuration file
//!
//! # Architecture
//!
//! The domain module contains pure logic with no I/O. Ports define the trait
//! interfaces implemented by the adapter crates (`tmsync-backends`,
//! `tmsync-local`), and the orchestration lives in `tmsync-sync`.

pub mod config;
pub mod domain;
pub mod ports;
