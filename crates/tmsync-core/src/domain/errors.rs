//! Domain error types
//!
//! This module defines error types specific to domain operations,
//! including identifier validation and artifact structure problems.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid remote identifier (suite, section, case, run)
    #[error("Invalid ID format: {0}")]
    InvalidId(String),

    /// Two scenarios in one artifact share a name
    #[error("Duplicate scenario name in {artifact}: {scenario}")]
    DuplicateScenario {
        /// The artifact key
        artifact: String,
        /// The repeated scenario name
        scenario: String,
    },

    /// A scenario has no name
    #[error("Scenario #{index} in {artifact} has an empty name")]
    EmptyScenarioName {
        /// The artifact key
        artifact: String,
        /// 1-based position of the scenario
        index: usize,
    },

    /// The requested subplan is not declared in the artifact
    #[error("Unknown subplan '{subplan}' in {artifact}")]
    UnknownSubplan {
        /// The artifact path
        artifact: String,
        /// The requested subplan
        subplan: String,
    },

    /// A subplan references a scenario the artifact does not contain
    #[error("Subplan '{subplan}' references unknown scenario '{scenario}'")]
    UnknownScenario {
        /// The subplan name
        subplan: String,
        /// The missing scenario name
        scenario: String,
    },

    /// Unknown backend source name
    #[error("Unknown backend source: {0}")]
    UnknownBackend(String),

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}
