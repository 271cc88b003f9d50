//! Domain newtypes with validation
//!
//! Remote identifiers are opaque strings: TestRail and Azure DevOps hand out
//! numeric ids, Jira hands out issue keys such as `QA-42`. Each newtype
//! guarantees a non-empty, trimmed value at construction time.
//!
//! Older state documents stored numeric ids as JSON numbers, so every id
//! deserializes from either a string or an unsigned integer.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use super::errors::DomainError;

/// Wire representation accepted when deserializing an identifier
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(u64),
}

impl From<RawId> for String {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Text(s) => s,
            RawId::Number(n) => n.to_string(),
        }
    }
}

fn validate_id(kind: &str, id: String) -> Result<String, DomainError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        return Err(DomainError::InvalidId(format!("{kind} cannot be empty")));
    }
    if trimmed.chars().any(char::is_control) {
        return Err(DomainError::InvalidId(format!(
            "{kind} contains control characters: {trimmed:?}"
        )));
    }
    if trimmed.len() == id.len() {
        Ok(id)
    } else {
        Ok(trimmed.to_string())
    }
}

macro_rules! remote_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        #[serde(into = "String")]
        pub struct $name(String);

        impl $name {
            #[doc = concat!("Create a new ", $kind)]
            ///
            /// # Errors
            /// Returns error if the value is empty or contains control characters
            pub fn new(id: impl Into<String>) -> Result<Self, DomainError> {
                validate_id($kind, id.into()).map(Self)
            }

            /// Get the inner string reference
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = DomainError;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                Self::new(s)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = RawId::deserialize(deserializer)?;
                Self::new(String::from(raw)).map_err(serde::de::Error::custom)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

remote_id!(
    /// Identifier of a remote suite (TestRail suite, Azure test plan, Jira test plan issue)
    SuiteId,
    "SuiteId"
);

remote_id!(
    /// Identifier of a remote section (sub-grouping within a suite)
    SectionId,
    "SectionId"
);

remote_id!(
    /// Identifier of a remote test case
    CaseId,
    "CaseId"
);

remote_id!(
    /// Identifier of a remote execution run
    RunId,
    "RunId"
);
