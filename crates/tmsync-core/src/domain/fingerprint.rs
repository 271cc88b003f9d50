//! Content fingerprints
//!
//! A fingerprint is a SHA-256 digest over the *visible* content of a
//! scenario: its name, description, and each step's description and
//! expected text, in order. It is only a local change detector; the state
//! document stores the last synced fingerprint per scenario, and a scenario
//! whose fingerprint is unchanged is never sent to the backend again.
//!
//! Normalization makes the digest insensitive to line-ending style,
//! surrounding whitespace, and runs of spaces/tabs. Every field is
//! length-prefixed, so text moving from one field into the next still
//! changes the digest.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::artifact::Scenario;

/// Hex-encoded content digest
///
/// The empty fingerprint means "unknown": it never equals a computed one,
/// so the corresponding case is updated on the next sync.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// The "unknown" fingerprint
    #[must_use]
    pub fn unknown() -> Self {
        Self(String::new())
    }

    /// Returns true if this fingerprint was actually computed
    #[must_use]
    pub fn is_known(&self) -> bool {
        !self.0.is_empty()
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Fingerprint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Normalizes one text field
fn normalize(text: &str) -> String {
    text.replace("\r\n", "\n")
        .replace('\r', "\n")
        .lines()
        .map(|line| line.split([' ', '\t']).filter(|w| !w.is_empty()).collect::<Vec<_>>().join(" "))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

struct FieldHasher(Sha256);

impl FieldHasher {
    fn new(domain: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(domain.as_bytes());
        Self(hasher)
    }

    fn field(&mut self, tag: u8, value: Option<&str>) {
        let normalized = value.map(normalize).unwrap_or_default();
        self.0.update([tag]);
        self.0.update((normalized.len() as u64).to_le_bytes());
        self.0.update(normalized.as_bytes());
    }

    fn finish(self) -> Fingerprint {
        Fingerprint(format!("{:x}", self.0.finalize()))
    }
}

/// Computes the fingerprint of a scenario
pub fn fingerprint(scenario: &Scenario) -> Fingerprint {
    let mut hasher = FieldHasher::new("scenario/v1");
    hasher.field(b'n', Some(&scenario.name));
    hasher.field(b'd', scenario.description.as_deref());
    for step in &scenario.steps {
        hasher.field(b's', Some(&step.description));
        hasher.field(b'e', step.expected.as_deref());
    }
    hasher.finish()
}

/// Computes the fingerprint of a single free-form text
///
/// Used for suite descriptions.
pub fn fingerprint_text(text: &str) -> Fingerprint {
    let mut hasher = FieldHasher::new("text/v1");
    hasher.field(b't', Some(text));
    hasher.finish()
}
