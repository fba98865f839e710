//! Patient identifier wrapper.
//!
//! Identifiers are produced by the generators in `synthpop-demographics`
//! (NHI-style or plain numeric). The simulation only ever carries them
//! through to the output records, so the wrapper is a thin string newtype.

use serde::{Deserialize, Serialize};

/// Identifier of a generated patient.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatientId(String);

impl PatientId {
    /// Wrap an already generated identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Return the inner string.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl core::fmt::Display for PatientId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for PatientId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for PatientId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}
