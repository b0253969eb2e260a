//! Shared administrative credential.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Admin key referenced by both the control plane (as an authorized key) and the
/// dashboard (as the key it presents to the admin API).
///
/// `Debug` is redacted; the value only leaves the process inside rendered payloads.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SharedCredential(String);

impl SharedCredential {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Generate a random 128-bit key, hex encoded.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        rand::rng().fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SharedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedCredential(<redacted>)")
    }
}
