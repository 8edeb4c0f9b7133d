//! Identifiers
//!
//! `SessionId` names one live transport connection. `DuelCode` is the short
//! code a host shares with a challenger.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable identifier of a connected participant.
///
/// Assigned by the transport when a connection is accepted and valid until
/// the connection closes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId(pub [u8; 16]);

impl SessionId {
    /// Create from raw bytes.
    pub const fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Fresh random id.
    pub fn random() -> Self {
        Self(*uuid::Uuid::new_v4().as_bytes())
    }

    /// Create from UUID string.
    pub fn from_uuid_str(s: &str) -> Option<Self> {
        uuid::Uuid::parse_str(s).ok().map(|u| Self(*u.as_bytes()))
    }

    /// Convert to UUID string.
    pub fn to_uuid_string(&self) -> String {
        uuid::Uuid::from_bytes(self.0).to_string()
    }

    /// Get raw bytes.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Display for SessionId {
    /// Short hex prefix, enough to correlate log lines.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.0[..4]))
    }
}

/// Characters used in generated duel codes. Omits 0/O and 1/I.
pub const DUEL_CODE_ALPHABET: &[u8; 32] = b"23456789ABCDEFGHJKLMNPQRSTUVWXYZ";

/// Length of generated duel codes.
pub const DUEL_CODE_LEN: usize = 6;

/// Shareable code identifying an active duel.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DuelCode(String);

impl DuelCode {
    /// Wrap an existing code. Codes are normalized to upper case so that
    /// `ab12cd` typed by a challenger matches `AB12CD`.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into().trim().to_ascii_uppercase())
    }

    /// Generate a random code from uuid v4 entropy.
    pub fn generate() -> Self {
        Self::from_entropy(uuid::Uuid::new_v4().as_bytes())
    }

    /// Build a code from raw entropy bytes.
    pub fn from_entropy(bytes: &[u8; 16]) -> Self {
        let code = bytes
            .iter()
            .take(DUEL_CODE_LEN)
            .map(|b| DUEL_CODE_ALPHABET[(*b as usize) % DUEL_CODE_ALPHABET.len()] as char)
            .collect();
        Self(code)
    }

    /// Borrow the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DuelCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DuelCode {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
