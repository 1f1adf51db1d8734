//! Checksum: the SHA-256 content identifier for pastes (64 lowercase hex chars).
//!
//! The checksum is both the object key and the integrity check. A paste URL is
//! only ever a checksum, so everything that touches storage goes through here first.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Length of a hex-encoded SHA-256 digest.
pub const CHECKSUM_LEN: usize = 64;

/// A validated paste checksum, always stored lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Checksum(String);

/// Errors that can occur when parsing a checksum.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HashError {
    #[error("invalid checksum length: expected 64 hex chars, got {0}")]
    InvalidLength(usize),

    #[error("invalid hex character in checksum")]
    InvalidHex,
}

/// SHA-256 over the raw bytes, hex-encoded lowercase.
pub fn compute_checksum(content: impl AsRef<[u8]>) -> String {
    hex::encode(Sha256::digest(content.as_ref()))
}

/// True iff `s` is exactly 64 ASCII hex digits, either case.
pub fn is_valid_identifier(s: &str) -> bool {
    s.len() == CHECKSUM_LEN && s.bytes().all(|b| b.is_ascii_hexdigit())
}

impl Checksum {
    /// Hash data and return its checksum.
    pub fn from_data(data: impl AsRef<[u8]>) -> Self {
        Self(compute_checksum(data))
    }

    /// Create from an existing checksum string (validates format, lowercases).
    pub fn from_str_checked(s: &str) -> Result<Self, HashError> {
        // Byte length first: a multi-byte char must not pass as one of 64.
        if s.len() != CHECKSUM_LEN {
            return Err(HashError::InvalidLength(s.chars().count()));
        }
        if !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(HashError::InvalidHex);
        }
        Ok(Self(s.to_ascii_lowercase()))
    }

    /// True if `data` hashes to this checksum.
    pub fn matches(&self, data: impl AsRef<[u8]>) -> bool {
        compute_checksum(data) == self.0
    }

    /// Get the full checksum as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume and return the inner string.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Checksum {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str_checked(s)
    }
}

impl TryFrom<String> for Checksum {
    type Error = HashError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_str_checked(&s)
    }
}

impl From<Checksum> for String {
    fn from(checksum: Checksum) -> Self {
        checksum.0
    }
}

impl AsRef<str> for Checksum {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
