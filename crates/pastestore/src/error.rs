//! Storage error taxonomy.
//!
//! Callers branch on [`ErrorKind`] rather than on variants: "not found",
//! "corrupt" and "backend down" must stay distinguishable all the way up to
//! the HTTP status code.

use thiserror::Error;

use crate::backend::BackendError;
use crate::hash::HashError;

/// Which of the two stored objects an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Content,
    Metadata,
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Content => write!(f, "content"),
            Self::Metadata => write!(f, "metadata"),
        }
    }
}

/// Coarse classification of a storage or service failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Identifier or input rejected before any I/O.
    Malformed,
    /// Content or metadata absent (or metadata unreadable).
    NotFound,
    /// Content does not hash to its key.
    Corruption,
    /// TTL elapsed.
    Expired,
    /// Empty or oversized content.
    Rejected,
    /// Network, credential or permission failure.
    Backend,
    /// Cancelled or past its deadline.
    Cancelled,
}

/// Errors from [`PasteStore`](crate::store::PasteStore) operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid checksum: {0}")]
    InvalidIdentifier(#[from] HashError),

    #[error("paste {object} not found: {checksum}")]
    NotFound { checksum: String, object: ObjectKind },

    #[error("content checksum mismatch: possible data corruption: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("failed to decode metadata for {checksum}: {source}")]
    Decode {
        checksum: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode metadata for {checksum}: {source}")]
    Encode {
        checksum: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to {action} paste {object}: {source}")]
    Backend {
        action: &'static str,
        object: ObjectKind,
        #[source]
        source: BackendError,
    },

    #[error("failed to list metadata: {0}")]
    Listing(#[source] BackendError),

    #[error("failed to ensure bucket exists: {0}")]
    Bucket(#[source] BackendError),

    #[error("operation cancelled")]
    Cancelled,

    #[error("iteration stopped: {reason}")]
    Stopped { reason: String },
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidIdentifier(_) => ErrorKind::Malformed,
            Self::NotFound { .. } | Self::Decode { .. } => ErrorKind::NotFound,
            Self::ChecksumMismatch { .. } => ErrorKind::Corruption,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Encode { .. }
            | Self::Backend { .. }
            | Self::Listing(_)
            | Self::Bucket(_)
            | Self::Stopped { .. } => ErrorKind::Backend,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    pub fn is_corruption(&self) -> bool {
        self.kind() == ErrorKind::Corruption
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind() == ErrorKind::Cancelled
    }

    /// A visitor-initiated stop for [`PasteStore::for_each_meta`](crate::store::PasteStore::for_each_meta).
    pub fn stopped(reason: impl Into<String>) -> Self {
        Self::Stopped {
            reason: reason.into(),
        }
    }
}
