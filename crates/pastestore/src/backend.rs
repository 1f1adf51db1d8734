//! The object-store seam under [`PasteStore`](crate::store::PasteStore).
//!
//! Keys are flat strings (`pastes/…`, `meta/….json`) inside one bucket. The
//! trait is deliberately narrow: it is what an S3-compatible API offers and
//! what the in-memory backend needs to fake for tests.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Errors reported by an object backend.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The key (or bucket) does not exist.
    #[error("object not found: {key}")]
    NotFound { key: String },

    /// Network, credential, permission or protocol failure.
    #[error("{operation} failed: {message}")]
    Transport {
        operation: &'static str,
        message: String,
    },
}

impl BackendError {
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    pub fn transport(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Transport {
            operation,
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// One page of a prefix listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    /// Keys in backend order (lexicographic for S3).
    pub keys: Vec<String>,
    /// Token for the next page; `None` on the last page.
    pub next: Option<String>,
}

/// Storage backend for paste objects.
///
/// Implementations must be safe for concurrent use: the HTTP handlers and the
/// retention sweeper share one instance without external locking.
#[async_trait]
pub trait ObjectBackend: Send + Sync {
    /// Probe the bucket. `Ok(false)` only when the backend says it is absent.
    async fn bucket_exists(&self) -> Result<bool, BackendError>;

    /// Create the bucket.
    async fn create_bucket(&self) -> Result<(), BackendError>;

    /// Write an object, replacing any existing one.
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<(), BackendError>;

    /// Read an object's full body.
    async fn get(&self, key: &str) -> Result<Bytes, BackendError>;

    /// Lightweight existence probe. `Ok(false)` on not-found.
    async fn head(&self, key: &str) -> Result<bool, BackendError>;

    /// Delete an object. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), BackendError>;

    /// List one page of keys under `prefix`, continuing from `token`.
    async fn list_page(&self, prefix: &str, token: Option<String>) -> Result<ListPage, BackendError>;
}
