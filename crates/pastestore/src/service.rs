//! PasteService: what the HTTP layer talks to.
//!
//! Validates input before any I/O, bounds each call by the request timeout,
//! and applies the read-side expiry check.

use std::borrow::Cow;
use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{ErrorKind, StoreError};
use crate::hash::{Checksum, HashError};
use crate::paste::{Meta, Paste};
use crate::store::PasteStore;
use crate::ttl::{self, TtlOption};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// TTL applied when a request names none (or a non-positive one).
    pub default_ttl: Duration,
    /// Largest accepted paste, in bytes.
    pub max_paste_size: usize,
    /// Upper bound on one storage call.
    pub request_timeout: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(365 * 24 * 60 * 60),
            max_paste_size: 1024 * 1024,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid checksum: {0}")]
    InvalidIdentifier(#[from] HashError),

    #[error("content is required")]
    EmptyContent,

    #[error("content exceeds maximum size of {limit} bytes (got {size})")]
    TooLarge { size: usize, limit: usize },

    #[error("paste not found: {0}")]
    NotFound(Checksum),

    #[error("paste has expired: {0}")]
    Expired(Checksum),

    #[error("request exceeded its {0:?} deadline")]
    DeadlineExceeded(Duration),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidIdentifier(_) => ErrorKind::Malformed,
            Self::EmptyContent | Self::TooLarge { .. } => ErrorKind::Rejected,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Expired(_) => ErrorKind::Expired,
            Self::DeadlineExceeded(_) => ErrorKind::Cancelled,
            Self::Store(e) => e.kind(),
        }
    }
}

/// A verified paste with its lifecycle metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
    pub checksum: Checksum,
    /// Exactly the bytes that hash to `checksum`.
    pub content: Bytes,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub size: i64,
}

impl Fetched {
    fn new(paste: Paste, meta: Meta) -> Self {
        Self {
            checksum: paste.checksum,
            content: paste.content,
            created_at: meta.created_at,
            expires_at: meta.expires_at,
            size: meta.size,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// The content as text, with invalid UTF-8 replaced.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.content)
    }
}

#[derive(Debug, Clone)]
pub struct PasteService {
    store: PasteStore,
    config: ServiceConfig,
    shutdown: CancellationToken,
}

impl PasteService {
    /// Requests get child tokens of `shutdown`, so cancelling it aborts them all.
    pub fn new(store: PasteStore, config: ServiceConfig, shutdown: CancellationToken) -> Self {
        Self {
            store,
            config,
            shutdown,
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn store_handle(&self) -> &PasteStore {
        &self.store
    }

    fn request_timeout(&self) -> Duration {
        if self.config.request_timeout.is_zero() {
            DEFAULT_REQUEST_TIMEOUT
        } else {
            self.config.request_timeout
        }
    }

    /// Run `op` under a fresh child token and the request deadline.
    async fn bounded<T, F, Fut>(&self, op: F) -> Result<T, ServiceError>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        let token = self.shutdown.child_token();
        let deadline = self.request_timeout();
        match tokio::time::timeout(deadline, op(token.clone())).await {
            Ok(result) => result,
            Err(_) => {
                token.cancel();
                warn!(timeout = ?deadline, "storage request timed out");
                Err(ServiceError::DeadlineExceeded(deadline))
            }
        }
    }

    /// Store `content` for `ttl` and return its checksum.
    pub async fn store(&self, content: &str, ttl: Duration) -> Result<Checksum, ServiceError> {
        if content.is_empty() {
            return Err(ServiceError::EmptyContent);
        }
        if content.len() > self.config.max_paste_size {
            return Err(ServiceError::TooLarge {
                size: content.len(),
                limit: self.config.max_paste_size,
            });
        }

        let ttl = if ttl.is_zero() {
            ttl::effective_default(self.config.default_ttl)
        } else {
            ttl
        };

        let paste = Paste::new(content);
        let meta = Meta::for_paste(&paste, ttl);
        let (paste_ref, meta_ref) = (&paste, &meta);
        self.bounded(|token| async move {
            self.store
                .store(paste_ref, meta_ref, &token)
                .await
                .map_err(ServiceError::from)
        })
        .await?;

        info!(
            checksum = %paste.checksum,
            size = meta.size,
            ttl = %ttl::format_duration(ttl),
            "paste created"
        );
        Ok(paste.checksum)
    }

    /// Fetch and verify a paste. Expiry is not checked.
    pub async fn fetch(&self, checksum: &str) -> Result<Fetched, ServiceError> {
        let checksum = Checksum::from_str_checked(checksum)?;
        let (paste, meta) = self
            .bounded(|token| async move {
                self.store
                    .get(&checksum, &token)
                    .await
                    .map_err(ServiceError::from)
            })
            .await?;
        Ok(Fetched::new(paste, meta))
    }

    /// [`fetch`](Self::fetch) plus the expiry check.
    ///
    /// An expired paste is deleted on the spot and reported as
    /// [`ServiceError::Expired`]; a failed delete is only logged.
    pub async fn fetch_live(&self, checksum: &str) -> Result<Fetched, ServiceError> {
        let fetched = self.fetch(checksum).await?;
        if !fetched.is_expired_at(Utc::now()) {
            return Ok(fetched);
        }

        let checksum = fetched.checksum;
        let target = &checksum;
        let deleted = self
            .bounded(|token| async move {
                self.store
                    .delete(target, &token)
                    .await
                    .map_err(ServiceError::from)
            })
            .await;
        match deleted {
            Ok(()) => info!(checksum = %checksum, "deleted expired paste on access"),
            Err(e) => warn!(checksum = %checksum, error = %e, "failed to delete expired paste"),
        }
        Err(ServiceError::Expired(checksum))
    }

    /// Delete a paste. A paste that is already gone is [`ServiceError::NotFound`].
    pub async fn remove(&self, checksum: &str) -> Result<(), ServiceError> {
        let checksum = Checksum::from_str_checked(checksum)?;
        let target = &checksum;
        self.bounded(|token| async move {
            let found = self
                .store
                .exists(target, &token)
                .await
                .map_err(ServiceError::from)?;
            if !found {
                return Err(ServiceError::NotFound(target.clone()));
            }
            self.store
                .delete(target, &token)
                .await
                .map_err(ServiceError::from)
        })
        .await?;

        info!(checksum = %checksum, "paste deleted");
        Ok(())
    }

    pub async fn exists(&self, checksum: &str) -> Result<bool, ServiceError> {
        let checksum = Checksum::from_str_checked(checksum)?;
        let found = self
            .bounded(|token| async move {
                self.store
                    .exists(&checksum, &token)
                    .await
                    .map_err(ServiceError::from)
            })
            .await?;
        debug!(found, "existence probe");
        Ok(found)
    }

    /// TTL for a submitted form value, falling back to the configured default.
    pub fn resolve_ttl(&self, requested: Option<&str>) -> Duration {
        ttl::resolve_ttl(requested, self.config.default_ttl)
    }

    pub fn ttl_options(&self) -> Vec<TtlOption> {
        ttl::ttl_options(self.config.default_ttl)
    }
}
