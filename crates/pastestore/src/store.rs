//! PasteStore: the content-addressed adapter over an [`ObjectBackend`].
//!
//! Layout inside the bucket:
//! ```text
//! pastes/{checksum}        raw content, text/plain; charset=utf-8
//! meta/{checksum}.json     {"checksum","created_at","expires_at","size"}
//! ```
//!
//! Content is always written before metadata and deleted before metadata.
//! There is no rollback across the two objects.

use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::{BackendError, ObjectBackend};
use crate::error::{ObjectKind, StoreError};
use crate::hash::Checksum;
use crate::paste::{Meta, Paste};
use crate::s3::{S3Backend, S3Settings};

pub const CONTENT_PREFIX: &str = "pastes/";
pub const META_PREFIX: &str = "meta/";
pub const CONTENT_TYPE: &str = "text/plain; charset=utf-8";
pub const META_CONTENT_TYPE: &str = "application/json";

/// Object key for a paste's content.
pub fn content_key(checksum: &Checksum) -> String {
    format!("{CONTENT_PREFIX}{checksum}")
}

/// Object key for a paste's metadata document.
pub fn meta_key(checksum: &Checksum) -> String {
    format!("{META_PREFIX}{checksum}.json")
}

/// What a [`PasteStore::for_each_meta`] visitor wants next.
#[derive(Debug)]
pub enum Visit {
    Continue,
    /// Halt iteration; `for_each_meta` returns this error.
    Stop(StoreError),
}

/// Race `fut` against `cancel`. The future is dropped if the token fires first.
async fn guarded<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T, StoreError>>,
) -> Result<T, StoreError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(StoreError::Cancelled),
        result = fut => result,
    }
}

fn backend_error(action: &'static str, object: ObjectKind, source: BackendError) -> StoreError {
    StoreError::Backend {
        action,
        object,
        source,
    }
}

/// Paste storage over one bucket. Cheap to clone; clones share the backend.
#[derive(Clone)]
pub struct PasteStore {
    backend: Arc<dyn ObjectBackend>,
}

impl std::fmt::Debug for PasteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasteStore").finish_non_exhaustive()
    }
}

impl PasteStore {
    /// Wrap a backend without touching the bucket.
    pub fn new(backend: Arc<dyn ObjectBackend>) -> Self {
        Self { backend }
    }

    /// Wrap a backend and make sure its bucket exists.
    ///
    /// A bucket reported absent is created. Any other probe failure
    /// (credentials, permissions, network) is returned as-is.
    pub async fn initialize(
        backend: Arc<dyn ObjectBackend>,
        cancel: &CancellationToken,
    ) -> Result<Self, StoreError> {
        let store = Self::new(backend);
        store.ensure_bucket(cancel).await?;
        Ok(store)
    }

    /// Build an [`S3Backend`] from `settings` and initialize a store over it.
    pub async fn connect_s3(
        settings: &S3Settings,
        cancel: &CancellationToken,
    ) -> Result<Self, StoreError> {
        info!(
            endpoint = %settings.endpoint_url(),
            region = %settings.region,
            bucket = %settings.bucket,
            "connecting to object storage"
        );
        Self::initialize(Arc::new(S3Backend::new(settings)), cancel).await
    }

    async fn ensure_bucket(&self, cancel: &CancellationToken) -> Result<(), StoreError> {
        guarded(cancel, async {
            let exists = self
                .backend
                .bucket_exists()
                .await
                .map_err(StoreError::Bucket)?;
            if !exists {
                info!("bucket missing, creating it");
                self.backend
                    .create_bucket()
                    .await
                    .map_err(StoreError::Bucket)?;
            }
            Ok(())
        })
        .await
    }

    /// Write content, then metadata.
    ///
    /// If the metadata write fails the content object stays behind.
    pub async fn store(
        &self,
        paste: &Paste,
        meta: &Meta,
        cancel: &CancellationToken,
    ) -> Result<(), StoreError> {
        let checksum = &paste.checksum;
        let document = serde_json::to_vec(meta).map_err(|source| StoreError::Encode {
            checksum: checksum.to_string(),
            source,
        })?;

        guarded(cancel, async {
            self.backend
                .put(&content_key(checksum), paste.content.clone(), CONTENT_TYPE)
                .await
                .map_err(|e| backend_error("write", ObjectKind::Content, e))?;

            if cancel.is_cancelled() {
                return Err(StoreError::Cancelled);
            }

            self.backend
                .put(&meta_key(checksum), Bytes::from(document), META_CONTENT_TYPE)
                .await
                .map_err(|e| {
                    warn!(checksum = %checksum, error = %e, "metadata write failed after content write");
                    backend_error("write", ObjectKind::Metadata, e)
                })
        })
        .await?;

        debug!(checksum = %checksum, size = meta.size, expires_at = %meta.expires_at, "paste stored");
        Ok(())
    }

    /// Fetch a paste and its metadata, verifying the content checksum.
    ///
    /// The verified body is returned byte for byte. On a mismatch the
    /// metadata is never read.
    pub async fn get(
        &self,
        checksum: &Checksum,
        cancel: &CancellationToken,
    ) -> Result<(Paste, Meta), StoreError> {
        guarded(cancel, async {
            let body = self
                .backend
                .get(&content_key(checksum))
                .await
                .map_err(|e| match e {
                    BackendError::NotFound { .. } => StoreError::NotFound {
                        checksum: checksum.to_string(),
                        object: ObjectKind::Content,
                    },
                    other => backend_error("read", ObjectKind::Content, other),
                })?;

            if !checksum.matches(&body) {
                let actual = Checksum::from_data(&body);
                warn!(expected = %checksum, actual = %actual, "content checksum mismatch");
                return Err(StoreError::ChecksumMismatch {
                    expected: checksum.to_string(),
                    actual: actual.into_inner(),
                });
            }

            let meta = self.read_meta(&meta_key(checksum), checksum.as_str()).await?;
            let paste = Paste {
                checksum: checksum.clone(),
                content: body,
            };
            Ok((paste, meta))
        })
        .await
    }

    async fn read_meta(&self, key: &str, label: &str) -> Result<Meta, StoreError> {
        let body = self.backend.get(key).await.map_err(|e| match e {
            BackendError::NotFound { .. } => StoreError::NotFound {
                checksum: label.to_string(),
                object: ObjectKind::Metadata,
            },
            other => backend_error("read", ObjectKind::Metadata, other),
        })?;

        serde_json::from_slice(&body).map_err(|source| StoreError::Decode {
            checksum: label.to_string(),
            source,
        })
    }

    /// Delete content, then metadata. Missing objects are not an error.
    pub async fn delete(
        &self,
        checksum: &Checksum,
        cancel: &CancellationToken,
    ) -> Result<(), StoreError> {
        guarded(cancel, async {
            self.backend
                .delete(&content_key(checksum))
                .await
                .map_err(|e| backend_error("delete", ObjectKind::Content, e))?;
            self.backend
                .delete(&meta_key(checksum))
                .await
                .map_err(|e| backend_error("delete", ObjectKind::Metadata, e))
        })
        .await?;

        debug!(checksum = %checksum, "paste deleted");
        Ok(())
    }

    /// HEAD the content object.
    pub async fn exists(
        &self,
        checksum: &Checksum,
        cancel: &CancellationToken,
    ) -> Result<bool, StoreError> {
        guarded(cancel, async {
            self.backend
                .head(&content_key(checksum))
                .await
                .map_err(|e| backend_error("probe", ObjectKind::Content, e))
        })
        .await
    }

    /// Visit every decodable metadata document in listing order.
    ///
    /// Objects that fail to fetch or decode are skipped. Cancellation and a
    /// listing failure end the walk with an error, as does [`Visit::Stop`].
    pub async fn for_each_meta<F, Fut>(
        &self,
        cancel: &CancellationToken,
        mut visit: F,
    ) -> Result<(), StoreError>
    where
        F: FnMut(Meta) -> Fut,
        Fut: Future<Output = Visit>,
    {
        let mut token: Option<String> = None;

        loop {
            let page = guarded(cancel, async {
                self.backend
                    .list_page(META_PREFIX, token.take())
                    .await
                    .map_err(StoreError::Listing)
            })
            .await?;

            for key in &page.keys {
                if cancel.is_cancelled() {
                    return Err(StoreError::Cancelled);
                }

                let meta = match guarded(cancel, self.read_meta(key, key)).await {
                    Ok(meta) => meta,
                    Err(StoreError::Cancelled) => return Err(StoreError::Cancelled),
                    Err(e) => {
                        warn!(key = %key, error = %e, "skipping unreadable metadata");
                        continue;
                    }
                };

                if let Visit::Stop(err) = visit(meta).await {
                    return Err(err);
                }
            }

            match page.next {
                Some(next) => token = Some(next),
                None => return Ok(()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBackend;
    use std::time::Duration;

    fn store_with(backend: &Arc<MemoryBackend>) -> PasteStore {
        PasteStore::new(backend.clone())
    }

    async fn put_paste(store: &PasteStore, content: &str, ttl: Duration) -> (Paste, Meta) {
        let paste = Paste::new(content);
        let meta = Meta::for_paste(&paste, ttl);
        store
            .store(&paste, &meta, &CancellationToken::new())
            .await
            .unwrap();
        (paste, meta)
    }

    #[test]
    fn test_key_layout() {
        let checksum = Checksum::from_data("Hello, World!");
        assert_eq!(
            content_key(&checksum),
            "pastes/dffd6021bb2bd5b0af676290809ec3a53191dd81c7f70a4b28688a362182986f"
        );
        assert_eq!(
            meta_key(&checksum),
            "meta/dffd6021bb2bd5b0af676290809ec3a53191dd81c7f70a4b28688a362182986f.json"
        );
    }

    #[tokio::test]
    async fn test_store_writes_content_then_meta() {
        let backend = Arc::new(MemoryBackend::new().with_operation_log());
        let store = store_with(&backend);
        let (paste, _) = put_paste(&store, "ordering", Duration::from_secs(60)).await;

        assert_eq!(
            backend.operations(),
            vec![
                format!("put {}", content_key(&paste.checksum)),
                format!("put {}", meta_key(&paste.checksum)),
            ]
        );
        assert_eq!(
            backend.content_type(&content_key(&paste.checksum)).as_deref(),
            Some(CONTENT_TYPE)
        );
        assert_eq!(
            backend.content_type(&meta_key(&paste.checksum)).as_deref(),
            Some(META_CONTENT_TYPE)
        );
    }

    #[tokio::test]
    async fn test_content_write_failure_skips_meta() {
        let backend = Arc::new(MemoryBackend::new());
        let store = store_with(&backend);
        let paste = Paste::new("broken");
        let meta = Meta::for_paste(&paste, Duration::from_secs(60));
        backend.fail_puts_for(content_key(&paste.checksum));

        let err = store
            .store(&paste, &meta, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            StoreError::Backend {
                object: ObjectKind::Content,
                ..
            }
        ));
        assert!(backend.keys().is_empty());
    }

    #[tokio::test]
    async fn test_meta_write_failure_leaves_content() {
        let backend = Arc::new(MemoryBackend::new());
        let store = store_with(&backend);
        let paste = Paste::new("half");
        let meta = Meta::for_paste(&paste, Duration::from_secs(60));
        backend.fail_puts_for(meta_key(&paste.checksum));

        let err = store
            .store(&paste, &meta, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            StoreError::Backend {
                object: ObjectKind::Metadata,
                ..
            }
        ));
        assert_eq!(backend.keys(), vec![content_key(&paste.checksum)]);
    }

    #[tokio::test]
    async fn test_get_round_trip() {
        let backend = Arc::new(MemoryBackend::new());
        let store = store_with(&backend);
        let (paste, meta) = put_paste(&store, "round trip", Duration::from_secs(3600)).await;

        let (got, got_meta) = store
            .get(&paste.checksum, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(got, paste);
        assert_eq!(got_meta, meta);
    }

    #[tokio::test]
    async fn test_get_returns_non_utf8_bytes_unchanged() {
        let backend = Arc::new(MemoryBackend::new());
        let store = store_with(&backend);
        let body: &[u8] = b"caf\xe9";
        let checksum = Checksum::from_data(body);
        let meta = Meta::new(checksum.clone(), 4, Duration::from_secs(3600));
        backend.insert_raw(content_key(&checksum), Bytes::from_static(b"caf\xe9"));
        backend.insert_raw(meta_key(&checksum), serde_json::to_vec(&meta).unwrap());

        let (paste, got_meta) = store
            .get(&checksum, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(&paste.content[..], body);
        assert!(checksum.matches(&paste.content));
        assert_eq!(got_meta, meta);
    }

    #[tokio::test]
    async fn test_get_mismatch_skips_meta_fetch() {
        let backend = Arc::new(MemoryBackend::new().with_operation_log());
        let store = store_with(&backend);
        let (paste, _) = put_paste(&store, "original", Duration::from_secs(3600)).await;
        backend.insert_raw(content_key(&paste.checksum), "tampered");

        let err = store
            .get(&paste.checksum, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(err.is_corruption());
        assert!(!backend
            .operations()
            .contains(&format!("get {}", meta_key(&paste.checksum))));
    }

    #[tokio::test]
    async fn test_get_missing_and_undecodable() {
        let backend = Arc::new(MemoryBackend::new());
        let store = store_with(&backend);
        let cancel = CancellationToken::new();

        let missing = Checksum::from_data("never stored");
        assert!(store.get(&missing, &cancel).await.unwrap_err().is_not_found());

        let (paste, _) = put_paste(&store, "garbled meta", Duration::from_secs(60)).await;
        backend.insert_raw(meta_key(&paste.checksum), "{not json");
        let err = store.get(&paste.checksum, &cancel).await.unwrap_err();
        assert!(matches!(err, StoreError::Decode { .. }));
        assert!(err.is_not_found());

        backend.remove_raw(&meta_key(&paste.checksum));
        let err = store.get(&paste.checksum, &cancel).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::NotFound {
                object: ObjectKind::Metadata,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_transport_failure_stays_backend_class() {
        let backend = Arc::new(MemoryBackend::new());
        let store = store_with(&backend);
        let (paste, _) = put_paste(&store, "flaky", Duration::from_secs(60)).await;
        backend.fail_gets_for(content_key(&paste.checksum));

        let err = store
            .get(&paste.checksum, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Backend);
    }

    #[tokio::test]
    async fn test_delete_and_exists() {
        let backend = Arc::new(MemoryBackend::new().with_operation_log());
        let store = store_with(&backend);
        let cancel = CancellationToken::new();
        let (paste, _) = put_paste(&store, "bye", Duration::from_secs(60)).await;

        assert!(store.exists(&paste.checksum, &cancel).await.unwrap());
        store.delete(&paste.checksum, &cancel).await.unwrap();
        assert!(!store.exists(&paste.checksum, &cancel).await.unwrap());
        assert!(backend.keys().is_empty());

        let ops = backend.operations();
        let content_at = ops
            .iter()
            .position(|op| op == &format!("delete {}", content_key(&paste.checksum)))
            .unwrap();
        let meta_at = ops
            .iter()
            .position(|op| op == &format!("delete {}", meta_key(&paste.checksum)))
            .unwrap();
        assert!(content_at < meta_at);
    }

    #[tokio::test]
    async fn test_initialize_creates_missing_bucket() {
        let backend = Arc::new(MemoryBackend::without_bucket());
        PasteStore::initialize(backend.clone(), &CancellationToken::new())
            .await
            .unwrap();
        assert!(backend.bucket_created());
    }

    #[tokio::test]
    async fn test_initialize_fails_on_denied_probe() {
        let backend = Arc::new(MemoryBackend::without_bucket());
        backend.deny_bucket_probe();
        let err = PasteStore::initialize(backend.clone(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Bucket(_)));
        assert!(!backend.bucket_created());
    }

    #[tokio::test]
    async fn test_cancelled_token_short_circuits() {
        let backend = Arc::new(MemoryBackend::new());
        let store = store_with(&backend);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let paste = Paste::new("too late");
        let meta = Meta::for_paste(&paste, Duration::from_secs(60));
        let err = store.store(&paste, &meta, &cancel).await.unwrap_err();

        assert!(err.is_cancelled());
        assert!(backend.keys().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_mid_store_never_writes_meta() {
        let backend = Arc::new(MemoryBackend::new().with_latency(Duration::from_millis(100)));
        let store = store_with(&backend);
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            trigger.cancel();
        });

        let paste = Paste::new("interrupted");
        let meta = Meta::for_paste(&paste, Duration::from_secs(60));
        let err = store.store(&paste, &meta, &cancel).await.unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(backend.keys(), vec![content_key(&paste.checksum)]);
    }

    #[tokio::test]
    async fn test_for_each_meta_pages_and_skips_garbage() {
        let backend = Arc::new(MemoryBackend::new().with_page_size(2));
        let store = store_with(&backend);
        for i in 0..5 {
            put_paste(&store, &format!("paste {i}"), Duration::from_secs(60)).await;
        }
        backend.insert_raw("meta/garbage.json", "not json at all");

        let mut seen = Vec::new();
        store
            .for_each_meta(&CancellationToken::new(), |meta| {
                seen.push(meta.checksum);
                async { Visit::Continue }
            })
            .await
            .unwrap();

        assert_eq!(seen.len(), 5);
    }

    #[tokio::test]
    async fn test_for_each_meta_listing_failure() {
        let backend = Arc::new(MemoryBackend::new());
        let store = store_with(&backend);
        backend.fail_listing();

        let err = store
            .for_each_meta(&CancellationToken::new(), |_| async { Visit::Continue })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Listing(_)));
    }
}
