//! MemoryBackend: an in-process bucket.
//!
//! Used by the test suites and by `storage.backend = "memory"` for local runs
//! without an S3 endpoint. Besides plain storage it can simulate latency,
//! small listing pages, a missing bucket and per-key failures.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::backend::{BackendError, ListPage, ObjectBackend};

const DEFAULT_PAGE_SIZE: usize = 1000;

#[derive(Debug, Clone)]
struct StoredObject {
    body: Bytes,
    content_type: String,
}

#[derive(Debug, Default)]
struct MemoryState {
    bucket_exists: bool,
    objects: BTreeMap<String, StoredObject>,
    failing_puts: HashSet<String>,
    failing_gets: HashSet<String>,
    failing_deletes: HashSet<String>,
    failing_listing: bool,
    denied_probe: bool,
    operations: Vec<String>,
}

/// In-memory implementation of [`ObjectBackend`].
#[derive(Debug)]
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
    page_size: usize,
    latency: Option<Duration>,
    log_operations: bool,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// An empty backend whose bucket already exists.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState {
                bucket_exists: true,
                ..Default::default()
            }),
            page_size: DEFAULT_PAGE_SIZE,
            latency: None,
            log_operations: false,
        }
    }

    /// An empty backend with no bucket; `PasteStore::initialize` must create it.
    pub fn without_bucket() -> Self {
        let backend = Self::new();
        backend.lock().bucket_exists = false;
        backend
    }

    /// Return at most `page_size` keys per listing page.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Sleep this long inside every operation.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Keep an ordered log of every operation, readable via [`operations`](Self::operations).
    ///
    /// The log grows without bound, so leave it off for long-running servers.
    pub fn with_operation_log(mut self) -> Self {
        self.log_operations = true;
        self
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        // A panicking test thread must not wedge every other user of the backend.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn record(&self, operation: &str, key: &str) {
        if self.log_operations {
            self.lock().operations.push(format!("{operation} {key}"));
        }
    }

    /// Store raw bytes under `key`, bypassing any checks (out-of-band writes).
    pub fn insert_raw(&self, key: impl Into<String>, body: impl Into<Bytes>) {
        self.lock().objects.insert(
            key.into(),
            StoredObject {
                body: body.into(),
                content_type: "application/octet-stream".to_string(),
            },
        );
    }

    /// Remove `key` out-of-band.
    pub fn remove_raw(&self, key: &str) -> bool {
        self.lock().objects.remove(key).is_some()
    }

    /// Body stored under `key`.
    pub fn object(&self, key: &str) -> Option<Bytes> {
        self.lock().objects.get(key).map(|o| o.body.clone())
    }

    /// Content type stored under `key`.
    pub fn content_type(&self, key: &str) -> Option<String> {
        self.lock().objects.get(key).map(|o| o.content_type.clone())
    }

    /// All keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        self.lock().objects.keys().cloned().collect()
    }

    pub fn bucket_created(&self) -> bool {
        self.lock().bucket_exists
    }

    /// Every operation performed so far, as `"{op} {key}"` strings in order.
    /// Empty unless built [`with_operation_log`](Self::with_operation_log).
    pub fn operations(&self) -> Vec<String> {
        self.lock().operations.clone()
    }

    /// Make writes to `key` fail with a transport error.
    pub fn fail_puts_for(&self, key: impl Into<String>) {
        self.lock().failing_puts.insert(key.into());
    }

    /// Make reads of `key` fail with a transport error.
    pub fn fail_gets_for(&self, key: impl Into<String>) {
        self.lock().failing_gets.insert(key.into());
    }

    /// Make deletes of `key` fail with a transport error.
    pub fn fail_deletes_for(&self, key: impl Into<String>) {
        self.lock().failing_deletes.insert(key.into());
    }

    /// Clear all injected per-key failures.
    pub fn clear_failures(&self) {
        let mut state = self.lock();
        state.failing_puts.clear();
        state.failing_gets.clear();
        state.failing_deletes.clear();
        state.failing_listing = false;
        state.denied_probe = false;
    }

    /// Make every listing call fail.
    pub fn fail_listing(&self) {
        self.lock().failing_listing = true;
    }

    /// Make the bucket probe fail as if access were denied.
    pub fn deny_bucket_probe(&self) {
        self.lock().denied_probe = true;
    }
}

#[async_trait]
impl ObjectBackend for MemoryBackend {
    async fn bucket_exists(&self) -> Result<bool, BackendError> {
        self.simulate_latency().await;
        let state = self.lock();
        if state.denied_probe {
            return Err(BackendError::transport("head bucket", "access denied"));
        }
        Ok(state.bucket_exists)
    }

    async fn create_bucket(&self) -> Result<(), BackendError> {
        self.simulate_latency().await;
        self.lock().bucket_exists = true;
        Ok(())
    }

    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<(), BackendError> {
        self.simulate_latency().await;
        self.record("put", key);
        let mut state = self.lock();
        if state.failing_puts.contains(key) {
            return Err(BackendError::transport("put object", format!("injected failure for {key}")));
        }
        state.objects.insert(
            key.to_string(),
            StoredObject {
                body,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, BackendError> {
        self.simulate_latency().await;
        self.record("get", key);
        let state = self.lock();
        if state.failing_gets.contains(key) {
            return Err(BackendError::transport("get object", format!("injected failure for {key}")));
        }
        state
            .objects
            .get(key)
            .map(|o| o.body.clone())
            .ok_or_else(|| BackendError::not_found(key))
    }

    async fn head(&self, key: &str) -> Result<bool, BackendError> {
        self.simulate_latency().await;
        self.record("head", key);
        Ok(self.lock().objects.contains_key(key))
    }

    async fn delete(&self, key: &str) -> Result<(), BackendError> {
        self.simulate_latency().await;
        self.record("delete", key);
        let mut state = self.lock();
        if state.failing_deletes.contains(key) {
            return Err(BackendError::transport("delete object", format!("injected failure for {key}")));
        }
        state.objects.remove(key);
        Ok(())
    }

    async fn list_page(&self, prefix: &str, token: Option<String>) -> Result<ListPage, BackendError> {
        self.simulate_latency().await;
        self.record("list", prefix);
        let state = self.lock();
        if state.failing_listing {
            return Err(BackendError::transport("list objects", "injected listing failure"));
        }

        // The continuation token is the last key of the previous page.
        let mut keys: Vec<String> = state
            .objects
            .keys()
            .filter(|k| k.starts_with(prefix))
            .filter(|k| token.as_deref().map_or(true, |after| k.as_str() > after))
            .take(self.page_size + 1)
            .cloned()
            .collect();

        let next = if keys.len() > self.page_size {
            keys.truncate(self.page_size);
            keys.last().cloned()
        } else {
            None
        };

        Ok(ListPage { keys, next })
    }
}
