//! Content-addressed paste storage for pastebin.
//!
//! A paste is keyed by the SHA-256 of its content. Each paste is two objects in
//! one S3-compatible bucket: the raw content and a small JSON metadata document
//! carrying its expiry. This crate provides:
//! - **hash**: checksum identity and validation
//! - **store**: the adapter over an [`ObjectBackend`] (S3 or in-memory)
//! - **sweeper**: periodic deletion of expired pastes
//! - **service**: the request-facing API used by the HTTP layer
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use pastestore::{MemoryBackend, PasteService, PasteStore, ServiceConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let shutdown = CancellationToken::new();
//! let store = PasteStore::initialize(Arc::new(MemoryBackend::new()), &shutdown).await?;
//! let service = PasteService::new(store, ServiceConfig::default(), shutdown);
//!
//! let checksum = service.store("Hello, World!", Duration::from_secs(3600)).await?;
//! let paste = service.fetch_live(checksum.as_str()).await?;
//! println!("{} expires at {}", paste.checksum, paste.expires_at);
//! # Ok(())
//! # }
//! ```
//!
//! # Consistency
//!
//! Content is written before metadata and deleted before metadata. A crash
//! between the two leaves an orphan; there is no rollback. Reads always
//! re-verify the checksum, so tampered content is reported as corruption
//! rather than served.

pub mod backend;
pub mod error;
pub mod hash;
pub mod memory;
pub mod paste;
pub mod s3;
pub mod service;
pub mod store;
pub mod sweeper;
pub mod ttl;

pub use backend::{BackendError, ListPage, ObjectBackend};
pub use error::{ErrorKind, ObjectKind, StoreError};
pub use hash::{compute_checksum, is_valid_identifier, Checksum, HashError};
pub use memory::MemoryBackend;
pub use paste::{Meta, Paste};
pub use s3::{S3Backend, S3Settings};
pub use service::{Fetched, PasteService, ServiceConfig, ServiceError};
pub use store::{PasteStore, Visit};
pub use sweeper::{SweepOutcome, SweepReport, SweepState, Sweeper, SweeperConfig};
pub use ttl::{format_duration, parse_duration, DurationError, TtlOption};
