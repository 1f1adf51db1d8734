//! Paste content and the metadata stored beside it.
//!
//! Metadata is a small JSON document in `meta/{checksum}.json` so the sweeper
//! can decide expiry without reading the content itself.

use bytes::Bytes;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::time::Duration;

use crate::hash::Checksum;

/// Immutable paste content, identified by its checksum.
///
/// Content is kept as the exact bytes that were hashed. Bodies written by
/// other instances are not guaranteed to be UTF-8.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paste {
    pub checksum: Checksum,
    pub content: Bytes,
}

impl Paste {
    /// Create a paste, deriving its checksum from the content.
    pub fn new(content: impl AsRef<[u8]>) -> Self {
        let content = Bytes::copy_from_slice(content.as_ref());
        Self {
            checksum: Checksum::from_data(&content),
            content,
        }
    }

    /// The content as text, with invalid UTF-8 replaced.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.content)
    }

    /// Byte length of the content.
    pub fn size(&self) -> i64 {
        i64::try_from(self.content.len()).unwrap_or(i64::MAX)
    }
}

/// Lifecycle metadata for one paste.
///
/// Serialized as `{"checksum","created_at","expires_at","size"}` with RFC 3339
/// timestamps; the field names are shared with every deployment using the bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    pub checksum: Checksum,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub size: i64,
}

impl Meta {
    /// Metadata for a paste created now that lives for `ttl`.
    pub fn new(checksum: Checksum, size: i64, ttl: Duration) -> Self {
        Self::created_at(checksum, size, ttl, Utc::now())
    }

    /// Metadata for a paste created at `now`.
    ///
    /// A TTL too large to represent saturates at the latest representable instant.
    pub fn created_at(checksum: Checksum, size: i64, ttl: Duration, now: DateTime<Utc>) -> Self {
        let expires_at = TimeDelta::from_std(ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        Self {
            checksum,
            created_at: now,
            expires_at,
            size,
        }
    }

    /// Metadata describing `paste`.
    pub fn for_paste(paste: &Paste, ttl: Duration) -> Self {
        Self::new(paste.checksum.clone(), paste.size(), ttl)
    }

    /// True once `now` has reached `expires_at`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_now() -> DateTime<Utc> {
        "2024-06-01T12:00:00Z".parse().unwrap()
    }

    #[test]
    fn test_paste_new_derives_checksum() {
        let paste = Paste::new("Hello, World!");
        assert_eq!(
            paste.checksum.as_str(),
            "dffd6021bb2bd5b0af676290809ec3a53191dd81c7f70a4b28688a362182986f"
        );
        assert_eq!(paste.size(), 13);
    }

    #[test]
    fn test_non_utf8_content_keeps_bytes() {
        let paste = Paste::new(b"caf\xe9");
        assert_eq!(&paste.content[..], b"caf\xe9");
        assert_eq!(paste.size(), 4);
        assert!(paste.checksum.matches(&paste.content));
        assert_eq!(paste.text(), "caf\u{FFFD}");
    }

    #[test]
    fn test_meta_expiry_arithmetic() {
        let paste = Paste::new("ttl");
        let meta = Meta::created_at(paste.checksum, 3, Duration::from_secs(3600), fixed_now());

        assert_eq!(meta.created_at, fixed_now());
        assert_eq!(meta.expires_at, fixed_now() + TimeDelta::hours(1));
    }

    #[test]
    fn test_expired_boundary_is_inclusive() {
        let meta = Meta::created_at(
            Checksum::from_data("edge"),
            4,
            Duration::from_secs(60),
            fixed_now(),
        );

        assert!(!meta.is_expired_at(fixed_now() + TimeDelta::seconds(59)));
        assert!(meta.is_expired_at(fixed_now() + TimeDelta::seconds(60)));
        assert!(meta.is_expired_at(fixed_now() + TimeDelta::days(1)));
    }

    #[test]
    fn test_huge_ttl_saturates() {
        let meta = Meta::created_at(
            Checksum::from_data("forever"),
            7,
            Duration::from_secs(u64::MAX),
            fixed_now(),
        );
        assert_eq!(meta.expires_at, DateTime::<Utc>::MAX_UTC);
        assert!(!meta.is_expired());
    }

    #[test]
    fn test_meta_json_layout() {
        let meta = Meta::created_at(
            Checksum::from_data("json"),
            4,
            Duration::from_secs(86_400),
            fixed_now(),
        );
        let value: serde_json::Value = serde_json::to_value(&meta).unwrap();

        assert_eq!(value["checksum"], meta.checksum.as_str());
        assert_eq!(value["created_at"], "2024-06-01T12:00:00Z");
        assert_eq!(value["expires_at"], "2024-06-02T12:00:00Z");
        assert_eq!(value["size"], 4);
    }

    #[test]
    fn test_meta_decodes_foreign_offsets() {
        // Documents written by other instances may carry a local offset and nanos.
        let checksum = Checksum::from_data("offset");
        let json = format!(
            r#"{{"checksum":"{checksum}","created_at":"2024-06-01T14:00:00.123456789+02:00","expires_at":"2024-06-02T14:00:00+02:00","size":6}}"#
        );
        let meta: Meta = serde_json::from_str(&json).unwrap();

        assert_eq!(meta.expires_at, "2024-06-02T12:00:00Z".parse::<DateTime<Utc>>().unwrap());
        assert_eq!(meta.size, 6);
    }

    #[test]
    fn test_meta_rejects_bad_checksum() {
        let json = r#"{"checksum":"nope","created_at":"2024-06-01T12:00:00Z","expires_at":"2024-06-01T12:00:00Z","size":1}"#;
        assert!(serde_json::from_str::<Meta>(json).is_err());
    }
}
