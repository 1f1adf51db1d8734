//! S3 wire behaviour against a mock server.
//!
//! These tests verify:
//! - Path-style keys under the bucket
//! - Bucket provisioning on first start, and hard failure on denied probes
//! - Content types for both objects
//! - Delete ordering and not-found mapping
//! - Corrupt content never triggers a metadata read

use std::time::Duration;

use anyhow::Result;
use pastestore::{
    BackendError, Checksum, Meta, ObjectBackend, Paste, PasteStore, S3Backend, S3Settings,
    StoreError,
};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const BUCKET: &str = "pastes";

fn settings_for(server: &MockServer) -> S3Settings {
    S3Settings {
        endpoint: server.uri().trim_start_matches("http://").to_string(),
        region: "us-east-1".to_string(),
        bucket: BUCKET.to_string(),
        access_key: "test-access".to_string(),
        secret_key: "test-secret".to_string(),
        use_ssl: false,
    }
}

fn backend_for(server: &MockServer) -> S3Backend {
    S3Backend::new(&settings_for(server))
}

fn object_path(key: &str) -> String {
    format!("/{BUCKET}/{key}")
}

#[tokio::test]
async fn test_missing_bucket_is_created() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path(format!("/{BUCKET}")))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(format!("/{BUCKET}")))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    PasteStore::connect_s3(&settings_for(&server), &CancellationToken::new()).await?;
    Ok(())
}

#[tokio::test]
async fn test_existing_bucket_is_left_alone() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path(format!("/{BUCKET}")))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    PasteStore::connect_s3(&settings_for(&server), &CancellationToken::new()).await?;
    Ok(())
}

#[tokio::test]
async fn test_denied_bucket_probe_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path(format!("/{BUCKET}")))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = PasteStore::connect_s3(&settings_for(&server), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Bucket(BackendError::Transport { .. })));
}

#[tokio::test]
async fn test_store_puts_both_objects_with_content_types() -> Result<()> {
    let server = MockServer::start().await;
    let paste = Paste::new("Hello, World!");
    let meta = Meta::for_paste(&paste, Duration::from_secs(3600));

    Mock::given(method("PUT"))
        .and(path(object_path(&format!("pastes/{}", paste.checksum))))
        .and(header("content-type", "text/plain; charset=utf-8"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(object_path(&format!("meta/{}.json", paste.checksum))))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let store = PasteStore::new(std::sync::Arc::new(backend_for(&server)));
    store.store(&paste, &meta, &CancellationToken::new()).await?;

    let requests = server.received_requests().await.unwrap_or_default();
    let paths: Vec<&str> = requests.iter().map(|r| r.url.path()).collect();
    assert_eq!(paths.len(), 2);
    assert!(paths[0].starts_with("/pastes/pastes/"));
    assert!(paths[1].starts_with("/pastes/meta/"));

    Ok(())
}

#[tokio::test]
async fn test_delete_removes_content_then_meta() -> Result<()> {
    let server = MockServer::start().await;
    let checksum = Checksum::from_data("bye");

    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(204))
        .expect(2)
        .mount(&server)
        .await;

    let store = PasteStore::new(std::sync::Arc::new(backend_for(&server)));
    store.delete(&checksum, &CancellationToken::new()).await?;

    let requests = server.received_requests().await.unwrap_or_default();
    let paths: Vec<String> = requests.iter().map(|r| r.url.path().to_string()).collect();
    assert_eq!(
        paths,
        vec![
            object_path(&format!("pastes/{checksum}")),
            object_path(&format!("meta/{checksum}.json")),
        ]
    );

    Ok(())
}

#[tokio::test]
async fn test_head_not_found_is_false() -> Result<()> {
    let server = MockServer::start().await;
    let present = Checksum::from_data("here");
    let absent = Checksum::from_data("gone");

    Mock::given(method("HEAD"))
        .and(path(object_path(&format!("pastes/{present}"))))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path(object_path(&format!("pastes/{absent}"))))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let store = PasteStore::new(std::sync::Arc::new(backend_for(&server)));
    let cancel = CancellationToken::new();
    assert!(store.exists(&present, &cancel).await?);
    assert!(!store.exists(&absent, &cancel).await?);

    Ok(())
}

#[tokio::test]
async fn test_server_error_on_head_propagates() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let err = backend.head("pastes/anything").await.unwrap_err();
    assert!(matches!(err, BackendError::Transport { .. }));
}

#[tokio::test]
async fn test_tampered_content_skips_meta_fetch() {
    let server = MockServer::start().await;
    let checksum = Checksum::from_data("original");

    Mock::given(method("GET"))
        .and(path(object_path(&format!("pastes/{checksum}"))))
        .respond_with(ResponseTemplate::new(200).set_body_string("tampered"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(object_path(&format!("meta/{checksum}.json"))))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .expect(0)
        .mount(&server)
        .await;

    let store = PasteStore::new(std::sync::Arc::new(backend_for(&server)));
    let err = store
        .get(&checksum, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(err.is_corruption());
}

#[tokio::test]
async fn test_get_round_trip_over_the_wire() -> Result<()> {
    let server = MockServer::start().await;
    let paste = Paste::new("over the wire");
    let meta = Meta::for_paste(&paste, Duration::from_secs(60));

    Mock::given(method("GET"))
        .and(path(object_path(&format!("pastes/{}", paste.checksum))))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(paste.content.to_vec()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(object_path(&format!("meta/{}.json", paste.checksum))))
        .respond_with(ResponseTemplate::new(200).set_body_json(&meta))
        .mount(&server)
        .await;

    let store = PasteStore::new(std::sync::Arc::new(backend_for(&server)));
    let (got, got_meta) = store.get(&paste.checksum, &CancellationToken::new()).await?;
    assert_eq!(got, paste);
    assert_eq!(got_meta, meta);

    Ok(())
}

#[tokio::test]
async fn test_missing_content_is_not_found() {
    let server = MockServer::start().await;
    let checksum = Checksum::from_data("nobody home");

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_string(
            r#"<?xml version="1.0" encoding="UTF-8"?><Error><Code>NoSuchKey</Code><Message>The specified key does not exist.</Message></Error>"#,
        ))
        .mount(&server)
        .await;

    let store = PasteStore::new(std::sync::Arc::new(backend_for(&server)));
    let err = store
        .get(&checksum, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

fn list_body(keys: &[&str], next: Option<&str>) -> String {
    let contents: String = keys
        .iter()
        .map(|k| {
            format!(
                "<Contents><Key>{k}</Key><LastModified>2024-06-01T12:00:00.000Z</LastModified><ETag>&quot;0&quot;</ETag><Size>100</Size><StorageClass>STANDARD</StorageClass></Contents>"
            )
        })
        .collect();
    let truncated = match next {
        Some(token) => format!(
            "<IsTruncated>true</IsTruncated><NextContinuationToken>{token}</NextContinuationToken>"
        ),
        None => "<IsTruncated>false</IsTruncated>".to_string(),
    };
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/"><Name>{BUCKET}</Name><Prefix>meta/</Prefix><KeyCount>{}</KeyCount><MaxKeys>1000</MaxKeys>{truncated}{contents}</ListBucketResult>"#,
        keys.len()
    )
}

#[tokio::test]
async fn test_listing_follows_continuation_tokens() -> Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("/{BUCKET}")))
        .and(query_param("list-type", "2"))
        .and(query_param("continuation-token", "page-2"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(list_body(&["meta/c.json"], None), "application/xml"),
        )
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/{BUCKET}")))
        .and(query_param("list-type", "2"))
        .and(query_param("prefix", "meta/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            list_body(&["meta/a.json", "meta/b.json"], Some("page-2")),
            "application/xml",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let first = backend.list_page("meta/", None).await?;
    assert_eq!(first.keys, vec!["meta/a.json", "meta/b.json"]);
    assert_eq!(first.next.as_deref(), Some("page-2"));

    let second = backend.list_page("meta/", first.next).await?;
    assert_eq!(second.keys, vec!["meta/c.json"]);
    assert_eq!(second.next, None);

    Ok(())
}
