//! S3Backend: [`ObjectBackend`] over any S3-compatible endpoint.
//!
//! Uses path-style addressing (`{endpoint}/{bucket}/{key}`), which MinIO,
//! Ceph RGW, Garage and friends need. Retries are disabled: retry policy
//! belongs to callers, and the request deadline must bound the whole call.
//! Flexible checksums are only sent when an operation requires them; several
//! S3-compatible servers reject the chunked trailer encoding.

use async_trait::async_trait;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::config::retry::RetryConfig;
use aws_sdk_s3::config::{
    BehaviorVersion, Builder, Credentials, Region, RequestChecksumCalculation,
    ResponseChecksumValidation,
};
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;

use crate::backend::{BackendError, ListPage, ObjectBackend};

/// Connection settings for an S3-compatible bucket.
#[derive(Clone)]
pub struct S3Settings {
    /// Host and optional port, without scheme (e.g. `minio:9000`).
    pub endpoint: String,
    pub region: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    /// Use `https://` when true, `http://` otherwise.
    pub use_ssl: bool,
}

impl S3Settings {
    /// The endpoint URL with scheme.
    pub fn endpoint_url(&self) -> String {
        let scheme = if self.use_ssl { "https" } else { "http" };
        format!("{}://{}", scheme, self.endpoint)
    }
}

impl std::fmt::Debug for S3Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Settings")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("bucket", &self.bucket)
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("use_ssl", &self.use_ssl)
            .finish()
    }
}

/// S3-compatible object backend bound to one bucket.
#[derive(Debug, Clone)]
pub struct S3Backend {
    client: Client,
    bucket: String,
}

impl S3Backend {
    /// Build a client for `settings`. Performs no network I/O.
    pub fn new(settings: &S3Settings) -> Self {
        let credentials = Credentials::new(
            settings.access_key.clone(),
            settings.secret_key.clone(),
            None,
            None,
            "pastebin-static",
        );

        let config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()))
            .endpoint_url(settings.endpoint_url())
            .credentials_provider(credentials)
            .force_path_style(true)
            .retry_config(RetryConfig::disabled())
            .request_checksum_calculation(RequestChecksumCalculation::WhenRequired)
            .response_checksum_validation(ResponseChecksumValidation::WhenRequired)
            .build();

        Self {
            client: Client::from_conf(config),
            bucket: settings.bucket.clone(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

fn status_of<E>(err: &SdkError<E, HttpResponse>) -> Option<u16> {
    err.raw_response().map(|r| r.status().as_u16())
}

fn transport<E>(operation: &'static str, err: SdkError<E, HttpResponse>) -> BackendError
where
    E: std::error::Error + Send + Sync + 'static,
{
    BackendError::transport(operation, DisplayErrorContext(&err).to_string())
}

#[async_trait]
impl ObjectBackend for S3Backend {
    async fn bucket_exists(&self) -> Result<bool, BackendError> {
        match self.client.head_bucket().bucket(&self.bucket).send().await {
            Ok(_) => Ok(true),
            Err(err) => {
                let missing = err.as_service_error().is_some_and(|e| e.is_not_found())
                    || status_of(&err) == Some(404);
                if missing {
                    Ok(false)
                } else {
                    Err(transport("head bucket", err))
                }
            }
        }
    }

    async fn create_bucket(&self) -> Result<(), BackendError> {
        self.client
            .create_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|err| transport("create bucket", err))?;
        Ok(())
    }

    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<(), BackendError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|err| transport("put object", err))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, BackendError> {
        let output = match self.client.get_object().bucket(&self.bucket).key(key).send().await {
            Ok(output) => output,
            Err(err) => {
                let missing = err.as_service_error().is_some_and(|e| e.is_no_such_key())
                    || status_of(&err) == Some(404);
                return Err(if missing {
                    BackendError::not_found(key)
                } else {
                    transport("get object", err)
                });
            }
        };

        let body = output
            .body
            .collect()
            .await
            .map_err(|err| BackendError::transport("read object body", err.to_string()))?;
        Ok(body.into_bytes())
    }

    async fn head(&self, key: &str) -> Result<bool, BackendError> {
        match self.client.head_object().bucket(&self.bucket).key(key).send().await {
            Ok(_) => Ok(true),
            Err(err) => {
                let missing = err.as_service_error().is_some_and(|e| e.is_not_found())
                    || status_of(&err) == Some(404);
                if missing {
                    Ok(false)
                } else {
                    Err(transport("head object", err))
                }
            }
        }
    }

    async fn delete(&self, key: &str) -> Result<(), BackendError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| transport("delete object", err))?;
        Ok(())
    }

    async fn list_page(&self, prefix: &str, token: Option<String>) -> Result<ListPage, BackendError> {
        let output = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .set_continuation_token(token)
            .send()
            .await
            .map_err(|err| transport("list objects", err))?;

        let keys = output
            .contents()
            .iter()
            .filter_map(|object| object.key().map(str::to_string))
            .collect();

        let next = if output.is_truncated().unwrap_or(false) {
            output.next_continuation_token().map(str::to_string)
        } else {
            None
        };

        Ok(ListPage { keys, next })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(use_ssl: bool) -> S3Settings {
        S3Settings {
            endpoint: "minio:9000".to_string(),
            region: "us-east-1".to_string(),
            bucket: "pastes".to_string(),
            access_key: "access".to_string(),
            secret_key: "super-secret".to_string(),
            use_ssl,
        }
    }

    #[test]
    fn test_endpoint_url_scheme() {
        assert_eq!(settings(true).endpoint_url(), "https://minio:9000");
        assert_eq!(settings(false).endpoint_url(), "http://minio:9000");
    }

    #[test]
    fn test_debug_redacts_secret() {
        let rendered = format!("{:?}", settings(true));
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
