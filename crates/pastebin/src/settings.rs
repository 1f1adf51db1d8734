//! Turn loaded configuration into the runtime settings each component takes.

use std::time::Duration;

use pasteconf::{DefaultsConfig, PasteConfig};
use pastestore::{parse_duration, S3Settings, ServiceConfig, SweeperConfig};
use tracing::warn;

#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    pub service: ServiceConfig,
    pub sweeper: SweeperConfig,
    pub s3: S3Settings,
}

impl RuntimeSettings {
    pub fn from_config(config: &PasteConfig) -> Self {
        let defaults = &config.defaults;
        let storage = &config.infra.storage;

        let service = ServiceConfig {
            default_ttl: duration_or_default(
                "default_ttl",
                &defaults.default_ttl,
                &DefaultsConfig::default_ttl(),
            ),
            max_paste_size: usize::try_from(defaults.max_paste_size).unwrap_or(usize::MAX),
            request_timeout: duration_or_default(
                "request_timeout",
                &defaults.request_timeout,
                &DefaultsConfig::default_request_timeout(),
            ),
        };

        let sweeper = SweeperConfig {
            interval: duration_or_default(
                "cleanup_interval",
                &defaults.cleanup_interval,
                &DefaultsConfig::default_cleanup_interval(),
            ),
        };

        let s3 = S3Settings {
            endpoint: storage.endpoint.clone(),
            region: storage.region.clone(),
            bucket: storage.bucket.clone(),
            access_key: storage.access_key.clone(),
            secret_key: storage.secret_key.clone(),
            use_ssl: storage.use_ssl,
        };

        Self {
            service,
            sweeper,
            s3,
        }
    }
}

/// Parse `value`, falling back to `fallback` on bad or non-positive input.
fn duration_or_default(name: &str, value: &str, fallback: &str) -> Duration {
    match parse_duration(value) {
        Ok(d) if !d.is_zero() => d,
        Ok(_) => {
            warn!(setting = name, value, fallback, "duration must be positive, using default");
            parse_duration(fallback).unwrap_or_default()
        }
        Err(e) => {
            warn!(setting = name, value, fallback, error = %e, "invalid duration, using default");
            parse_duration(fallback).unwrap_or_default()
        }
    }
}
