//! Layered configuration loading for pastebin.
//!
//! # Configuration Philosophy
//!
//! - **Infrastructure** (`InfraConfig`): bind address, object storage
//!   connection, telemetry. Fixed for the life of the process.
//!
//! - **Defaults** (`DefaultsConfig`): paste limits, default TTL, sweep cadence
//!   and request deadline.
//!
//! # Usage
//!
//! ```rust,no_run
//! use pasteconf::PasteConfig;
//!
//! let config = PasteConfig::load().expect("Failed to load config");
//! config.validate().expect("Invalid config");
//!
//! println!("Listening on {}", config.infra.bind.addr());
//! println!("Bucket: {}", config.infra.storage.bucket);
//! ```
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins):
//! 1. `/etc/pastebin/config.toml` (system)
//! 2. `~/.config/pastebin/config.toml` (user)
//! 3. `./pastebin.toml` (local override) or the `--config` path
//! 4. Environment variables (`PASTEBIN_*`, `S3_*`, `AWS_*`, ...)
//!
//! # Example Config
//!
//! ```toml
//! [bind]
//! host = "0.0.0.0"
//! port = 8080
//!
//! [storage]
//! endpoint = "minio:9000"
//! bucket = "pastes"
//! use_ssl = false
//!
//! [telemetry]
//! log_level = "info"
//! log_format = "json"
//!
//! [defaults]
//! default_ttl = "168h"
//! cleanup_interval = "30m"
//! ```

pub mod defaults;
pub mod infra;
pub mod loader;

pub use defaults::DefaultsConfig;
pub use infra::{BindConfig, InfraConfig, LogFormat, StorageBackend, StorageConfig, TelemetryConfig};
pub use loader::{discover_config_files_with_override, ConfigSources};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Complete pastebin configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasteConfig {
    #[serde(flatten)]
    pub infra: InfraConfig,

    #[serde(default)]
    pub defaults: DefaultsConfig,
}

impl PasteConfig {
    /// Load configuration from all sources.
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load configuration with `config_path` in place of `./pastebin.toml`.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration from optional path and return information about sources.
    pub fn load_with_sources_from(
        config_path: Option<&Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut config = PasteConfig::default();

        for path in loader::discover_config_files_with_override(config_path) {
            config = loader::load_from_file(&path, config)?;
            sources.files.push(path);
        }

        loader::apply_env_overrides(&mut config, &mut sources);

        Ok((config, sources))
    }

    /// Check for settings the service cannot start without.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let storage = &self.infra.storage;
        if storage.backend == StorageBackend::S3 && storage.bucket.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "storage.bucket is required for the s3 backend (set S3_BUCKET)".to_string(),
            ));
        }
        if self.defaults.max_paste_size == 0 {
            return Err(ConfigError::Invalid(
                "defaults.max_paste_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Serialize config to TOML string. The secret key is redacted.
    pub fn to_toml(&self) -> String {
        // Build TOML manually for nicer formatting
        let mut output = String::new();
        let infra = &self.infra;

        output.push_str("# Pastebin Configuration\n\n");

        output.push_str("[bind]\n");
        output.push_str(&format!("host = \"{}\"\n", infra.bind.host));
        output.push_str(&format!("port = {}\n", infra.bind.port));

        output.push_str("\n[storage]\n");
        output.push_str(&format!("backend = \"{}\"\n", infra.storage.backend));
        output.push_str(&format!("endpoint = \"{}\"\n", infra.storage.endpoint));
        output.push_str(&format!("region = \"{}\"\n", infra.storage.region));
        output.push_str(&format!("bucket = \"{}\"\n", infra.storage.bucket));
        output.push_str(&format!("use_ssl = {}\n", infra.storage.use_ssl));
        output.push_str(&format!("access_key = \"{}\"\n", infra.storage.access_key));
        let secret = if infra.storage.secret_key.is_empty() {
            ""
        } else {
            "<redacted>"
        };
        output.push_str(&format!("secret_key = \"{secret}\"\n"));

        output.push_str("\n[telemetry]\n");
        output.push_str(&format!("log_level = \"{}\"\n", infra.telemetry.log_level));
        output.push_str(&format!("log_format = \"{}\"\n", infra.telemetry.log_format));
        output.push_str(&format!(
            "otlp_endpoint = \"{}\"\n",
            infra.telemetry.otlp_endpoint
        ));

        output.push_str("\n[defaults]\n");
        output.push_str(&format!(
            "cleanup_interval = \"{}\"\n",
            self.defaults.cleanup_interval
        ));
        output.push_str(&format!("default_ttl = \"{}\"\n", self.defaults.default_ttl));
        output.push_str(&format!(
            "max_paste_size = {}\n",
            self.defaults.max_paste_size
        ));
        output.push_str(&format!(
            "request_timeout = \"{}\"\n",
            self.defaults.request_timeout
        ));

        output
    }
}
