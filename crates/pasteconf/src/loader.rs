//! Config file discovery, loading, and environment variable overlay.

use crate::{ConfigError, PasteConfig};
use std::env;
use std::path::{Path, PathBuf};

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// Discover config files in standard locations.
///
/// Returns paths in load order (system, user, local).
/// Only returns files that exist.
pub fn discover_config_files() -> Vec<PathBuf> {
    discover_config_files_with_override(None)
}

/// Discover config files, optionally with a CLI override path.
///
/// If `cli_path` is provided it replaces the local override. A CLI path that
/// does not exist is still returned so loading reports it.
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/pastebin/config.toml");
    if system.exists() {
        files.push(system);
    }

    // XDG_CONFIG_HOME or ~/.config
    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("pastebin/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = cli_path {
        files.push(path.to_path_buf());
        return files;
    }

    let local = PathBuf::from("pastebin.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Read a TOML file and layer it over `base`.
pub fn load_from_file(path: &Path, base: PasteConfig) -> Result<PasteConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    parse_toml(&contents, path, base)
}

fn parse_error(path: &Path, message: impl Into<String>) -> ConfigError {
    ConfigError::Parse {
        path: path.to_path_buf(),
        message: message.into(),
    }
}

/// Layer a TOML document over `config`. Keys absent from the document keep
/// their current values.
pub fn parse_toml(
    contents: &str,
    path: &Path,
    mut config: PasteConfig,
) -> Result<PasteConfig, ConfigError> {
    let table: toml::Table = contents
        .parse()
        .map_err(|e: toml::de::Error| parse_error(path, e.to_string()))?;

    if let Some(bind) = table.get("bind").and_then(|v| v.as_table()) {
        if let Some(v) = bind.get("host").and_then(|v| v.as_str()) {
            config.infra.bind.host = v.to_string();
        }
        if let Some(v) = bind.get("port").and_then(|v| v.as_integer()) {
            config.infra.bind.port = u16::try_from(v)
                .map_err(|_| parse_error(path, format!("bind.port out of range: {v}")))?;
        }
    }

    if let Some(storage) = table.get("storage").and_then(|v| v.as_table()) {
        if let Some(v) = storage.get("backend").and_then(|v| v.as_str()) {
            config.infra.storage.backend = v.parse().map_err(|e: String| parse_error(path, e))?;
        }
        if let Some(v) = storage.get("endpoint").and_then(|v| v.as_str()) {
            config.infra.storage.endpoint = v.to_string();
        }
        if let Some(v) = storage.get("region").and_then(|v| v.as_str()) {
            config.infra.storage.region = v.to_string();
        }
        if let Some(v) = storage.get("bucket").and_then(|v| v.as_str()) {
            config.infra.storage.bucket = v.to_string();
        }
        if let Some(v) = storage.get("use_ssl").and_then(|v| v.as_bool()) {
            config.infra.storage.use_ssl = v;
        }
        if let Some(v) = storage.get("access_key").and_then(|v| v.as_str()) {
            config.infra.storage.access_key = v.to_string();
        }
        if let Some(v) = storage.get("secret_key").and_then(|v| v.as_str()) {
            config.infra.storage.secret_key = v.to_string();
        }
    }

    if let Some(telemetry) = table.get("telemetry").and_then(|v| v.as_table()) {
        if let Some(v) = telemetry.get("log_level").and_then(|v| v.as_str()) {
            config.infra.telemetry.log_level = v.to_string();
        }
        if let Some(v) = telemetry.get("log_format").and_then(|v| v.as_str()) {
            config.infra.telemetry.log_format =
                v.parse().map_err(|e: String| parse_error(path, e))?;
        }
        if let Some(v) = telemetry.get("otlp_endpoint").and_then(|v| v.as_str()) {
            config.infra.telemetry.otlp_endpoint = v.to_string();
        }
    }

    if let Some(defaults) = table.get("defaults").and_then(|v| v.as_table()) {
        if let Some(v) = defaults.get("cleanup_interval").and_then(|v| v.as_str()) {
            config.defaults.cleanup_interval = v.to_string();
        }
        if let Some(v) = defaults.get("default_ttl").and_then(|v| v.as_str()) {
            config.defaults.default_ttl = v.to_string();
        }
        if let Some(v) = defaults.get("max_paste_size").and_then(|v| v.as_integer()) {
            config.defaults.max_paste_size = u64::try_from(v).map_err(|_| {
                parse_error(path, format!("defaults.max_paste_size must be positive: {v}"))
            })?;
        }
        if let Some(v) = defaults.get("request_timeout").and_then(|v| v.as_str()) {
            config.defaults.request_timeout = v.to_string();
        }
    }

    Ok(config)
}

/// `strconv.ParseBool` spelling, which existing deployments use.
fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

/// Apply environment variable overrides to config.
pub fn apply_env_overrides(config: &mut PasteConfig, sources: &mut ConfigSources) {
    apply_overrides_from(config, sources, |key| env::var(key).ok());
}

/// Apply overrides from an arbitrary variable lookup.
///
/// Empty values count as unset. Values that fail to parse are skipped and
/// the previous value is kept.
pub fn apply_overrides_from<F>(config: &mut PasteConfig, sources: &mut ConfigSources, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
    let mut applied = |key: &str| sources.env_overrides.push(key.to_string());

    // Bind
    if let Some(v) = get("PASTEBIN_HOST") {
        config.infra.bind.host = v;
        applied("PASTEBIN_HOST");
    }
    if let Some(port) = get("PASTEBIN_PORT").and_then(|v| v.parse().ok()) {
        config.infra.bind.port = port;
        applied("PASTEBIN_PORT");
    }

    // Storage
    if let Some(backend) = get("PASTEBIN_STORAGE_BACKEND").and_then(|v| v.parse().ok()) {
        config.infra.storage.backend = backend;
        applied("PASTEBIN_STORAGE_BACKEND");
    }
    if let Some(v) = get("S3_ENDPOINT") {
        config.infra.storage.endpoint = v;
        applied("S3_ENDPOINT");
    }
    if let Some(v) = get("S3_REGION") {
        config.infra.storage.region = v;
        applied("S3_REGION");
    }
    if let Some(v) = get("S3_BUCKET") {
        config.infra.storage.bucket = v;
        applied("S3_BUCKET");
    }
    if let Some(v) = get("S3_USE_SSL").and_then(|v| parse_bool(&v)) {
        config.infra.storage.use_ssl = v;
        applied("S3_USE_SSL");
    }
    if let Some(v) = get("AWS_ACCESS_KEY_ID") {
        config.infra.storage.access_key = v;
        applied("AWS_ACCESS_KEY_ID");
    }
    if let Some(v) = get("AWS_SECRET_ACCESS_KEY") {
        config.infra.storage.secret_key = v;
        applied("AWS_SECRET_ACCESS_KEY");
    }

    // Telemetry
    if let Some(v) = get("LOG_LEVEL") {
        config.infra.telemetry.log_level = v;
        applied("LOG_LEVEL");
    }
    if let Some(format) = get("LOG_FORMAT").and_then(|v| v.parse().ok()) {
        config.infra.telemetry.log_format = format;
        applied("LOG_FORMAT");
    }
    if let Some(v) = get("PASTEBIN_OTLP_ENDPOINT") {
        config.infra.telemetry.otlp_endpoint = v;
        applied("PASTEBIN_OTLP_ENDPOINT");
    }
    // Also support standard OTEL env var
    if let Some(v) = get("OTEL_EXPORTER_OTLP_ENDPOINT") {
        config.infra.telemetry.otlp_endpoint = v;
        applied("OTEL_EXPORTER_OTLP_ENDPOINT");
    }

    // Defaults
    if let Some(v) = get("CLEANUP_INTERVAL") {
        config.defaults.cleanup_interval = v;
        applied("CLEANUP_INTERVAL");
    }
    if let Some(v) = get("DEFAULT_TTL") {
        config.defaults.default_ttl = v;
        applied("DEFAULT_TTL");
    }
    if let Some(size) = get("MAX_PASTE_SIZE").and_then(|v| v.parse().ok()) {
        config.defaults.max_paste_size = size;
        applied("MAX_PASTE_SIZE");
    }
    if let Some(v) = get("PASTEBIN_REQUEST_TIMEOUT") {
        config.defaults.request_timeout = v;
        applied("PASTEBIN_REQUEST_TIMEOUT");
    }
}
