//! Service defaults - paste limits, TTLs, and sweep cadence.
//!
//! Durations stay strings here (`"1h"`, `"8760h"`); the binary parses them
//! with the same grammar as submitted TTLs.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Time between retention sweeps.
    /// Default: "1h"
    #[serde(default = "DefaultsConfig::default_cleanup_interval")]
    pub cleanup_interval: String,

    /// TTL for pastes submitted without one.
    /// Default: "8760h" (one year)
    #[serde(default = "DefaultsConfig::default_ttl")]
    pub default_ttl: String,

    /// Largest accepted paste in bytes.
    /// Default: 1 MiB
    #[serde(default = "DefaultsConfig::default_max_paste_size")]
    pub max_paste_size: u64,

    /// Deadline for one storage request.
    /// Default: "30s"
    #[serde(default = "DefaultsConfig::default_request_timeout")]
    pub request_timeout: String,
}

impl DefaultsConfig {
    pub fn default_cleanup_interval() -> String {
        "1h".to_string()
    }

    pub fn default_ttl() -> String {
        "8760h".to_string()
    }

    pub fn default_max_paste_size() -> u64 {
        1024 * 1024
    }

    pub fn default_request_timeout() -> String {
        "30s".to_string()
    }
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            cleanup_interval: Self::default_cleanup_interval(),
            default_ttl: Self::default_ttl(),
            max_paste_size: Self::default_max_paste_size(),
            request_timeout: Self::default_request_timeout(),
        }
    }
}
