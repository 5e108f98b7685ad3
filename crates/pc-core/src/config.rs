//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from JSON and carries the
//! upstream, store, server and delay sections. Every section defaults
//! sensibly so a completely empty `{}` file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::Error;

/// Config file looked up when no path is given.
pub const DEFAULT_CONFIG_PATH: &str = "./stream.json";

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub upstream: UpstreamConfig,
    pub store: StoreConfig,
    pub server: ServerConfig,
    pub delay: DelayConfig,
}

impl Config {
    /// Deserialize a `Config` from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }

    /// Load configuration from a file, failing on any read or parse error.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Validation(format!("cannot read config {}: {e}", path.display()))
        })?;
        Self::from_json(&contents)
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None` or the file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH));

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.upstream.url.is_empty() {
            warnings.push("upstream.url is empty; the collector cannot run".into());
        } else if !self.upstream.url.starts_with("http://")
            && !self.upstream.url.starts_with("https://")
        {
            warnings.push(format!(
                "upstream.url '{}' is not an http(s) URL",
                self.upstream.url
            ));
        }

        if self.upstream.request_timeout_secs == 0 {
            warnings.push("upstream.request_timeout_secs is 0; requests never time out".into());
        }

        if self.server.port == 0 {
            warnings.push("server.port is 0; a random port will be assigned".into());
        }

        if self.delay.fragments == 0 {
            warnings.push("delay.fragments is 0; delayed clients get the live edge".into());
        }

        warnings
    }

    /// Error unless an upstream URL is configured.
    pub fn require_upstream(&self) -> Result<&str> {
        if self.upstream.url.is_empty() {
            return Err(Error::Validation("upstream.url must be set".into()));
        }
        Ok(self.upstream.base_url())
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Remote playcast source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL; `/sync` and `/{number}/{type}` are appended.
    pub url: String,
    pub request_timeout_secs: u64,
}

impl UpstreamConfig {
    /// URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            request_timeout_secs: 5,
        }
    }
}

/// Fragment store location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub directory: PathBuf,
    /// Wipe fragments left by a previous session before collecting.
    pub clear_on_start: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./packets"),
            clear_on_start: true,
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
        }
    }
}

/// Delayed playback settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DelayConfig {
    /// Requested lag in fragments.
    pub fragments: u64,
    /// Added on top of the missing-fragment wait.
    pub safety_margin_secs: u64,
    /// Re-read the buffer after a catch-up wait before answering.
    pub revalidate: bool,
}

impl Default for DelayConfig {
    fn default() -> Self {
        Self {
            fragments: 50,
            safety_margin_secs: 5,
            revalidate: true,
        }
    }
}
