//! CLI configuration management.
//!
//! Configuration is stored as TOML:
//! - Linux: `~/.config/docupload/config.toml`
//! - Windows: `%APPDATA%/docupload/config.toml`

use std::path::{Path, PathBuf};
use std::time::Duration;

use docupload_uploader::EngineConfig;
use serde::{Deserialize, Serialize};

/// Environment variable that overrides `remote.access_token`.
pub const ACCESS_TOKEN_ENV: &str = "DOCUPLOAD_ACCESS_TOKEN";

/// Uploader configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub remote: RemoteConfig,
}

/// Settings of the HTTP service adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Bearer token sent with every request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl RemoteConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Loads configuration from `path`, or from the platform default location.
    ///
    /// A missing default file yields the defaults; a missing explicit file is
    /// an error.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (config_path(), false),
        };

        let mut config = if path.exists() || explicit {
            let content = std::fs::read_to_string(&path)?;
            let config = Self::parse(&content)?;
            tracing::debug!(path = %path.display(), "configuration loaded");
            config
        } else {
            Config::default()
        };

        if let Ok(token) = std::env::var(ACCESS_TOKEN_ENV)
            && !token.is_empty()
        {
            config.remote.access_token = Some(token);
        }

        Ok(config)
    }

    /// Parses and validates TOML content.
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.engine.validate()?;
        Ok(config)
    }
}

/// Returns the platform-specific configuration file path.
fn config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        PathBuf::from(appdata).join("docupload").join("config.toml")
    }

    #[cfg(not(target_os = "windows"))]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        PathBuf::from(home)
            .join(".config")
            .join("docupload")
            .join("config.toml")
    }
}
