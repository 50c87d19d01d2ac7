//! Demo configuration file.
//!
//! ```toml
//! [server]
//! bind = "127.0.0.1:8080"
//! cleanup_interval_secs = 60
//!
//! [session]
//! secret = "change-me"
//! default_ttl_secs = 1800
//! save_policy = "deferred"
//! ```

use std::net::SocketAddr;
use std::path::Path;

use rsession::SessionConfig;
use serde::{Deserialize, Serialize};

/// Errors loading the demo configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the config file.
    #[error("failed to read config file '{path}': {source}")]
    ReadFile {
        path: String,
        source: std::io::Error,
    },

    /// Failed to parse TOML.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Root of the demo config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Listener settings.
    pub server: ServerSection,

    /// Session middleware settings.
    pub session: SessionConfig,
}

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// Address to listen on.
    pub bind: SocketAddr,

    /// How often expired sessions are purged from memory.
    pub cleanup_interval_secs: u64,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8080)),
            cleanup_interval_secs: 60,
        }
    }
}

impl DemoConfig {
    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Load from a file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }
}
