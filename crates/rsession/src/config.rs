//! Configuration for the session middleware.
//!
//! ```toml
//! default_ttl_secs = 1800
//! secret = "change-me"
//! fallback_secrets = ["previous-secret"]
//! cookie_name = "rsessionid"
//! save_policy = "deferred"
//! backend_timeout_ms = 500
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default session lifetime in the backend (30 minutes).
pub const DEFAULT_TTL_SECS: u64 = 30 * 60;

/// Longest TTL accepted anywhere (ten years).
pub const MAX_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Default name of the session cookie.
pub const DEFAULT_COOKIE_NAME: &str = "rsessionid";

/// Default path attribute of the session cookie.
pub const DEFAULT_COOKIE_PATH: &str = "/";

/// When the session is written back relative to the response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SavePolicy {
    /// Persist before the response leaves the middleware. A failed persist
    /// turns the response into a server error.
    #[default]
    Deferred,

    /// Attach the cookie immediately and persist in the background. The
    /// client may see the cookie before the backend write lands.
    Eager,
}

/// Session middleware configuration.
///
/// The cache backend handle is not part of this struct; it is supplied to
/// the manager builder so the configuration stays serializable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// TTL applied on every save unless the session overrides it.
    pub default_ttl_secs: u64,

    /// Secret used to sign new cookies.
    pub secret: String,

    /// Previous secrets still accepted when verifying cookies.
    pub fallback_secrets: Vec<String>,

    /// Cookie carrying the signed session id.
    pub cookie_name: String,

    /// Path attribute of the session cookie.
    pub cookie_path: String,

    /// When to write the session back.
    pub save_policy: SavePolicy,

    /// Upper bound for a single backend call. `None` waits indefinitely.
    pub backend_timeout_ms: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: DEFAULT_TTL_SECS,
            secret: String::new(),
            fallback_secrets: Vec::new(),
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            cookie_path: DEFAULT_COOKIE_PATH.to_string(),
            save_policy: SavePolicy::default(),
            backend_timeout_ms: None,
        }
    }
}

impl SessionConfig {
    /// Create a configuration signing with `secret` and default settings.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            ..Default::default()
        }
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Set the default TTL in seconds.
    pub fn with_default_ttl(mut self, secs: u64) -> Self {
        self.default_ttl_secs = secs;
        self
    }

    /// Accept cookies signed with an older secret.
    pub fn with_fallback_secret(mut self, secret: impl Into<String>) -> Self {
        self.fallback_secrets.push(secret.into());
        self
    }

    /// Set the cookie name.
    pub fn with_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }

    /// Set the cookie path.
    pub fn with_cookie_path(mut self, path: impl Into<String>) -> Self {
        self.cookie_path = path.into();
        self
    }

    /// Set the save policy.
    pub fn with_save_policy(mut self, policy: SavePolicy) -> Self {
        self.save_policy = policy;
        self
    }

    /// Bound every backend call by `timeout`.
    pub fn with_backend_timeout(mut self, timeout: Duration) -> Self {
        self.backend_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// The backend timeout as a [`Duration`].
    pub fn backend_timeout(&self) -> Option<Duration> {
        self.backend_timeout_ms.map(Duration::from_millis)
    }

    /// Check the settings that cannot be defaulted.
    pub fn validate(&self) -> Result<()> {
        if self.secret.is_empty() {
            return Err(Error::Configuration("secret must not be empty".to_string()));
        }
        if self.fallback_secrets.iter().any(String::is_empty) {
            return Err(Error::Configuration(
                "fallback secrets must not be empty".to_string(),
            ));
        }
        if !is_cookie_token(&self.cookie_name) {
            return Err(Error::Configuration(format!(
                "cookie_name '{}' is not a valid cookie name",
                self.cookie_name
            )));
        }
        if !self
            .cookie_path
            .bytes()
            .all(|b| (b' '..=b'~').contains(&b) && b != b';')
        {
            return Err(Error::Configuration(format!(
                "cookie_path '{}' is not a valid cookie path",
                self.cookie_path
            )));
        }
        if self.default_ttl_secs == 0 {
            return Err(Error::Configuration(
                "default_ttl_secs must be greater than zero".to_string(),
            ));
        }
        if self.default_ttl_secs > MAX_TTL_SECS {
            return Err(Error::Configuration(format!(
                "default_ttl_secs must not exceed {}",
                MAX_TTL_SECS
            )));
        }
        Ok(())
    }
}

/// RFC 6265 cookie-name token: visible ASCII without separators.
fn is_cookie_token(name: &str) -> bool {
    !name.is_empty()
        && name.bytes().all(|b| {
            b.is_ascii_graphic() && !b"()<>@,;:\\\"/[]?={}".contains(&b)
        })
}
