//! Outgoing session cookie.

use crate::config::SessionConfig;
use crate::error::Result;
use crate::signature::Signer;

/// The session cookie to attach to a response.
///
/// Always HTTP-only and never carries `Max-Age` or `Expires`: the backend
/// TTL alone decides when a session ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    /// Cookie name.
    pub name: String,
    /// Signed session id.
    pub value: String,
    /// Path attribute.
    pub path: String,
    /// Whether the cookie is hidden from scripts.
    pub http_only: bool,
}

/// Something that can carry a cookie to the client.
pub trait CookieSink {
    /// Set `cookie` on the outgoing response, replacing a previous session
    /// cookie of the same name.
    fn set_cookie(&mut self, cookie: SessionCookie);
}

impl CookieSink for Vec<SessionCookie> {
    fn set_cookie(&mut self, cookie: SessionCookie) {
        self.retain(|existing| existing.name != cookie.name);
        self.push(cookie);
    }
}

/// Builds signed session cookies.
#[derive(Debug, Clone)]
pub struct CookieIssuer {
    name: String,
    path: String,
    signer: Signer,
}

impl CookieIssuer {
    /// Create an issuer for cookie `name` signed by `signer`.
    pub fn new(name: impl Into<String>, signer: Signer) -> Self {
        Self {
            name: name.into(),
            path: crate::config::DEFAULT_COOKIE_PATH.to_string(),
            signer,
        }
    }

    /// Create an issuer from a configuration.
    pub fn from_config(config: &SessionConfig) -> Result<Self> {
        Ok(Self::new(config.cookie_name.clone(), Signer::from_config(config)?)
            .with_path(config.cookie_path.clone()))
    }

    /// Set the cookie path.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// The cookie name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The signer used for cookie values.
    pub fn signer(&self) -> &Signer {
        &self.signer
    }

    /// Build the cookie carrying `session_id`.
    pub fn issue(&self, session_id: &str) -> SessionCookie {
        SessionCookie {
            name: self.name.clone(),
            value: self.signer.sign(session_id),
            path: self.path.clone(),
            http_only: true,
        }
    }

    /// Recover a session id from a cookie value.
    pub fn verify(&self, cookie_value: &str) -> Option<String> {
        self.signer.verify(cookie_value)
    }
}
