//! Signed-cookie sessions backed by a TTL-bounded key-value cache.
//!
//! This crate holds everything about a session that does not depend on an
//! HTTP framework:
//! - [`codec`]: the stored record format (base64 of a JSON object)
//! - [`Signer`]: HMAC-SHA256 cookie signatures with secret rotation
//! - [`Session`]: attributes, dirty-checking and the save protocol
//! - [`SessionStore`] / [`CacheBackend`]: the contract with the cache
//! - [`MemoryBackend`]: an in-process backend with per-key expiry
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use rsession::{CookieIssuer, MemoryBackend, RequestContext, Session, SessionConfig, SessionStore};
//!
//! let config = SessionConfig::new("s1");
//! let store = SessionStore::new(Arc::new(MemoryBackend::new()));
//! let issuer = CookieIssuer::from_config(&config)?;
//!
//! let mut session = Session::new(RequestContext::new("GET", "/"));
//! session.insert("views", 1)?;
//!
//! let mut cookies = Vec::new();
//! session.save(&mut cookies, &store, &issuer, config.default_ttl_secs).await?;
//! ```

pub mod backend;
pub mod codec;
mod config;
mod cookie;
mod error;
mod id;
mod session;
mod signature;
mod store;

pub use backend::MemoryBackend;
#[cfg(any(test, feature = "testing"))]
pub use backend::{BackendCall, MockBackend};
pub use config::{
    DEFAULT_COOKIE_NAME, DEFAULT_COOKIE_PATH, DEFAULT_TTL_SECS, MAX_TTL_SECS, SavePolicy,
    SessionConfig,
};
pub use cookie::{CookieIssuer, CookieSink, SessionCookie};
pub use error::{Error, Result};
pub use id::{SESSION_ID_PREFIX, generate_id, is_valid_id};
pub use session::{EXPIRES_KEY, ID_KEY, RequestContext, Session};
pub use signature::{Signer, sign, verify};
pub use store::{CacheBackend, SessionStore};
