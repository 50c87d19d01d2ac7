//! The session entity.
//!
//! A [`Session`] is created fresh or decoded from a stored record, mutated
//! by request handlers, and written back once per request with
//! [`Session::save`]. It belongs to a single request.
//!
//! The stored record is the attribute map plus two envelope keys, `id` and
//! `expires`. Both are reserved and cannot be written as attributes.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::codec;
use crate::config::MAX_TTL_SECS;
use crate::cookie::{CookieIssuer, CookieSink};
use crate::error::{Error, Result};
use crate::id::{generate_id, is_valid_id};
use crate::store::SessionStore;

/// Record key holding the session id.
pub const ID_KEY: &str = "id";

/// Record key holding the per-session TTL override.
pub const EXPIRES_KEY: &str = "expires";

/// The request a session was created or loaded for.
///
/// Only used to annotate log output while saving; never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    method: String,
    path: String,
}

impl RequestContext {
    /// Create a context for a request line.
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
        }
    }

    /// Request method.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Request path.
    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Per-client session state.
#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    attributes: Map<String, Value>,
    expiry: Option<u64>,
    /// Exact backend string this session was decoded from.
    original: Option<String>,
    is_new: bool,
    context: RequestContext,
}

impl Session {
    /// Create a fresh session with a generated id.
    pub fn new(context: RequestContext) -> Self {
        Self {
            id: generate_id(),
            attributes: Map::new(),
            expiry: None,
            original: None,
            is_new: true,
            context,
        }
    }

    /// Create a fresh session from initial attributes.
    ///
    /// An `id` entry is used as the session id instead of generating one;
    /// it must pass [`is_valid_id`](crate::is_valid_id). An `expires` entry
    /// (unsigned integer up to [`MAX_TTL_SECS`]) becomes the TTL override.
    /// Does not contact the backend.
    pub fn create(context: RequestContext, mut initial: Map<String, Value>) -> Result<Self> {
        let id = match initial.remove(ID_KEY) {
            None => generate_id(),
            Some(Value::String(id)) if is_valid_id(&id) => id,
            Some(_) => {
                return Err(Error::ReservedKey(format!(
                    "'{}' must be a non-empty cookie-safe string",
                    ID_KEY
                )));
            }
        };

        let expiry = match initial.remove(EXPIRES_KEY) {
            None | Some(Value::Null) => None,
            Some(value) => Some(ttl_from_value(&value).ok_or_else(|| {
                Error::ReservedKey(format!(
                    "'{}' must be an unsigned integer no greater than {}",
                    EXPIRES_KEY, MAX_TTL_SECS
                ))
            })?),
        };

        Ok(Self {
            id,
            attributes: initial,
            expiry,
            original: None,
            is_new: true,
            context,
        })
    }

    /// Create a fresh session that keeps an id recovered from a cookie.
    pub fn with_id(context: RequestContext, id: impl Into<String>) -> Result<Self> {
        let mut initial = Map::new();
        initial.insert(ID_KEY.to_string(), Value::String(id.into()));
        Self::create(context, initial)
    }

    /// Decode a session from its stored record.
    pub fn deserialize(context: RequestContext, stored: &str) -> Result<Self> {
        let mut record = codec::decode(stored)?;

        let id = match record.remove(ID_KEY) {
            Some(Value::String(id)) if is_valid_id(&id) => id,
            Some(_) => {
                return Err(Error::MalformedSessionData(
                    "session id is not a cookie-safe string".to_string(),
                ));
            }
            None => {
                return Err(Error::MalformedSessionData(
                    "record has no session id".to_string(),
                ));
            }
        };

        let expiry = match record.remove(EXPIRES_KEY) {
            None | Some(Value::Null) => None,
            Some(value) => Some(ttl_from_value(&value).ok_or_else(|| {
                Error::MalformedSessionData("expiry is not a valid TTL".to_string())
            })?),
        };

        Ok(Self {
            id,
            attributes: record,
            expiry,
            original: Some(stored.to_string()),
            is_new: false,
            context,
        })
    }

    /// The session id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether this session has never been persisted.
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    /// The string this session was decoded from, if any.
    pub fn original(&self) -> Option<&str> {
        self.original.as_deref()
    }

    /// The request this session belongs to.
    pub fn context(&self) -> &RequestContext {
        &self.context
    }

    /// All attributes, without envelope keys.
    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }

    /// Get an attribute as a typed value.
    ///
    /// Returns `None` when the key is missing or does not deserialize as `T`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attributes
            .get(key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    /// Get an attribute as raw JSON.
    pub fn get_value(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Set an attribute, returning the previous value.
    pub fn insert<T: Serialize>(
        &mut self,
        key: impl Into<String>,
        value: T,
    ) -> Result<Option<Value>> {
        let key = key.into();
        if key == ID_KEY || key == EXPIRES_KEY {
            return Err(Error::ReservedKey(key));
        }
        let value = serde_json::to_value(value)?;
        Ok(self.attributes.insert(key, value))
    }

    /// Remove an attribute, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.attributes.remove(key)
    }

    /// Remove every attribute. The id and expiry are kept.
    pub fn clear(&mut self) {
        self.attributes.clear();
    }

    /// Per-session TTL override in seconds.
    pub fn expiry(&self) -> Option<u64> {
        self.expiry
    }

    /// Override the TTL for this session, or return to the default.
    ///
    /// Values above [`MAX_TTL_SECS`] are clamped to it.
    pub fn set_expiry(&mut self, ttl_secs: Option<u64>) {
        self.expiry = ttl_secs.map(|ttl| ttl.min(MAX_TTL_SECS));
    }

    /// The TTL to apply when saving.
    pub fn ttl_or(&self, default_ttl_secs: u64) -> u64 {
        self.expiry.unwrap_or(default_ttl_secs)
    }

    /// The full record, envelope keys included.
    pub fn record(&self) -> Map<String, Value> {
        let mut record = self.attributes.clone();
        record.insert(ID_KEY.to_string(), Value::String(self.id.clone()));
        if let Some(expiry) = self.expiry {
            record.insert(EXPIRES_KEY.to_string(), Value::from(expiry));
        }
        record
    }

    /// Encode the current state for storage.
    pub fn encode(&self) -> String {
        codec::encode(&self.record())
    }

    /// Whether saving would write a new value to the backend.
    pub fn is_modified(&self) -> bool {
        self.original.as_deref() != Some(self.encode().as_str())
    }

    /// Write the session to the store and refresh its TTL.
    ///
    /// The value is written only when its encoding differs byte-for-byte
    /// from the loaded one. The TTL is refreshed on every call so that
    /// sessions in use never lapse.
    pub async fn persist(&mut self, store: &SessionStore, ttl_secs: u64) -> Result<()> {
        let encoded = self.encode();

        if self.original.as_deref() != Some(encoded.as_str()) {
            store.set(&self.id, &encoded).await?;
            debug!(
                session_id = %self.id,
                method = %self.context.method,
                path = %self.context.path,
                is_new = self.is_new,
                "Session written"
            );
        } else {
            trace!(session_id = %self.id, "Session unchanged, skipping write");
        }

        store.expire(&self.id, ttl_secs).await?;
        self.is_new = false;
        Ok(())
    }

    /// Attach the signed session cookie to the response.
    pub fn issue_cookie<S>(&self, sink: &mut S, issuer: &CookieIssuer)
    where
        S: CookieSink + ?Sized,
    {
        sink.set_cookie(issuer.issue(&self.id));
    }

    /// Persist the session, then attach its cookie.
    ///
    /// On a backend failure no cookie is set and the error is returned: a
    /// session that was not stored must not be advertised to the client.
    pub async fn save<S>(
        &mut self,
        sink: &mut S,
        store: &SessionStore,
        issuer: &CookieIssuer,
        ttl_secs: u64,
    ) -> Result<()>
    where
        S: CookieSink + ?Sized,
    {
        self.persist(store, ttl_secs).await?;
        self.issue_cookie(sink, issuer);
        Ok(())
    }
}

fn ttl_from_value(value: &Value) -> Option<u64> {
    value.as_u64().filter(|ttl| *ttl <= MAX_TTL_SECS)
}
