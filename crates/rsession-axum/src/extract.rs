//! Handler access to the request's session.

use std::sync::Arc;

use axum::{extract::FromRequestParts, http::request::Parts};
use parking_lot::Mutex;
use rsession::Session;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::SessionRejection;

/// The session attached to the current request.
///
/// The middleware and the handler of one request share this handle; it is
/// never reachable from another request. Use it as an extractor:
///
/// ```ignore
/// async fn visits(session: SessionHandle) -> Result<String, SessionRejection> {
///     let views: u64 = session.get("views").unwrap_or(0) + 1;
///     session.insert("views", views)?;
///     Ok(format!("{} views", views))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct SessionHandle {
    inner: Arc<Mutex<Session>>,
}

impl SessionHandle {
    /// Wrap a session.
    pub fn new(session: Session) -> Self {
        Self {
            inner: Arc::new(Mutex::new(session)),
        }
    }

    /// The session id.
    pub fn id(&self) -> String {
        self.inner.lock().id().to_string()
    }

    /// Whether the session was created during this request.
    pub fn is_new(&self) -> bool {
        self.inner.lock().is_new()
    }

    /// Get an attribute as a typed value.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.inner.lock().get(key)
    }

    /// Get an attribute as raw JSON.
    pub fn get_value(&self, key: &str) -> Option<Value> {
        self.inner.lock().get_value(key).cloned()
    }

    /// Set an attribute, returning the previous value.
    pub fn insert<T: Serialize>(
        &self,
        key: impl Into<String>,
        value: T,
    ) -> Result<Option<Value>, SessionRejection> {
        Ok(self.inner.lock().insert(key, value)?)
    }

    /// Remove an attribute, returning its value.
    pub fn remove(&self, key: &str) -> Option<Value> {
        self.inner.lock().remove(key)
    }

    /// Remove every attribute.
    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    /// Override the backend TTL for this session.
    pub fn set_expiry(&self, ttl_secs: Option<u64>) {
        self.inner.lock().set_expiry(ttl_secs);
    }

    /// Run `f` with shared access to the session.
    pub fn with<R>(&self, f: impl FnOnce(&Session) -> R) -> R {
        f(&self.inner.lock())
    }

    /// Run `f` with exclusive access to the session.
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut Session) -> R) -> R {
        f(&mut self.inner.lock())
    }

    /// Copy of the current session state.
    ///
    /// Saving works on a snapshot so that the lock is never held across a
    /// backend call.
    pub fn snapshot(&self) -> Session {
        self.inner.lock().clone()
    }
}

impl<S> FromRequestParts<S> for SessionHandle
where
    S: Send + Sync,
{
    type Rejection = SessionRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SessionHandle>()
            .cloned()
            .ok_or(SessionRejection::MissingSession)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsession::RequestContext;

    #[test]
    fn test_clones_share_state() {
        let handle = SessionHandle::new(Session::new(RequestContext::default()));
        let other = handle.clone();

        handle.insert("n", 1).unwrap();
        assert_eq!(other.get::<i32>("n"), Some(1));
        assert_eq!(handle.id(), other.id());
    }

    #[test]
    fn test_reserved_key_rejected() {
        let handle = SessionHandle::new(Session::new(RequestContext::default()));
        assert!(matches!(
            handle.insert("id", "x"),
            Err(SessionRejection::Internal(_))
        ));
    }

    #[test]
    fn test_snapshot_is_detached() {
        let handle = SessionHandle::new(Session::new(RequestContext::default()));
        handle.insert("n", 1).unwrap();

        let snapshot = handle.snapshot();
        handle.insert("n", 2).unwrap();

        assert_eq!(snapshot.get::<i32>("n"), Some(1));
        assert_eq!(handle.get::<i32>("n"), Some(2));
    }

    #[test]
    fn test_with_mut() {
        let handle = SessionHandle::new(Session::new(RequestContext::default()));
        handle.with_mut(|session| session.set_expiry(Some(10)));
        assert_eq!(handle.with(|session| session.expiry()), Some(10));
    }
}
