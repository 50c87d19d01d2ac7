//! Store adapter over a key-value cache backend.
//!
//! [`CacheBackend`] is the contract a cache has to fulfil (any key-value
//! store with per-key TTL does). [`SessionStore`] is the thin adapter the
//! session layer talks to: it forwards calls, maps timeouts to
//! [`Error::BackendUnavailable`] and logs. It never retries; retry policy
//! belongs to the backend client or an outer layer.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, trace};

use crate::error::{Error, Result};

/// A key-value cache with per-key expiry.
///
/// Implementations report transport failures as
/// [`Error::BackendUnavailable`].
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Fetch the value stored under `key`, `None` on a miss.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Reset the remaining lifetime of `key` to `ttl_secs` without touching
    /// its value. A missing key is not an error.
    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<()>;
}

/// Adapter the session layer uses to reach the cache backend.
#[derive(Clone)]
pub struct SessionStore {
    backend: Arc<dyn CacheBackend>,
    timeout: Option<Duration>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl SessionStore {
    /// Wrap a backend.
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self {
            backend,
            timeout: None,
        }
    }

    /// Bound every backend call by `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Fetch the stored record for a session id.
    pub async fn get(&self, id: &str) -> Result<Option<String>> {
        let value = self.call("get", id, self.backend.get(id)).await?;
        trace!(session_id = %id, hit = value.is_some(), "Store get");
        Ok(value)
    }

    /// Store the record for a session id.
    pub async fn set(&self, id: &str, value: &str) -> Result<()> {
        self.call("set", id, self.backend.set(id, value)).await?;
        trace!(session_id = %id, bytes = value.len(), "Store set");
        Ok(())
    }

    /// Refresh the remaining lifetime of a session id.
    pub async fn expire(&self, id: &str, ttl_secs: u64) -> Result<()> {
        self.call("expire", id, self.backend.expire(id, ttl_secs))
            .await?;
        trace!(session_id = %id, ttl_secs, "Store expire");
        Ok(())
    }

    async fn call<T>(
        &self,
        op: &'static str,
        id: &str,
        fut: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        let result = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, fut).await {
                Ok(result) => result,
                Err(_) => Err(Error::BackendUnavailable(format!(
                    "{} timed out after {:?}",
                    op, limit
                ))),
            },
            None => fut.await,
        };

        if let Err(ref e) = result {
            error!(session_id = %id, op, error = %e, "Cache backend call failed");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;

    struct StalledBackend;

    #[async_trait]
    impl CacheBackend for StalledBackend {
        async fn get(&self, _key: &str) -> Result<Option<String>> {
            std::future::pending().await
        }

        async fn set(&self, _key: &str, _value: &str) -> Result<()> {
            std::future::pending().await
        }

        async fn expire(&self, _key: &str, _ttl_secs: u64) -> Result<()> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_pass_through() {
        let store = SessionStore::new(Arc::new(MemoryBackend::new()));

        assert_eq!(store.get("a").await.unwrap(), None);
        store.set("a", "value").await.unwrap();
        store.expire("a", 60).await.unwrap();
        assert_eq!(store.get("a").await.unwrap().as_deref(), Some("value"));
    }

    #[tokio::test]
    async fn test_timeout_maps_to_backend_unavailable() {
        let store = SessionStore::new(Arc::new(StalledBackend))
            .with_timeout(Some(Duration::from_millis(20)));

        let err = store.get("a").await.unwrap_err();
        assert!(err.is_backend_unavailable());
        assert!(err.to_string().contains("get timed out"));

        assert!(store.set("a", "v").await.unwrap_err().is_backend_unavailable());
        assert!(store.expire("a", 1).await.unwrap_err().is_backend_unavailable());
    }
}
