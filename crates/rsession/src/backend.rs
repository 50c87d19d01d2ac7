//! Built-in cache backends.
//!
//! [`MemoryBackend`] keeps records in process memory with per-key expiry.
//! It suits tests, demos and single-instance deployments; sessions do not
//! survive a restart and are not shared between processes.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::Result;
use crate::store::CacheBackend;

/// Stored value with its optional deadline.
#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| now >= deadline)
    }
}

/// In-process cache backend with per-key TTL.
///
/// Follows cache-server semantics: `set` stores the value without a
/// deadline, `expire` arms one, expired keys are dropped lazily on access
/// or eagerly by [`cleanup_expired`](Self::cleanup_expired).
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
}

impl MemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a deadline `ttl` from now on an existing key.
    ///
    /// A `ttl` too large to represent as an instant leaves the key without
    /// a deadline. Returns `false` if the key does not exist.
    pub async fn expire_after(&self, key: &str, ttl: Duration) -> bool {
        let mut entries = self.entries.write().await;
        let now = Instant::now();

        match entries.get_mut(key) {
            Some(entry) if !entry.is_expired(now) => {
                entry.expires_at = now.checked_add(ttl);
                true
            }
            Some(_) => {
                entries.remove(key);
                false
            }
            None => false,
        }
    }

    /// Remaining lifetime of a key. `None` if the key is missing or has no
    /// deadline.
    pub async fn ttl(&self, key: &str) -> Option<Duration> {
        let entries = self.entries.read().await;
        let now = Instant::now();
        entries
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .and_then(|entry| entry.expires_at)
            .map(|deadline| deadline.saturating_duration_since(now))
    }

    /// Number of stored keys, including expired keys not yet dropped.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Check if no keys are stored.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Drop every expired key and return how many were removed.
    pub async fn cleanup_expired(&self) -> usize {
        let mut entries = self.entries.write().await;
        let now = Instant::now();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before - entries.len();

        if removed > 0 {
            debug!(count = removed, "Cleaned up expired sessions");
        }
        removed
    }

    /// Spawn a task that runs [`cleanup_expired`](Self::cleanup_expired)
    /// every `interval`.
    pub fn spawn_cleanup_task(&self, interval: Duration) -> tokio::task::JoinHandle<()> {
        let backend = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                backend.cleanup_expired().await;
            }
        })
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return Ok(None),
                Some(entry) if !entry.is_expired(Instant::now()) => {
                    return Ok(Some(entry.value.clone()));
                }
                Some(_) => {}
            }
        }

        debug!(key = %key, "Session record expired, removing");
        let mut entries = self.entries.write().await;
        if entries
            .get(key)
            .is_some_and(|entry| entry.is_expired(Instant::now()))
        {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: None,
            },
        );
        Ok(())
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<()> {
        self.expire_after(key, Duration::from_secs(ttl_secs)).await;
        Ok(())
    }
}

#[cfg(any(test, feature = "testing"))]
pub use mock::{BackendCall, MockBackend};

#[cfg(any(test, feature = "testing"))]
mod mock {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use crate::error::{Error, Result};
    use crate::store::CacheBackend;

    /// A call observed by [`MockBackend`].
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum BackendCall {
        Get(String),
        Set(String, String),
        Expire(String, u64),
    }

    /// Cache backend for tests.
    ///
    /// Records every call in order and stores values without expiry. Calls
    /// fail with [`Error::BackendUnavailable`] while failing mode is on;
    /// failed calls are still recorded.
    #[derive(Debug, Default)]
    pub struct MockBackend {
        values: Mutex<HashMap<String, String>>,
        calls: Mutex<Vec<BackendCall>>,
        failing: Mutex<bool>,
    }

    impl MockBackend {
        /// Create an empty mock backend.
        pub fn new() -> Self {
            Self::default()
        }

        /// Seed a stored value.
        pub fn with_value(self, key: impl Into<String>, value: impl Into<String>) -> Self {
            self.values.lock().insert(key.into(), value.into());
            self
        }

        /// Turn failing mode on or off.
        pub fn set_failing(&self, failing: bool) {
            *self.failing.lock() = failing;
        }

        /// All calls made so far.
        pub fn calls(&self) -> Vec<BackendCall> {
            self.calls.lock().clone()
        }

        /// Only the `set` calls, as `(key, value)` pairs.
        pub fn sets(&self) -> Vec<(String, String)> {
            self.calls()
                .into_iter()
                .filter_map(|call| match call {
                    BackendCall::Set(key, value) => Some((key, value)),
                    _ => None,
                })
                .collect()
        }

        /// Only the `expire` calls, as `(key, ttl_secs)` pairs.
        pub fn expires(&self) -> Vec<(String, u64)> {
            self.calls()
                .into_iter()
                .filter_map(|call| match call {
                    BackendCall::Expire(key, ttl) => Some((key, ttl)),
                    _ => None,
                })
                .collect()
        }

        /// The currently stored value for `key`.
        pub fn value(&self, key: &str) -> Option<String> {
            self.values.lock().get(key).cloned()
        }

        fn record(&self, call: BackendCall) -> Result<()> {
            self.calls.lock().push(call);
            if *self.failing.lock() {
                return Err(Error::BackendUnavailable(
                    "MockBackend: failing mode".to_string(),
                ));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl CacheBackend for MockBackend {
        async fn get(&self, key: &str) -> Result<Option<String>> {
            self.record(BackendCall::Get(key.to_string()))?;
            Ok(self.value(key))
        }

        async fn set(&self, key: &str, value: &str) -> Result<()> {
            self.record(BackendCall::Set(key.to_string(), value.to_string()))?;
            self.values
                .lock()
                .insert(key.to_string(), value.to_string());
            Ok(())
        }

        async fn expire(&self, key: &str, ttl_secs: u64) -> Result<()> {
            self.record(BackendCall::Expire(key.to_string(), ttl_secs))
        }
    }
}
