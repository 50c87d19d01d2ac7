//! Session manager: the state shared by every request.

use std::borrow::Cow;
use std::sync::Arc;

use axum::response::Response;
use rsession::{
    CacheBackend, CookieIssuer, RequestContext, Result, SavePolicy, Session, SessionConfig,
    SessionStore, Signer, is_valid_id,
};
use tracing::{debug, error, trace, warn};

use crate::cookies::{HeaderCookieSink, RequestCookies};
use crate::extract::SessionHandle;

/// Loads sessions at the start of a request and saves them at the end.
///
/// Cheap to clone; all clones share the same backend and secrets. Several
/// independently configured managers can serve different routers of the
/// same application.
#[derive(Clone, Debug)]
pub struct SessionManager {
    inner: Arc<ManagerInner>,
}

#[derive(Debug)]
struct ManagerInner {
    config: SessionConfig,
    store: SessionStore,
    issuer: CookieIssuer,
}

impl SessionManager {
    /// Start building a manager for `config`.
    pub fn builder(config: SessionConfig) -> SessionManagerBuilder {
        SessionManagerBuilder {
            config,
            backend: None,
        }
    }

    /// The configuration this manager was built with.
    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// The store adapter.
    pub fn store(&self) -> &SessionStore {
        &self.inner.store
    }

    /// The cookie issuer.
    pub fn issuer(&self) -> &CookieIssuer {
        &self.inner.issuer
    }

    /// The issuer for a request: the shared one, or one signing with the
    /// secret the cookie parser supplied. Configured secrets keep verifying
    /// in the latter case.
    pub fn issuer_for(&self, cookies: &RequestCookies) -> Result<Cow<'_, CookieIssuer>> {
        let Some(secret) = cookies.secret() else {
            return Ok(Cow::Borrowed(&self.inner.issuer));
        };

        let config = &self.inner.config;
        let mut signer = Signer::new(secret)?.with_fallback(config.secret.clone())?;
        for fallback in &config.fallback_secrets {
            signer = signer.with_fallback(fallback.clone())?;
        }

        Ok(Cow::Owned(
            CookieIssuer::new(config.cookie_name.clone(), signer)
                .with_path(config.cookie_path.clone()),
        ))
    }

    /// Resolve the session for a request.
    ///
    /// - no cookie, or a cookie with a bad signature: fresh session
    /// - verified id, stored record decodes: the stored session
    /// - verified id, record missing or undecodable: fresh session that
    ///   keeps the verified id
    ///
    /// Only backend failures and an empty request secret are errors.
    pub async fn load(&self, cookies: &RequestCookies, context: RequestContext) -> Result<Session> {
        let name = self.inner.config.cookie_name.as_str();
        let issuer = self.issuer_for(cookies)?;

        let recovered = match cookies.get(name) {
            None => {
                trace!(cookie = %name, "No session cookie");
                None
            }
            Some(value) => match issuer.verify(value) {
                Some(id) if is_valid_id(&id) => Some(id),
                _ => {
                    debug!(cookie = %name, "Session cookie failed verification, starting fresh");
                    None
                }
            },
        };

        let Some(id) = recovered else {
            let session = Session::new(context);
            debug!(session_id = %session.id(), "Created session");
            return Ok(session);
        };

        match self.inner.store.get(&id).await? {
            Some(stored) => match Session::deserialize(context.clone(), &stored) {
                Ok(session) if session.id() == id => {
                    debug!(session_id = %id, "Loaded session");
                    return Ok(session);
                }
                Ok(session) => {
                    warn!(
                        session_id = %id,
                        record_id = %session.id(),
                        "Stored record belongs to another session, discarding"
                    );
                }
                Err(e) => {
                    warn!(session_id = %id, error = %e, "Discarding malformed session record");
                }
            },
            None => {
                debug!(session_id = %id, "Session not in store, recreating with same id");
            }
        }

        Session::with_id(context, id)
    }

    /// Write the session back and attach its cookie to `response`.
    ///
    /// Under [`SavePolicy::Deferred`] this waits for the backend and returns
    /// its error; the response must then not be sent as-is. Under
    /// [`SavePolicy::Eager`] the cookie is attached at once and the backend
    /// write runs in the background; failures are only logged.
    pub async fn complete(
        &self,
        handle: &SessionHandle,
        cookies: &RequestCookies,
        response: &mut Response,
    ) -> Result<()> {
        let issuer = self.issuer_for(cookies)?;
        let mut session = handle.snapshot();
        let ttl_secs = session.ttl_or(self.inner.config.default_ttl_secs);
        let mut sink = HeaderCookieSink::new(response.headers_mut());

        match self.inner.config.save_policy {
            SavePolicy::Deferred => {
                session
                    .save(&mut sink, &self.inner.store, &issuer, ttl_secs)
                    .await
            }
            SavePolicy::Eager => {
                session.issue_cookie(&mut sink, &issuer);
                let store = self.inner.store.clone();
                tokio::spawn(async move {
                    if let Err(e) = session.persist(&store, ttl_secs).await {
                        error!(
                            session_id = %session.id(),
                            error = %e,
                            "Background session save failed"
                        );
                    }
                });
                Ok(())
            }
        }
    }
}

/// Builder for [`SessionManager`].
pub struct SessionManagerBuilder {
    config: SessionConfig,
    backend: Option<Arc<dyn CacheBackend>>,
}

impl SessionManagerBuilder {
    /// Use `backend` to store sessions.
    pub fn backend(self, backend: impl CacheBackend + 'static) -> Self {
        self.shared_backend(Arc::new(backend))
    }

    /// Use an already shared backend, e.g. a connection pool handle.
    pub fn shared_backend(mut self, backend: Arc<dyn CacheBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Validate the configuration and build the manager.
    ///
    /// Fails with a configuration error when no backend was supplied or
    /// the configuration is invalid.
    pub fn build(self) -> Result<SessionManager> {
        let backend = self.backend.ok_or_else(|| {
            rsession::Error::Configuration("a cache backend is required".to_string())
        })?;
        self.config.validate()?;

        let issuer = CookieIssuer::from_config(&self.config)?;
        let store = SessionStore::new(backend).with_timeout(self.config.backend_timeout());

        Ok(SessionManager {
            inner: Arc::new(ManagerInner {
                config: self.config,
                store,
                issuer,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsession::{MemoryBackend, MockBackend, codec, sign};
    use serde_json::json;

    fn manager(backend: Arc<MockBackend>) -> SessionManager {
        SessionManager::builder(SessionConfig::new("s1"))
            .shared_backend(backend)
            .build()
            .unwrap()
    }

    fn ctx() -> RequestContext {
        RequestContext::new("GET", "/")
    }

    fn record(value: serde_json::Value) -> String {
        match value {
            serde_json::Value::Object(map) => codec::encode(&map),
            _ => panic!("fixture must be an object"),
        }
    }

    #[test]
    fn test_build_requires_backend() {
        let result = SessionManager::builder(SessionConfig::new("s1")).build();
        assert!(matches!(result, Err(rsession::Error::Configuration(_))));
    }

    #[test]
    fn test_build_requires_secret() {
        let result = SessionManager::builder(SessionConfig::default())
            .backend(MemoryBackend::new())
            .build();
        assert!(matches!(result, Err(rsession::Error::Configuration(_))));
    }

    #[tokio::test]
    async fn test_load_without_cookie_skips_backend() {
        let backend = Arc::new(MockBackend::new());
        let session = manager(backend.clone())
            .load(&RequestCookies::new(), ctx())
            .await
            .unwrap();

        assert!(session.is_new());
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_load_with_bad_signature_skips_backend() {
        let backend = Arc::new(MockBackend::new().with_value("abc", record(json!({"id": "abc"}))));
        let cookies = RequestCookies::new().with("rsessionid", sign("abc", "other-secret"));

        let session = manager(backend.clone()).load(&cookies, ctx()).await.unwrap();

        assert_ne!(session.id(), "abc");
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_load_hit() {
        let backend = Arc::new(
            MockBackend::new().with_value("abc", record(json!({"id": "abc", "cart": [1, 2]}))),
        );
        let cookies = RequestCookies::new().with("rsessionid", sign("abc", "s1"));

        let session = manager(backend).load(&cookies, ctx()).await.unwrap();

        assert_eq!(session.id(), "abc");
        assert!(!session.is_new());
        assert_eq!(session.get::<Vec<i32>>("cart"), Some(vec![1, 2]));
    }

    #[tokio::test]
    async fn test_load_miss_keeps_id() {
        let backend = Arc::new(MockBackend::new());
        let cookies = RequestCookies::new().with("rsessionid", sign("abc", "s1"));

        let session = manager(backend).load(&cookies, ctx()).await.unwrap();

        assert_eq!(session.id(), "abc");
        assert!(session.is_new());
    }

    #[tokio::test]
    async fn test_load_malformed_keeps_id() {
        let backend = Arc::new(MockBackend::new().with_value("abc", "definitely not base64!"));
        let cookies = RequestCookies::new().with("rsessionid", sign("abc", "s1"));

        let session = manager(backend).load(&cookies, ctx()).await.unwrap();

        assert_eq!(session.id(), "abc");
        assert!(session.attributes().is_empty());
        assert!(session.original().is_none());
    }

    #[tokio::test]
    async fn test_load_foreign_record_keeps_cookie_id() {
        let backend = Arc::new(
            MockBackend::new().with_value("abc", record(json!({"id": "xyz", "admin": true}))),
        );
        let cookies = RequestCookies::new().with("rsessionid", sign("abc", "s1"));

        let session = manager(backend).load(&cookies, ctx()).await.unwrap();

        assert_eq!(session.id(), "abc");
        assert!(session.get_value("admin").is_none());
    }

    #[tokio::test]
    async fn test_load_backend_failure() {
        let backend = Arc::new(MockBackend::new());
        backend.set_failing(true);
        let cookies = RequestCookies::new().with("rsessionid", sign("abc", "s1"));

        let err = manager(backend).load(&cookies, ctx()).await.unwrap_err();
        assert!(err.is_backend_unavailable());
    }

    #[tokio::test]
    async fn test_load_ignores_unsafe_signed_id() {
        let backend = Arc::new(MockBackend::new());
        let cookies = RequestCookies::new().with("rsessionid", sign("a b", "s1"));

        let session = manager(backend.clone()).load(&cookies, ctx()).await.unwrap();

        assert_ne!(session.id(), "a b");
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_request_secret_signs_and_verifies() {
        let backend = Arc::new(MockBackend::new().with_value("abc", record(json!({"id": "abc"}))));
        let manager = manager(backend);

        let cookies = RequestCookies::new()
            .with("rsessionid", sign("abc", "per-request"))
            .with_secret("per-request");
        let session = manager.load(&cookies, ctx()).await.unwrap();
        assert_eq!(session.id(), "abc");
        assert!(!session.is_new());

        let issuer = manager.issuer_for(&cookies).unwrap();
        assert_eq!(issuer.issue("abc").value, sign("abc", "per-request"));
        // Cookies signed with the configured secret still verify.
        assert_eq!(issuer.verify(&sign("abc", "s1")).as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn test_empty_request_secret_is_a_configuration_error() {
        let backend = Arc::new(MockBackend::new());
        let cookies = RequestCookies::new().with_secret("");

        let err = manager(backend).load(&cookies, ctx()).await.unwrap_err();
        assert!(matches!(err, rsession::Error::Configuration(_)));
    }

    #[tokio::test]
    async fn test_load_accepts_rotated_secret() {
        let backend = Arc::new(MockBackend::new().with_value("abc", record(json!({"id": "abc"}))));
        let manager = SessionManager::builder(SessionConfig::new("s2").with_fallback_secret("s1"))
            .shared_backend(backend)
            .build()
            .unwrap();
        let cookies = RequestCookies::new().with("rsessionid", sign("abc", "s1"));

        let session = manager.load(&cookies, ctx()).await.unwrap();
        assert_eq!(session.id(), "abc");
        assert!(!session.is_new());
    }
}
