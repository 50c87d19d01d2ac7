//! Cookie plumbing around the session middleware.
//!
//! The session middleware consumes an already-parsed cookie map,
//! [`RequestCookies`], from the request extensions. Install
//! [`cookie_parser_middleware`] (or an equivalent layer of your own) outside
//! of it. Outgoing cookies are written as `Set-Cookie` headers through
//! [`HeaderCookieSink`].
//!
//! A parser may also hand over a per-request signing secret with
//! [`RequestCookies::with_secret`]; [`signed_cookie_parser_middleware`]
//! does that for a fixed [`CookieSecret`].

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{
        HeaderMap, HeaderValue,
        header::{COOKIE, SET_COOKIE},
    },
    middleware::Next,
    response::Response,
};
use cookie::Cookie;
use rsession::{CookieSink, SessionCookie};
use tracing::{error, trace};

/// Cookies sent with a request, by name, plus the secret the parser was
/// configured with, if any.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct RequestCookies {
    cookies: HashMap<String, String>,
    secret: Option<String>,
}

impl std::fmt::Debug for RequestCookies {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestCookies")
            .field("cookies", &self.cookies)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl RequestCookies {
    /// Create an empty cookie map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse every `Cookie` header of a request.
    ///
    /// Malformed pairs are skipped. When a name repeats, the first value
    /// wins.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut cookies = HashMap::new();

        for header in headers.get_all(COOKIE) {
            let Ok(header) = header.to_str() else {
                trace!("Skipping non-UTF-8 cookie header");
                continue;
            };
            for cookie in Cookie::split_parse(header).flatten() {
                cookies
                    .entry(cookie.name().to_string())
                    .or_insert_with(|| cookie.value().to_string());
            }
        }

        Self {
            cookies,
            secret: None,
        }
    }

    /// Add a cookie.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    /// Sign and verify this request's session cookie with `secret`.
    ///
    /// The configured secrets are still accepted when verifying, so
    /// cookies issued before the parser carried a secret stay valid.
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    /// Value of the cookie called `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    /// Secret supplied by the cookie parser.
    pub fn secret(&self) -> Option<&str> {
        self.secret.as_deref()
    }

    /// Number of cookies.
    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    /// Check if the request carried no cookies.
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }
}

/// Signing secret handed to [`signed_cookie_parser_middleware`].
#[derive(Clone)]
pub struct CookieSecret(Arc<str>);

impl CookieSecret {
    /// Wrap a secret.
    pub fn new(secret: impl Into<String>) -> Self {
        Self(Arc::from(secret.into()))
    }
}

impl std::fmt::Debug for CookieSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CookieSecret(<redacted>)")
    }
}

/// Parse the request's `Cookie` headers into [`RequestCookies`].
pub async fn cookie_parser_middleware(mut request: Request, next: Next) -> Response {
    let cookies = RequestCookies::from_headers(request.headers());
    request.extensions_mut().insert(cookies);
    next.run(request).await
}

/// Like [`cookie_parser_middleware`], and also attach `secret` as the
/// request's signing secret.
pub async fn signed_cookie_parser_middleware(
    State(secret): State<CookieSecret>,
    mut request: Request,
    next: Next,
) -> Response {
    let cookies = RequestCookies::from_headers(request.headers()).with_secret(&*secret.0);
    request.extensions_mut().insert(cookies);
    next.run(request).await
}

/// Writes session cookies into response headers.
pub struct HeaderCookieSink<'a> {
    headers: &'a mut HeaderMap,
}

impl<'a> HeaderCookieSink<'a> {
    /// Wrap the headers of an outgoing response.
    pub fn new(headers: &'a mut HeaderMap) -> Self {
        Self { headers }
    }
}

/// Render a session cookie as a `Set-Cookie` value.
pub fn render_cookie(cookie: &SessionCookie) -> String {
    Cookie::build((cookie.name.clone(), cookie.value.clone()))
        .path(cookie.path.clone())
        .http_only(cookie.http_only)
        .build()
        .to_string()
}

impl CookieSink for HeaderCookieSink<'_> {
    fn set_cookie(&mut self, cookie: SessionCookie) {
        let rendered = render_cookie(&cookie);
        let value = match HeaderValue::from_str(&rendered) {
            Ok(value) => value,
            Err(e) => {
                error!(cookie = %cookie.name, error = %e, "Session cookie is not a valid header value");
                return;
            }
        };

        // A handler may have set the session cookie itself; ours wins.
        let prefix = format!("{}=", cookie.name);
        let kept: Vec<HeaderValue> = self
            .headers
            .get_all(SET_COOKIE)
            .iter()
            .filter(|existing| !existing.as_bytes().starts_with(prefix.as_bytes()))
            .cloned()
            .collect();

        self.headers.remove(SET_COOKIE);
        for existing in kept {
            self.headers.append(SET_COOKIE, existing);
        }
        self.headers.append(SET_COOKIE, value);
    }
}
