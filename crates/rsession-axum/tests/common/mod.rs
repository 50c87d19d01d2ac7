//! Common test utilities for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Body,
    http::{Request, Response, header},
    middleware,
    routing::get,
};
use rsession::{CacheBackend, SessionConfig};
use rsession_axum::{
    SessionHandle, SessionManager, SessionRejection, cookie_parser_middleware, session_middleware,
};
use serde_json::{Map, Value};

pub const SECRET: &str = "s1";

/// Build a manager over `backend` with the default configuration.
pub fn manager(backend: Arc<dyn CacheBackend>) -> SessionManager {
    manager_with(SessionConfig::new(SECRET), backend)
}

/// Build a manager over `backend` with a custom configuration.
pub fn manager_with(config: SessionConfig, backend: Arc<dyn CacheBackend>) -> SessionManager {
    SessionManager::builder(config)
        .shared_backend(backend)
        .build()
        .expect("test manager builds")
}

/// Routes used by the lifecycle tests.
pub fn routes() -> Router<()> {
    Router::new()
        .route("/", get(|| async { "ok" }))
        .route("/whoami", get(whoami))
        .route("/visit", get(visit))
        .route("/attributes", get(attributes))
        .route("/short", get(short))
}

/// The full stack: cookie parser outside, session middleware inside.
pub fn app(manager: SessionManager) -> Router {
    routes()
        .layer(middleware::from_fn_with_state(manager, session_middleware))
        .layer(middleware::from_fn(cookie_parser_middleware))
}

async fn whoami(session: SessionHandle) -> String {
    session.id()
}

async fn visit(session: SessionHandle) -> Result<String, SessionRejection> {
    let views: u64 = session.get("views").unwrap_or(0) + 1;
    session.insert("views", views)?;
    Ok(views.to_string())
}

async fn attributes(session: SessionHandle) -> Json<Map<String, Value>> {
    Json(session.with(|s| s.attributes().clone()))
}

async fn short(session: SessionHandle) -> &'static str {
    session.set_expiry(Some(60));
    "ok"
}

/// A GET request, optionally carrying a `Cookie` header.
pub fn get_request(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).expect("request builds")
}

/// Every `Set-Cookie` header of a response.
pub fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().expect("set-cookie is utf-8").to_string())
        .collect()
}

/// Value of the cookie called `name` in the response's `Set-Cookie`
/// headers.
pub fn cookie_value(response: &Response<Body>, name: &str) -> Option<String> {
    let prefix = format!("{}=", name);
    set_cookies(response).into_iter().find_map(|set_cookie| {
        set_cookie
            .split(';')
            .next()
            .and_then(|pair| pair.strip_prefix(&prefix))
            .map(str::to_string)
    })
}

/// Read a response body as a string.
pub async fn body_string(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body reads");
    String::from_utf8(bytes.to_vec()).expect("body is utf-8")
}

/// Encode a JSON object the way the session layer stores it.
pub fn stored(value: Value) -> String {
    match value {
        Value::Object(map) => rsession::codec::encode(&map),
        _ => panic!("fixture must be an object"),
    }
}
