//! Demo routes.

use axum::{
    Json, Router, middleware,
    routing::{get, post},
};
use rsession_axum::{
    SessionHandle, SessionManager, SessionRejection, cookie_parser_middleware, session_middleware,
};
use serde::Serialize;
use tower_http::trace::TraceLayer;

/// Body of `GET /`.
#[derive(Debug, Serialize)]
pub struct VisitResponse {
    pub session_id: String,
    pub views: u64,
    pub is_new: bool,
}

/// Build the demo router.
///
/// `/health` sits outside the session layer so probes do not create
/// sessions.
pub fn router(manager: SessionManager) -> Router {
    let session_routes = Router::new()
        .route("/", get(visit))
        .route("/logout", post(logout))
        .layer(middleware::from_fn_with_state(manager, session_middleware))
        .layer(middleware::from_fn(cookie_parser_middleware));

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .merge(session_routes)
        .layer(TraceLayer::new_for_http())
}

async fn visit(session: SessionHandle) -> Result<Json<VisitResponse>, SessionRejection> {
    let views = session.get::<u64>("views").unwrap_or(0) + 1;
    session.insert("views", views)?;

    Ok(Json(VisitResponse {
        session_id: session.id(),
        views,
        is_new: session.is_new(),
    }))
}

async fn logout(session: SessionHandle) -> &'static str {
    session.clear();
    "logged out"
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode, header},
    };
    use rsession::{MemoryBackend, SessionConfig};
    use tower::ServiceExt;

    fn app() -> Router {
        let manager = SessionManager::builder(SessionConfig::new("demo-secret"))
            .backend(MemoryBackend::new())
            .build()
            .unwrap();
        router(manager)
    }

    async fn json(response: axum::response::Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_health_sets_no_cookie() {
        let response = app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(header::SET_COOKIE).is_none());
    }

    #[tokio::test]
    async fn test_visit_counts() {
        let app = app();

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .split(';')
            .next()
            .unwrap()
            .to_string();
        let first = json(response).await;
        assert_eq!(first["views"], 1);
        assert_eq!(first["is_new"], true);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header(header::COOKIE, set_cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let second = json(response).await;
        assert_eq!(second["views"], 2);
        assert_eq!(second["is_new"], false);
        assert_eq!(second["session_id"], first["session_id"]);
    }
}
