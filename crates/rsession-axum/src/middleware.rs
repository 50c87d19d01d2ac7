//! Session middleware.
//!
//! ```ignore
//! let manager = SessionManager::builder(SessionConfig::new(secret))
//!     .backend(MemoryBackend::new())
//!     .build()?;
//!
//! let app = Router::new()
//!     .route("/", get(handler))
//!     .layer(middleware::from_fn_with_state(manager, session_middleware))
//!     .layer(middleware::from_fn(cookie_parser_middleware));
//! ```

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use rsession::RequestContext;

use crate::cookies::RequestCookies;
use crate::error::SessionRejection;
use crate::extract::SessionHandle;
use crate::manager::SessionManager;

/// Attach a [`SessionHandle`] to the request and save the session once the
/// inner service has produced a response.
///
/// Requires [`RequestCookies`] in the request extensions and fails the
/// request with a server error if they are missing. A backend failure while
/// loading, or while saving under the deferred policy, replaces the
/// response with a server error.
pub async fn session_middleware(
    State(manager): State<SessionManager>,
    mut request: Request,
    next: Next,
) -> Result<Response, SessionRejection> {
    let cookies = request
        .extensions()
        .get::<RequestCookies>()
        .cloned()
        .ok_or(SessionRejection::MissingCookies)?;

    let context = RequestContext::new(request.method().as_str(), request.uri().path());
    let session = manager.load(&cookies, context).await?;

    let handle = SessionHandle::new(session);
    request.extensions_mut().insert(handle.clone());

    let mut response = next.run(request).await;

    manager.complete(&handle, &cookies, &mut response).await?;
    Ok(response)
}
