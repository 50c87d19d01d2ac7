//! Axum integration for rsession.
//!
//! Binds every request to a session identified by a signed cookie and
//! stored in a cache backend:
//!
//! 1. [`cookie_parser_middleware`] parses the `Cookie` header.
//! 2. [`session_middleware`] verifies the session cookie, loads or creates
//!    the session and hands it to the handler as a [`SessionHandle`].
//! 3. After the handler returns, the session is saved according to the
//!    configured [`SavePolicy`](rsession::SavePolicy) and the signed cookie
//!    is set on the response.
//!
//! # Example
//!
//! ```ignore
//! use axum::{Router, middleware, routing::get};
//! use rsession::{MemoryBackend, SessionConfig};
//! use rsession_axum::{SessionHandle, SessionManager, cookie_parser_middleware, session_middleware};
//!
//! let manager = SessionManager::builder(SessionConfig::new("s1"))
//!     .backend(MemoryBackend::new())
//!     .build()?;
//!
//! let app = Router::new()
//!     .route("/", get(|session: SessionHandle| async move { session.id() }))
//!     .layer(middleware::from_fn_with_state(manager, session_middleware))
//!     .layer(middleware::from_fn(cookie_parser_middleware));
//! ```

pub mod cookies;
pub mod error;
pub mod extract;
pub mod manager;
pub mod middleware;

pub use cookies::{
    CookieSecret, HeaderCookieSink, RequestCookies, cookie_parser_middleware, render_cookie,
    signed_cookie_parser_middleware,
};
pub use error::{ErrorResponse, SessionRejection};
pub use extract::SessionHandle;
pub use manager::{SessionManager, SessionManagerBuilder};
pub use middleware::session_middleware;
