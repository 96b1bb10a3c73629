//! HTTP middleware stack for the storefront.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layers (capture errors, outermost)
//! 2. `TraceLayer` (request span with method, path and request id)
//! 3. Request ID (add unique ID to each request)
//! 4. CORS (only when origins are configured)
//!
//! Authentication is per handler through the [`RequireAuth`] and
//! [`RequireStaff`] extractors.

pub mod auth;
pub mod request_id;

pub use auth::{RequireAuth, RequireStaff};
pub use request_id::{REQUEST_ID_HEADER, request_id_middleware};
