//! # Crumb Guard
//!
//! CSRF mitigation middleware: issues an unpredictable per-session token
//! ("crumb") in a cookie, injects it into server-rendered views, and
//! requires every state-changing request to echo it back - in the request
//! body or query, or in a custom header for restful clients.
//!
//! ## Features
//!
//! - **Cookie-carried tokens** - stateless by default, nothing persisted
//!   server-side
//! - **Two validation modes** - body/query field, or `X-CSRF-Token` header
//!   for restful clients
//! - **Per-route overrides** - disable, opt in, or tweak mode/source/key
//!   per route, memoized after first resolution
//! - **HMAC tokens** - optional OWASP-style stateless tokens bound to the
//!   authenticated identity
//! - **Origin-aware issuance** - never hands a fresh crumb cookie to a
//!   disallowed cross-origin caller
//! - **Dry-run toggle** - issue cookies without rejecting, for rollout
//!
//! ## Quick Start
//!
//! ```rust
//! use crumb_guard::{CrumbGuard, GuardConfig};
//!
//! let guard = CrumbGuard::new(GuardConfig::default()).unwrap();
//!
//! // Or customized:
//! let config = GuardConfig::new()
//!     .with_key("crumb")
//!     .with_restful(true)
//!     .with_header_name("X-CSRF-Token")
//!     .with_log_unauthorized(true);
//! let guard = CrumbGuard::new(config).unwrap();
//! ```
//!
//! ## Request flow
//!
//! ```rust
//! use std::sync::Arc;
//! use crumb_guard::{CrumbGuard, GuardConfig, HttpRequest, Route};
//! use http::Method;
//!
//! let guard = CrumbGuard::new(GuardConfig::default()).unwrap();
//! let route = Arc::new(Route::new(Method::GET, "/form"));
//! let mut req = HttpRequest::new(route.clone());
//!
//! // Pre-handler: a fresh token is materialized for this request.
//! let token = guard.intercept(&mut req).unwrap();
//! assert!(token.value.is_some());
//!
//! // Post-handler: the cookie is scheduled on the response.
//! let mut res = crumb_guard::HttpResponse::ok();
//! guard.decorate(&route, &token, &mut res);
//! assert!(res.headers.contains_key("Set-Cookie"));
//! ```

pub mod config;
pub mod error;
pub mod hmac;
pub mod http;
pub mod middleware;
pub mod origin;
pub mod policy;
pub mod token;

pub use config::{CookieOptions, GuardConfig, SameSite, TokenMethod, TokenSource};
pub use error::{CrumbError, Result};
pub use http::{
    handler, BodySource, HttpRequest, HttpResponse, Middleware, Next, ResponseBody, Route,
};
pub use middleware::{CrumbGuard, RequestToken};
pub use origin::OriginList;
pub use policy::{CrumbOverride, PolicyCache, RoutePolicy};
