//! Host-boundary types.
//!
//! The guard does not own the HTTP server, router, body parser, or CORS
//! computation. These types are the contract with the host framework: a
//! request snapshot carrying the pieces the guard consumes (headers,
//! parsed cookies, query map, a buffered-vs-streamed body tag, route
//! metadata, the host's CORS decision), a response the guard may decorate,
//! and the middleware seam the host invokes around its handler.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use http::Method;
use serde_json::{Map, Value};

use crate::error::{CrumbError, Result};
use crate::policy::CrumbOverride;

/// Route metadata exposed by the host router.
#[derive(Debug, Clone)]
pub struct Route {
    pub method: Method,
    pub path: String,
    /// Per-route crumb annotation, if any.
    pub crumb: CrumbOverride,
    /// Whether the host has a cross-origin policy active for this route.
    pub cors: bool,
}

impl Route {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            crumb: CrumbOverride::Unset,
            cors: false,
        }
    }

    pub fn with_crumb(mut self, crumb: CrumbOverride) -> Self {
        self.crumb = crumb;
        self
    }

    pub fn with_cors(mut self, cors: bool) -> Self {
        self.cors = cors;
        self
    }
}

/// Request body as seen by the guard.
///
/// The host's body parser knows whether a body was buffered into memory or
/// left as a stream; the guard only receives this tag. Streamed bodies can
/// never be inspected for a token and are rejected in body mode.
#[derive(Debug, Clone, Default)]
pub enum BodySource {
    #[default]
    Empty,
    Buffered(Map<String, Value>),
    Streamed,
}

impl BodySource {
    /// Decode an urlencoded form body into a buffered source.
    pub fn from_urlencoded(bytes: &[u8]) -> Self {
        match serde_urlencoded::from_bytes::<Vec<(String, String)>>(bytes) {
            Ok(pairs) => Self::Buffered(
                pairs
                    .into_iter()
                    .map(|(k, v)| (k, Value::String(v)))
                    .collect(),
            ),
            Err(_) => Self::Empty,
        }
    }

    /// Wrap a decoded JSON object body.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Object(map) => Self::Buffered(map),
            _ => Self::Empty,
        }
    }
}

/// Snapshot of an inbound request at the guard's hook point.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub path: String,
    /// Header map with lowercase names.
    pub headers: HashMap<String, String>,
    /// Parsed cookies; duplicate names keep every value in arrival order.
    pub cookies: HashMap<String, Vec<String>>,
    pub query: HashMap<String, String>,
    pub body: BodySource,
    /// Authenticated-identity fields from the host's auth layer.
    pub auth: HashMap<String, String>,
    /// The host's CORS decision for this request, when one was made.
    pub cors_origin_allowed: Option<bool>,
    pub route: Arc<Route>,
}

impl HttpRequest {
    pub fn new(route: Arc<Route>) -> Self {
        Self {
            method: route.method.clone(),
            path: route.path.clone(),
            headers: HashMap::new(),
            cookies: HashMap::new(),
            query: HashMap::new(),
            body: BodySource::Empty,
            auth: HashMap::new(),
            cors_origin_allowed: None,
            route,
        }
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.entry(name.into()).or_default().push(value.into());
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: BodySource) -> Self {
        self.body = body;
        self
    }

    pub fn with_auth(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.auth.insert(field.into(), value.into());
        self
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.headers.insert("origin".to_string(), origin.into());
        self
    }

    pub fn with_cors_decision(mut self, allowed: bool) -> Self {
        self.cors_origin_allowed = Some(allowed);
        self
    }
}

/// Response payload, classified so the guard can tell views apart.
#[derive(Debug, Clone, Default)]
pub enum ResponseBody {
    #[default]
    Empty,
    Raw(Vec<u8>),
    /// A template-rendered response; `context` is the template's data.
    View {
        template: String,
        context: Option<Map<String, Value>>,
    },
}

/// Outbound response at the guard's decoration point.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: ResponseBody,
}

impl HttpResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: ResponseBody::Empty,
        }
    }

    pub fn ok() -> Self {
        Self::new(200)
    }

    pub fn forbidden() -> Self {
        Self::new(403)
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = ResponseBody::Raw(body);
        self
    }

    /// Build a view response with an optional template context.
    pub fn view(template: impl Into<String>, context: Option<Map<String, Value>>) -> Self {
        Self {
            status: 200,
            headers: HashMap::new(),
            body: ResponseBody::View {
                template: template.into(),
                context,
            },
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.status >= 400
    }
}

/// Next handler in the middleware chain.
pub type Next = Box<
    dyn FnOnce(HttpRequest) -> Pin<Box<dyn Future<Output = Result<HttpResponse>> + Send>> + Send,
>;

/// Middleware seam the host invokes around its route handler.
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(&self, req: HttpRequest, next: Next) -> Result<HttpResponse>;
}

/// Wrap an async handler function as a `Next` continuation.
pub fn handler<F, Fut>(f: F) -> Next
where
    F: FnOnce(HttpRequest) -> Fut + Send + 'static,
    Fut: Future<Output = Result<HttpResponse>> + Send + 'static,
{
    Box::new(move |req| Box::pin(f(req)))
}

impl From<CrumbError> for HttpResponse {
    fn from(err: CrumbError) -> Self {
        Self::new(err.status_code())
    }
}
