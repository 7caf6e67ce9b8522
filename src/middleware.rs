//! The crumb guard: request interception and response decoration.
//!
//! Interception runs after the host's auth processing and before the route
//! handler. It is an ordered list of short-circuit gates: skip predicate,
//! route policy lookup, origin gate, token materialization, enforce gate,
//! then mode-specific validation (header in restful mode, payload or query
//! field otherwise). Any rejection is terminal; the handler never runs.
//!
//! Decoration runs after the handler: it attaches the `Set-Cookie` header
//! for freshly issued tokens and injects the token into view template
//! contexts.

use std::sync::Arc;

use async_trait::async_trait;
use http::Method;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::config::{GuardConfig, TokenMethod, TokenSource};
use crate::error::{CrumbError, Result};
use crate::http::{BodySource, HttpRequest, HttpResponse, Middleware, Next, ResponseBody, Route};
use crate::origin::OriginList;
use crate::policy::{CrumbOverride, PolicyCache, RoutePolicy};
use crate::{hmac, token};

/// Token state for one request. Created during interception, read during
/// decoration, discarded with the request.
#[derive(Debug, Clone, Default)]
pub struct RequestToken {
    /// The token bound to this request, from the cookie or freshly made.
    pub value: Option<String>,
    /// True when the token was generated here and a cookie set is due.
    pub fresh: bool,
}

impl RequestToken {
    fn reused(value: String) -> Self {
        Self {
            value: Some(value),
            fresh: false,
        }
    }
}

/// CSRF crumb guard. Construct once at host setup; share across requests.
pub struct CrumbGuard {
    config: Arc<GuardConfig>,
    origins: OriginList,
    policies: PolicyCache,
}

impl std::fmt::Debug for CrumbGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrumbGuard")
            .field("config", &self.config)
            .field("origins", &self.origins)
            .finish_non_exhaustive()
    }
}

impl CrumbGuard {
    /// Validate the configuration and build the guard. A configuration
    /// error here must abort host setup; the guard never installs half
    /// configured.
    pub fn new(config: GuardConfig) -> Result<Self> {
        config.validate()?;
        let origins = OriginList::parse(&config.allow_origins)?;

        Ok(Self {
            config: Arc::new(config),
            origins,
            policies: PolicyCache::new(),
        })
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    /// Run the pre-handler state machine. Returns the request's token state
    /// on success; `Err(Forbidden)` when validation rejects the request.
    pub fn intercept(&self, req: &mut HttpRequest) -> Result<RequestToken> {
        // Gate 1: per-request bypass.
        if let Some(skip) = &self.config.skip {
            if skip(req) {
                return Ok(RequestToken::default());
            }
        }

        // Gate 2: effective route policy, memoized per route.
        let policy = self.policies.resolve(&req.route, &self.config);

        // Gates 3 and 4: issue a crumb only when the route wants one
        // (auto-generation or an explicit opt-in), and never leak a fresh
        // cookie to a disallowed cross-origin caller. An enabled route that
        // gets no token here still validates below, failing closed.
        let opted_in = matches!(
            req.route.crumb,
            CrumbOverride::Enabled | CrumbOverride::Custom { .. }
        );
        let token = if policy.enabled
            && (self.config.auto_generate || opted_in)
            && self.origin_allowed(req)
        {
            self.generate(req)
        } else {
            RequestToken::default()
        };

        // Gate 5: dry run. Cookie issuance above still happened.
        if !self.config.enforce {
            return Ok(token);
        }

        // Gate 6: mode branch.
        if policy.restful {
            self.validate_header(req, &policy, &token)?;
        } else {
            self.validate_source(req, &policy, &token)?;
        }

        Ok(token)
    }

    /// Materialize the request's token: reuse the cookie value when the
    /// client presented one, otherwise generate. Reuse never re-issues the
    /// cookie. With the HMAC method an unauthenticated request yields no
    /// token at all, which makes any later validation fail closed.
    pub fn generate(&self, req: &HttpRequest) -> RequestToken {
        if let Some(values) = req.cookies.get(&self.config.key) {
            if values.len() > 1 {
                debug!(target: "crumb", key = %self.config.key, "multiple cookies found");
            }
            if let Some(existing) = values.first() {
                return RequestToken::reused(existing.clone());
            }
        }

        let value = match self.config.method {
            TokenMethod::Random => Some(token::random_token(self.config.token_size)),
            TokenMethod::Hmac => {
                let secret = self.config.secret.as_deref().unwrap_or_default();
                req.auth
                    .get(&self.config.session_key)
                    .map(|identity| hmac::encrypt(identity, secret))
            }
        };

        RequestToken {
            fresh: value.is_some(),
            value,
        }
    }

    /// Decorate the outbound response: schedule the cookie for freshly
    /// issued tokens and inject the token into view contexts. Never fails
    /// and never touches non-view bodies.
    pub fn decorate(&self, route: &Route, token: &RequestToken, res: &mut HttpResponse) {
        if token.fresh {
            if let Some(value) = &token.value {
                res.headers.insert(
                    "Set-Cookie".to_string(),
                    self.config.cookie_options.render(&self.config.key, value),
                );
            }
        }

        if !self.config.add_to_view_context || res.is_error() {
            return;
        }

        let policy = self.policies.resolve(route, &self.config);
        if !policy.enabled {
            return;
        }

        if let Some(value) = &token.value {
            if let ResponseBody::View { context, .. } = &mut res.body {
                context
                    .get_or_insert_with(Map::new)
                    .insert(policy.key.clone(), Value::String(value.clone()));
            }
        }
    }

    /// Cross-origin issuance gate. Same-origin requests always pass. For
    /// cross-origin requests on CORS-enabled routes the configured
    /// allow-list decides when present; otherwise the host's own CORS
    /// decision is consulted, failing closed when the host made none.
    fn origin_allowed(&self, req: &HttpRequest) -> bool {
        if !req.route.cors {
            return true;
        }

        let Some(origin) = req.header("origin") else {
            return true;
        };

        if !self.origins.is_empty() {
            self.origins.matches(origin)
        } else {
            req.cors_origin_allowed.unwrap_or(false)
        }
    }

    /// Restful mode: the configured header must carry the token on every
    /// mutating request to a crumb-enabled route.
    fn validate_header(
        &self,
        req: &HttpRequest,
        policy: &RoutePolicy,
        token: &RequestToken,
    ) -> Result<()> {
        if !is_mutating(&req.method) || !policy.enabled {
            return Ok(());
        }

        let Some(header) = req.header(&self.config.header_name) else {
            return self.reject();
        };

        if !self.token_matches(header, token, req) {
            return self.reject();
        }

        Ok(())
    }

    /// Body mode: POST only. The configured source must be buffered and
    /// carry the token under the policy key; the field is stripped before
    /// the handler sees the payload.
    fn validate_source(
        &self,
        req: &mut HttpRequest,
        policy: &RoutePolicy,
        token: &RequestToken,
    ) -> Result<()> {
        if req.method != Method::POST || !policy.enabled {
            return Ok(());
        }

        let presented = match policy.source {
            TokenSource::Payload => match &req.body {
                BodySource::Buffered(map) => map
                    .get(&policy.key)
                    .and_then(Value::as_str)
                    .map(str::to_string),
                // A streamed body can never be inspected synchronously;
                // reject rather than guess.
                BodySource::Streamed | BodySource::Empty => return self.reject(),
            },
            TokenSource::Query => req.query.get(&policy.key).cloned(),
        };

        let Some(presented) = presented else {
            return self.reject();
        };

        if !self.token_matches(&presented, token, req) {
            return self.reject();
        }

        // Keep the token out of application data.
        match policy.source {
            TokenSource::Payload => {
                if let BodySource::Buffered(map) = &mut req.body {
                    map.remove(&policy.key);
                }
            }
            TokenSource::Query => {
                req.query.remove(&policy.key);
            }
        }

        Ok(())
    }

    fn token_matches(&self, presented: &str, token: &RequestToken, req: &HttpRequest) -> bool {
        match self.config.method {
            TokenMethod::Random => token.value.as_deref() == Some(presented),
            TokenMethod::Hmac => {
                let Some(identity) = req.auth.get(&self.config.session_key) else {
                    return false;
                };
                let secret = self.config.secret.as_deref().unwrap_or_default();
                hmac::validate(presented, identity, secret)
            }
        }
    }

    fn reject(&self) -> Result<()> {
        if self.config.log_unauthorized {
            warn!(target: "crumb", tag = "unauthorized", "validation failed");
        }
        Err(CrumbError::Forbidden)
    }
}

#[async_trait]
impl Middleware for CrumbGuard {
    async fn handle(&self, mut req: HttpRequest, next: Next) -> Result<HttpResponse> {
        let token = self.intercept(&mut req)?;
        let route = req.route.clone();

        let mut res = next(req).await?;
        self.decorate(&route, &token, &mut res);

        Ok(res)
    }
}

fn is_mutating(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}
