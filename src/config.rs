use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{CrumbError, Result};
use crate::http::HttpRequest;
use crate::origin::OriginList;

/// Token generation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenMethod {
    /// Opaque cryptographically random string, echoed back by the client.
    Random,
    /// HMAC-SHA256 over the authenticated identity plus a timestamp.
    /// Requires `secret`; the identity is read from the request field named
    /// by `session_key`.
    Hmac,
}

/// Where the token is read from in body mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenSource {
    Payload,
    Query,
}

/// Cookie SameSite attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    pub fn as_str(&self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

/// Cookie attributes passed through verbatim to the `Set-Cookie` header.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CookieOptions {
    pub path: String,
    pub domain: Option<String>,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: Option<SameSite>,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            domain: None,
            secure: false,
            http_only: false,
            same_site: None,
        }
    }
}

impl CookieOptions {
    /// Render `name=value` plus attributes into a `Set-Cookie` value.
    pub fn render(&self, name: &str, value: &str) -> String {
        let mut cookie = format!("{}={}; Path={}", name, value, self.path);

        if let Some(ref domain) = self.domain {
            cookie.push_str("; Domain=");
            cookie.push_str(domain);
        }

        if self.secure {
            cookie.push_str("; Secure");
        }

        if self.http_only {
            cookie.push_str("; HttpOnly");
        }

        if let Some(same_site) = self.same_site {
            cookie.push_str("; SameSite=");
            cookie.push_str(same_site.as_str());
        }

        cookie
    }
}

/// Per-request bypass predicate.
pub type SkipPredicate = Arc<dyn Fn(&HttpRequest) -> bool + Send + Sync>;

/// Crumb guard configuration. Immutable once the guard is constructed.
#[derive(Clone)]
pub struct GuardConfig {
    /// Cookie / body / query field name.
    pub key: String,

    /// Random token length in characters (43 chars of a 64-symbol alphabet
    /// is slightly over 256 bits of entropy).
    pub token_size: usize,

    /// Issue a token even for routes without an explicit crumb opt-in.
    pub auto_generate: bool,

    /// Inject the token into view template contexts.
    pub add_to_view_context: bool,

    /// Attributes for the crumb cookie.
    pub cookie_options: CookieOptions,

    /// Header carrying the token in restful mode.
    pub header_name: String,

    /// Default validation mode for routes that do not override it.
    pub restful: bool,

    /// When set and returning true, the guard does nothing for the request.
    pub skip: Option<SkipPredicate>,

    /// When false, tokens are still issued but validation never rejects.
    pub enforce: bool,

    /// Emit a structured log entry on every rejection.
    pub log_unauthorized: bool,

    /// Token generation strategy.
    pub method: TokenMethod,

    /// HMAC signing secret. Required when `method` is `Hmac`.
    pub secret: Option<String>,

    /// Name of the authenticated-identity field used as the HMAC message.
    pub session_key: String,

    /// Explicit cross-origin allow-list for cookie issuance. When empty the
    /// host framework's CORS decision is consulted instead.
    pub allow_origins: Vec<String>,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            key: "crumb".to_string(),
            token_size: 43,
            auto_generate: true,
            add_to_view_context: true,
            cookie_options: CookieOptions::default(),
            header_name: "X-CSRF-Token".to_string(),
            restful: false,
            skip: None,
            enforce: true,
            log_unauthorized: false,
            method: TokenMethod::Random,
            secret: None,
            session_key: "userId".to_string(),
            allow_origins: Vec::new(),
        }
    }
}

impl GuardConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cookie / field name.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// Set the random token length.
    pub fn with_token_size(mut self, size: usize) -> Self {
        self.token_size = size;
        self
    }

    pub fn with_auto_generate(mut self, auto_generate: bool) -> Self {
        self.auto_generate = auto_generate;
        self
    }

    pub fn with_add_to_view_context(mut self, add: bool) -> Self {
        self.add_to_view_context = add;
        self
    }

    pub fn with_cookie_options(mut self, options: CookieOptions) -> Self {
        self.cookie_options = options;
        self
    }

    /// Set the header name used in restful mode.
    pub fn with_header_name(mut self, name: impl Into<String>) -> Self {
        self.header_name = name.into();
        self
    }

    /// Default all routes to header (restful) validation.
    pub fn with_restful(mut self, restful: bool) -> Self {
        self.restful = restful;
        self
    }

    /// Set a per-request bypass predicate.
    pub fn with_skip<F>(mut self, skip: F) -> Self
    where
        F: Fn(&HttpRequest) -> bool + Send + Sync + 'static,
    {
        self.skip = Some(Arc::new(skip));
        self
    }

    /// Dry-run toggle: when false, cookies are issued but nothing rejects.
    pub fn with_enforce(mut self, enforce: bool) -> Self {
        self.enforce = enforce;
        self
    }

    pub fn with_log_unauthorized(mut self, log: bool) -> Self {
        self.log_unauthorized = log;
        self
    }

    pub fn with_method(mut self, method: TokenMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    pub fn with_session_key(mut self, key: impl Into<String>) -> Self {
        self.session_key = key.into();
        self
    }

    pub fn with_allow_origins(mut self, origins: Vec<String>) -> Self {
        self.allow_origins = origins;
        self
    }

    /// Validate the option set. Called at guard construction; a failure here
    /// must prevent the guard from being installed at all.
    pub fn validate(&self) -> Result<()> {
        if self.key.is_empty() {
            return Err(CrumbError::Config("key must not be empty".to_string()));
        }

        if self.token_size == 0 {
            return Err(CrumbError::Config(
                "token_size must be greater than zero".to_string(),
            ));
        }

        if self.header_name.is_empty() {
            return Err(CrumbError::Config(
                "header_name must not be empty".to_string(),
            ));
        }

        if self.method == TokenMethod::Hmac {
            match self.secret {
                Some(ref secret) if !secret.is_empty() => {}
                _ => {
                    return Err(CrumbError::Config(
                        "hmac method requires a non-empty secret".to_string(),
                    ))
                }
            }
            if self.session_key.is_empty() {
                return Err(CrumbError::Config(
                    "hmac method requires a session_key".to_string(),
                ));
            }
        }

        // A bare `*` would allow every origin, defeating the gate.
        OriginList::parse(&self.allow_origins)?;

        Ok(())
    }
}

impl fmt::Debug for GuardConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuardConfig")
            .field("key", &self.key)
            .field("token_size", &self.token_size)
            .field("auto_generate", &self.auto_generate)
            .field("add_to_view_context", &self.add_to_view_context)
            .field("cookie_options", &self.cookie_options)
            .field("header_name", &self.header_name)
            .field("restful", &self.restful)
            .field("skip", &self.skip.is_some())
            .field("enforce", &self.enforce)
            .field("log_unauthorized", &self.log_unauthorized)
            .field("method", &self.method)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("session_key", &self.session_key)
            .field("allow_origins", &self.allow_origins)
            .finish()
    }
}
