//! Per-route crumb policy resolution.
//!
//! Routes carry an optional crumb annotation: disabled, enabled with
//! defaults, or a partial override. The effective policy merges that
//! annotation with the global configuration and is memoized in a side
//! table keyed by route identity, so the merge happens exactly once per
//! route no matter how many requests hit it.

use std::collections::HashMap;
use std::sync::Arc;

use http::Method;
use parking_lot::RwLock;

use crate::config::{GuardConfig, TokenSource};
use crate::http::Route;

/// Per-route crumb annotation from the host router's metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CrumbOverride {
    /// No annotation; the route takes the global defaults, and the global
    /// `auto_generate` setting decides whether it is issued a token.
    #[default]
    Unset,
    /// Crumb explicitly disabled: no generation, no validation.
    Disabled,
    /// Crumb explicitly enabled with the global defaults.
    Enabled,
    /// Partial override; unspecified fields fall back to the defaults.
    Custom {
        restful: Option<bool>,
        source: Option<TokenSource>,
        key: Option<String>,
    },
}

/// Effective crumb settings for one route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePolicy {
    pub enabled: bool,
    pub restful: bool,
    pub source: TokenSource,
    pub key: String,
}

impl RoutePolicy {
    fn disabled(config: &GuardConfig) -> Self {
        Self {
            enabled: false,
            restful: config.restful,
            source: TokenSource::Payload,
            key: config.key.clone(),
        }
    }

    fn enabled_defaults(config: &GuardConfig) -> Self {
        Self {
            enabled: true,
            restful: config.restful,
            source: TokenSource::Payload,
            key: config.key.clone(),
        }
    }

    /// Merge a route's annotation with the global defaults.
    ///
    /// `enabled` is false only for an explicit disable. A route with no
    /// annotation stays enabled even when `auto_generate` is off: it will
    /// never be issued a token, so validation on it fails closed rather
    /// than silently turning off.
    fn resolve(route: &Route, config: &GuardConfig) -> Self {
        match &route.crumb {
            CrumbOverride::Unset => Self::enabled_defaults(config),
            CrumbOverride::Disabled => Self::disabled(config),
            CrumbOverride::Enabled => Self::enabled_defaults(config),
            CrumbOverride::Custom {
                restful,
                source,
                key,
            } => Self {
                enabled: true,
                restful: restful.unwrap_or(config.restful),
                source: source.unwrap_or(TokenSource::Payload),
                key: key.clone().unwrap_or_else(|| config.key.clone()),
            },
        }
    }
}

/// Stable route identity: method plus registered path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RouteKey {
    method: Method,
    path: String,
}

impl RouteKey {
    fn from_route(route: &Route) -> Self {
        Self {
            method: route.method.clone(),
            path: route.path.clone(),
        }
    }
}

/// Memoizing policy side table.
///
/// The first request to a route computes its policy; later requests get
/// the same `Arc`. Two requests racing the first access may both compute
/// the (deterministic) value, but only the first insert is published, so
/// callers always observe a fully-formed, identity-stable policy.
#[derive(Debug, Default)]
pub struct PolicyCache {
    policies: RwLock<HashMap<RouteKey, Arc<RoutePolicy>>>,
}

impl PolicyCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve(&self, route: &Route, config: &GuardConfig) -> Arc<RoutePolicy> {
        let key = RouteKey::from_route(route);

        if let Some(policy) = self.policies.read().get(&key) {
            return policy.clone();
        }

        let computed = Arc::new(RoutePolicy::resolve(route, config));
        self.policies
            .write()
            .entry(key)
            .or_insert(computed)
            .clone()
    }
}
