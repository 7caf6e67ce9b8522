//! Origin allow-list matching for crumb cookie issuance.
//!
//! Patterns are `host` or `host:port`. A `*` may stand for a single host
//! segment (`*.example.com`) or for the port (`example.com:*`). A bare `*`
//! entry is a configuration error: it would allow every origin and defeat
//! the gate entirely.

use crate::error::{CrumbError, Result};

/// One parsed allow-list entry.
#[derive(Debug, Clone, PartialEq, Eq)]
struct OriginPattern {
    host_segments: Vec<String>,
    port: PortPattern,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PortPattern {
    None,
    Any,
    Exact(String),
}

/// A validated cross-origin allow-list.
#[derive(Debug, Clone, Default)]
pub struct OriginList {
    patterns: Vec<OriginPattern>,
}

impl OriginList {
    /// Parse and validate a pattern list.
    pub fn parse(patterns: &[String]) -> Result<Self> {
        let mut parsed = Vec::with_capacity(patterns.len());

        for pattern in patterns {
            if pattern == "*" {
                return Err(CrumbError::Config(
                    "allow_origins must not contain a bare '*'".to_string(),
                ));
            }
            if pattern.is_empty() {
                return Err(CrumbError::Config(
                    "allow_origins entries must not be empty".to_string(),
                ));
            }

            let (host, port) = match pattern.split_once(':') {
                Some((host, port)) => {
                    let port = if port == "*" {
                        PortPattern::Any
                    } else {
                        PortPattern::Exact(port.to_string())
                    };
                    (host, port)
                }
                None => (pattern.as_str(), PortPattern::None),
            };

            parsed.push(OriginPattern {
                host_segments: host.split('.').map(str::to_string).collect(),
                port,
            });
        }

        Ok(Self { patterns: parsed })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Match an `Origin` header value against the list. The scheme is
    /// ignored; only host and port take part in the comparison.
    pub fn matches(&self, origin: &str) -> bool {
        let authority = origin
            .split_once("://")
            .map_or(origin, |(_, authority)| authority);
        let authority = authority.trim_end_matches('/');

        let (host, port) = match authority.rsplit_once(':') {
            Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) => {
                (host, Some(port))
            }
            _ => (authority, None),
        };
        let segments: Vec<&str> = host.split('.').collect();

        self.patterns.iter().any(|pattern| {
            match &pattern.port {
                PortPattern::Any => {}
                PortPattern::None => {
                    if port.is_some() {
                        return false;
                    }
                }
                PortPattern::Exact(expected) => {
                    if port != Some(expected.as_str()) {
                        return false;
                    }
                }
            }

            pattern.host_segments.len() == segments.len()
                && pattern
                    .host_segments
                    .iter()
                    .zip(segments.iter())
                    .all(|(expected, actual)| {
                        expected.as_str() == "*" || expected.as_str() == *actual
                    })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(patterns: &[&str]) -> OriginList {
        let owned: Vec<String> = patterns.iter().map(|s| s.to_string()).collect();
        OriginList::parse(&owned).unwrap()
    }

    #[test]
    fn test_bare_wildcard_is_config_error() {
        let patterns = vec!["*".to_string()];
        assert!(matches!(
            OriginList::parse(&patterns),
            Err(CrumbError::Config(_))
        ));
    }

    #[test]
    fn test_exact_host() {
        let origins = list(&["127.0.0.1"]);
        assert!(origins.matches("http://127.0.0.1"));
        assert!(!origins.matches("http://localhost"));
        assert!(!origins.matches("http://badsite.com"));
    }

    #[test]
    fn test_wildcard_host_segment() {
        let origins = list(&["*.test.com"]);
        assert!(origins.matches("http://sub.test.com"));
        assert!(origins.matches("https://other.test.com"));
        assert!(!origins.matches("http://test.com"));
        assert!(!origins.matches("http://deep.sub.test.com"));
        assert!(!origins.matches("http://sub.test.org"));
    }

    #[test]
    fn test_wildcard_port() {
        let origins = list(&["example.com:*"]);
        assert!(origins.matches("http://example.com:8080"));
        assert!(origins.matches("http://example.com"));
        assert!(!origins.matches("http://other.com:8080"));
    }

    #[test]
    fn test_exact_port() {
        let origins = list(&["example.com:8080"]);
        assert!(origins.matches("http://example.com:8080"));
        assert!(!origins.matches("http://example.com:9090"));
        assert!(!origins.matches("http://example.com"));
    }

    #[test]
    fn test_pattern_without_port_rejects_explicit_port() {
        let origins = list(&["example.com"]);
        assert!(!origins.matches("http://example.com:8080"));
        assert!(origins.matches("http://example.com"));
    }
}
