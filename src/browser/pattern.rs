//! URL match patterns.
//!
//! Listeners are scoped with WebExtension-style match patterns:
//!
//! | Pattern | Matches |
//! |---------|---------|
//! | `<all_urls>` | every URL, any scheme |
//! | `*://*/*` | every host and path over `http`, `https`, `ws` or `wss` |
//! | `https://*.example.com/*` | `example.com` and its subdomains over HTTPS |
//! | `http://a.test/docs/*` | paths under `/docs/` on `a.test` |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use regex::Regex;
use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Pattern matching every URL, whatever its scheme.
pub const ALL_URLS: &str = "<all_urls>";

/// Schemes matched by a `*` scheme.
const WILDCARD_SCHEMES: [&str; 4] = ["http", "https", "ws", "wss"];

// ============================================================================
// Pattern Parts
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum SchemeMatch {
    /// Every scheme (`<all_urls>` only).
    Any,
    /// `*`: web and websocket schemes.
    Wildcard,
    Exact(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum HostMatch {
    Any,
    Exact(String),
    /// Domain and all of its subdomains.
    Subdomains(String),
}

#[derive(Debug, Clone)]
enum PathMatch {
    Any,
    Glob(Regex),
}

// ============================================================================
// UrlPattern
// ============================================================================

/// A parsed URL match pattern.
#[derive(Debug, Clone)]
pub struct UrlPattern {
    source: String,
    scheme: SchemeMatch,
    host: HostMatch,
    path: PathMatch,
}

impl UrlPattern {
    /// Returns `<all_urls>`, matching all schemes, hosts and paths.
    #[must_use]
    pub fn any() -> Self {
        Self {
            source: ALL_URLS.to_string(),
            scheme: SchemeMatch::Any,
            host: HostMatch::Any,
            path: PathMatch::Any,
        }
    }

    /// Parses a match pattern.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPattern`] if the pattern is malformed.
    pub fn parse(pattern: &str) -> Result<Self> {
        if pattern == ALL_URLS {
            return Ok(Self::any());
        }

        let invalid = |message: &str| Error::invalid_pattern(pattern, message);

        let (scheme, rest) = pattern
            .split_once("://")
            .ok_or_else(|| invalid("missing `://`"))?;

        let scheme = match scheme {
            "*" => SchemeMatch::Wildcard,
            "" => return Err(invalid("missing scheme")),
            s if s
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')) =>
            {
                SchemeMatch::Exact(s.to_ascii_lowercase())
            }
            _ => return Err(invalid("invalid scheme")),
        };

        let slash = rest.find('/').ok_or_else(|| invalid("missing path"))?;
        let (host, path) = rest.split_at(slash);

        let host = match host {
            "*" => HostMatch::Any,
            "" if scheme == SchemeMatch::Exact("file".into()) => HostMatch::Exact(String::new()),
            "" => return Err(invalid("missing host")),
            h => match h.strip_prefix("*.") {
                Some(domain) if !domain.is_empty() && !domain.contains('*') => {
                    HostMatch::Subdomains(domain.to_ascii_lowercase())
                }
                Some(_) => return Err(invalid("invalid wildcard host")),
                None if h.contains('*') => {
                    return Err(invalid("`*` is only allowed as a leading `*.` in hosts"));
                }
                None => HostMatch::Exact(h.to_ascii_lowercase()),
            },
        };

        let path = if path == "/*" {
            PathMatch::Any
        } else {
            let glob = regex::escape(path).replace(r"\*", ".*");
            let regex = Regex::new(&format!("^{glob}$")).map_err(|e| invalid(&e.to_string()))?;
            PathMatch::Glob(regex)
        };

        Ok(Self {
            source: pattern.to_string(),
            scheme,
            host,
            path,
        })
    }

    /// Returns the pattern text.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Returns `true` if `url` matches the pattern.
    ///
    /// Unparseable URLs never match.
    #[must_use]
    pub fn matches(&self, url: &str) -> bool {
        let Ok(url) = Url::parse(url) else {
            return false;
        };

        let scheme_ok = match &self.scheme {
            SchemeMatch::Any => true,
            SchemeMatch::Wildcard => WILDCARD_SCHEMES.contains(&url.scheme()),
            SchemeMatch::Exact(scheme) => url.scheme() == scheme,
        };

        let host = url.host_str().unwrap_or_default();
        let host_ok = match &self.host {
            HostMatch::Any => true,
            HostMatch::Exact(expected) => host == expected,
            HostMatch::Subdomains(domain) => {
                host == domain
                    || host
                        .strip_suffix(domain.as_str())
                        .is_some_and(|prefix| prefix.ends_with('.'))
            }
        };

        let path_ok = match &self.path {
            PathMatch::Any => true,
            PathMatch::Glob(regex) => match url.query() {
                Some(query) => regex.is_match(&format!("{}?{}", url.path(), query)),
                None => regex.is_match(url.path()),
            },
        };

        scheme_ok && host_ok && path_ok
    }
}

impl Default for UrlPattern {
    fn default() -> Self {
        Self::any()
    }
}

impl FromStr for UrlPattern {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for UrlPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcard_scheme_is_web_only() {
        let pattern = UrlPattern::parse("*://*/*").expect("parse");

        assert!(pattern.matches("http://a.test/x"));
        assert!(pattern.matches("https://b.test/path?q=1"));
        assert!(pattern.matches("ws://c.test/socket"));
        assert!(pattern.matches("wss://c.test/socket"));
        assert!(!pattern.matches("ftp://d.test/file.txt"));
        assert!(!pattern.matches("file:///etc/hosts"));
        assert!(!pattern.matches("not a url"));
    }

    #[test]
    fn test_all_urls_matches_every_scheme() {
        let pattern: UrlPattern = ALL_URLS.parse().expect("parse");

        assert!(pattern.matches("http://a.test/x"));
        assert!(pattern.matches("ftp://d.test/file.txt"));
        assert!(pattern.matches("file:///etc/hosts"));
        assert!(!pattern.matches("not a url"));
        assert_eq!(pattern.to_string(), ALL_URLS);
        assert_eq!(UrlPattern::default().as_str(), ALL_URLS);
    }

    #[test]
    fn test_scheme_and_subdomain() {
        let pattern = UrlPattern::parse("https://*.example.com/*").expect("parse");

        assert!(pattern.matches("https://example.com/"));
        assert!(pattern.matches("https://www.example.com/a"));
        assert!(!pattern.matches("http://www.example.com/a"));
        assert!(!pattern.matches("https://badexample.com/"));
    }

    #[test]
    fn test_path_glob() {
        let pattern = UrlPattern::parse("http://a.test/docs/*.html").expect("parse");

        assert!(pattern.matches("http://a.test/docs/intro.html"));
        assert!(pattern.matches("http://a.test/docs/deep/page.html"));
        assert!(!pattern.matches("http://a.test/docs/intro.txt"));
        assert!(!pattern.matches("http://a.test/blog/intro.html"));
    }

    #[test]
    fn test_path_glob_sees_query() {
        let pattern = UrlPattern::parse("http://a.test/search?*").expect("parse");
        assert!(pattern.matches("http://a.test/search?q=rust"));
    }

    #[test]
    fn test_file_scheme_without_host() {
        let pattern = UrlPattern::parse("file:///home/*").expect("parse");
        assert!(pattern.matches("file:///home/user/notes.txt"));
    }

    #[test]
    fn test_invalid_patterns() {
        for pattern in ["", "a.test/*", "://a.test/*", "http://a.test", "http:///x", "http://a.*.test/*"] {
            let err = UrlPattern::parse(pattern).unwrap_err();
            assert!(
                matches!(err, Error::InvalidPattern { .. }),
                "expected {pattern:?} to be rejected"
            );
        }
    }
}
