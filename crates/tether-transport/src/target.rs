//! Connection targets: validated streaming-socket addresses.

use std::fmt;
use std::str::FromStr;

use crate::TransportError;

/// Schemes accepted for a streaming-socket target.
const STREAMING_SCHEMES: [&str; 2] = ["ws://", SECURE_SCHEME];
const SECURE_SCHEME: &str = "wss://";

/// A validated address the client can dial.
///
/// Only `ws://` and `wss://` addresses are accepted (the scheme is matched
/// case-insensitively) and the authority part must be non-empty. Once
/// constructed a target never changes; pointing the manager somewhere else
/// means building a new one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionTarget(String);

impl ConnectionTarget {
    /// Validates `addr` and wraps it.
    ///
    /// The scheme is stored lowercase (`WS://host` becomes `ws://host`);
    /// the rest of the address is kept as given.
    ///
    /// # Errors
    /// Returns [`TransportError::InvalidTarget`] if the scheme is not a
    /// streaming-socket scheme or the host is missing. A `wss://` address
    /// is also rejected when the crate is built without the `tls` feature,
    /// since it could never be dialed.
    pub fn parse(addr: &str) -> Result<Self, TransportError> {
        let trimmed = addr.trim();
        let invalid = |reason| TransportError::InvalidTarget {
            target: addr.to_string(),
            reason,
        };

        let (scheme, rest) = STREAMING_SCHEMES
            .iter()
            .find_map(|scheme| {
                strip_prefix_ignore_case(trimmed, scheme).map(|rest| (*scheme, rest))
            })
            .ok_or_else(|| invalid("scheme must be ws:// or wss://"))?;

        if scheme == SECURE_SCHEME && !cfg!(feature = "tls") {
            return Err(invalid("wss:// requires the `tls` feature"));
        }

        let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
        if authority.is_empty() {
            return Err(invalid("missing host"));
        }
        if rest.chars().any(char::is_whitespace) {
            return Err(invalid("address contains whitespace"));
        }

        Ok(Self(format!("{scheme}{rest}")))
    }

    /// Returns the address as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the target asks for a TLS-secured socket (`wss://`).
    pub fn is_secure(&self) -> bool {
        self.0.starts_with(SECURE_SCHEME)
    }
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &s[prefix.len()..])
}

impl FromStr for ConnectionTarget {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ConnectionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ConnectionTarget {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_ws() {
        let t = ConnectionTarget::parse("ws://localhost:8000/ws/g1").unwrap();
        assert_eq!(t.as_str(), "ws://localhost:8000/ws/g1");
        assert!(!t.is_secure());
    }

    #[cfg(feature = "tls")]
    #[test]
    fn test_accepts_wss_with_tls() {
        let t = ConnectionTarget::parse("WSS://poker.example.com/ws/abc").unwrap();
        assert_eq!(t.as_str(), "wss://poker.example.com/ws/abc");
        assert!(t.is_secure());
    }

    #[cfg(not(feature = "tls"))]
    #[test]
    fn test_rejects_wss_without_tls() {
        let err = ConnectionTarget::parse("wss://poker.example.com/ws/abc").unwrap_err();
        assert!(matches!(err, TransportError::InvalidTarget { .. }));
        assert!(err.to_string().contains("tls"));
    }

    #[test]
    fn test_scheme_is_lowercased_and_whitespace_trimmed() {
        let t = ConnectionTarget::parse("  WS://Host/ws/1 ").unwrap();
        assert_eq!(t.to_string(), "ws://Host/ws/1");
        assert_eq!(t, ConnectionTarget::parse("ws://Host/ws/1").unwrap());
    }

    #[test]
    fn test_rejects_http_scheme() {
        let err = ConnectionTarget::parse("http://host/ws/1").unwrap_err();
        assert!(matches!(err, TransportError::InvalidTarget { .. }));
        assert!(err.to_string().contains("ws://"));
    }

    #[test]
    fn test_rejects_missing_host() {
        assert!(ConnectionTarget::parse("ws://").is_err());
        assert!(ConnectionTarget::parse("ws:///ws/1").is_err());
        assert!(ConnectionTarget::parse("").is_err());
    }

    #[test]
    fn test_rejects_inner_whitespace() {
        assert!(ConnectionTarget::parse("ws://ho st/ws").is_err());
    }

    #[test]
    fn test_from_str() {
        let t: ConnectionTarget = "ws://a".parse().unwrap();
        assert_eq!(t, ConnectionTarget::parse("ws://a").unwrap());
    }
}
