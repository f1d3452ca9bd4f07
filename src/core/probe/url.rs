//! URL grammar accepted by the probe client:
//! `http://host[:port][/path][;params][?query][#frag]` and the equivalent
//! `https://`. Hand-rolled rather than pulled from a general-purpose URL
//! crate because the contract is narrow and the port-validation rule
//! (numeric or bust) is specific to this client.

use crate::error::{HalberdError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn default_port(self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedUrl {
    pub scheme: Scheme,
    /// Hostname for the `Host:` header -- NOT the address the caller
    /// connects to (the caller has already resolved and chosen an IP).
    pub host: String,
    pub port: u16,
    /// Everything after `scheme://netloc`, defaulting to `/` when empty.
    pub request_target: String,
}

pub fn parse(raw: &str) -> Result<ParsedUrl> {
    let (scheme_str, rest) = raw
        .split_once("://")
        .ok_or_else(|| HalberdError::InvalidUrl(raw.to_string()))?;

    let scheme = match scheme_str {
        "http" => Scheme::Http,
        "https" => Scheme::Https,
        other => return Err(HalberdError::InvalidUrl(format!("unsupported scheme {other:?}"))),
    };

    let (netloc, request_target) = match rest.find('/') {
        Some(idx) => (&rest[..idx], &rest[idx..]),
        None => (rest, ""),
    };

    if netloc.is_empty() {
        return Err(HalberdError::InvalidUrl("empty host".to_string()));
    }

    let (host, port) = match netloc.split_once(':') {
        Some((host, port_str)) => {
            if host.is_empty() {
                return Err(HalberdError::InvalidUrl("empty host".to_string()));
            }
            if port_str.is_empty() || !port_str.bytes().all(|b| b.is_ascii_digit()) {
                return Err(HalberdError::InvalidUrl(format!(
                    "non-numeric port {port_str:?}"
                )));
            }
            let port: u16 = port_str
                .parse()
                .map_err(|_| HalberdError::InvalidUrl(format!("port out of range {port_str:?}")))?;
            (host.to_string(), port)
        }
        None => (netloc.to_string(), scheme.default_port()),
    };

    Ok(ParsedUrl {
        scheme,
        host,
        port,
        request_target: if request_target.is_empty() {
            "/".to_string()
        } else {
            request_target.to_string()
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_defaults() {
        let p = parse("http://example.com/foo?x=1").unwrap();
        assert_eq!(p.scheme, Scheme::Http);
        assert_eq!(p.host, "example.com");
        assert_eq!(p.port, 80);
        assert_eq!(p.request_target, "/foo?x=1");
    }

    #[test]
    fn parses_explicit_port_and_https() {
        let p = parse("https://example.com:8443/").unwrap();
        assert_eq!(p.scheme, Scheme::Https);
        assert_eq!(p.port, 8443);
    }

    #[test]
    fn rejects_non_numeric_port() {
        assert!(parse("http://example.com:abc/").is_err());
    }

    #[test]
    fn rejects_unsupported_scheme() {
        assert!(parse("ftp://example.com/").is_err());
    }

    #[test]
    fn defaults_empty_path_to_root() {
        let p = parse("http://example.com").unwrap();
        assert_eq!(p.request_target, "/");
    }
}
