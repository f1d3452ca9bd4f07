//! Header fingerprinting: reduces a header block to a digest that identifies
//! a back-end configuration while ignoring fields that vary per request.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::core::clue::HeaderField;
use crate::error::{HalberdError, Result};

/// Recognized-header copies kept for reporting, mirroring the original
/// `Clue.info` dict (`server`, `contloc`, `cookie`, `date`).
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ClueInfo {
    pub server: Option<String>,
    pub content_location: Option<String>,
    pub cookies: Vec<String>,
    pub date: Option<String>,
}

/// Result of fingerprinting one header block.
#[derive(Debug, Clone)]
pub struct FingerprintOutcome {
    pub digest: String,
    /// `None` when no `Date:` header was present (remote clock unknown; the
    /// caller treats this as second 0, matching the original's `_remote = 0`
    /// default).
    pub remote: Option<DateTime<Utc>>,
    pub info: ClueInfo,
}

/// Normalize a header name into the form the dispatch table matches on:
/// lowercase, alphanumeric characters only, with leading digits stripped.
///
/// Returns an error if the result is empty.
pub fn normalize(name: &str) -> Result<String> {
    let mut normal: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect();

    while normal.starts_with(|c: char| c.is_ascii_digit()) {
        normal.remove(0);
    }

    if normal.is_empty() {
        return Err(HalberdError::InvalidHeaderName(name.to_string()));
    }

    Ok(normal)
}

/// Recognized fields that never contribute their value under any ignore
/// set: `Expires`, `Age`, `Content-Length`, `Last-Modified`, `ETag`,
/// `Cache-Expires`. They exist only so callers know the field was seen.
pub(crate) const ALWAYS_DROPPED: &[&str] = &[
    "expires",
    "age",
    "contentlength",
    "lastmodified",
    "etag",
    "cacheexpires",
];

/// Normalized names with a dedicated dispatch handler. Reanalysis must never
/// register an ignore binding for one of these -- they have fixed semantics
/// regardless of what a pairwise diff might suggest.
pub(crate) const RECOGNIZED: &[&str] = &["date", "server", "contentlocation", "setcookie"];

/// Fingerprint an ordered header list.
///
/// `ignored` extends the dispatch table with temporary "drop from digest"
/// bindings for fields that otherwise fall through to the default
/// contribution rule (see the reanalysis module). It must never be
/// used to override the fixed recognized fields (`date`, `server`,
/// `content-location`, `set-cookie`, and the always-dropped set above) --
/// callers only ever add names with no dedicated handler.
pub fn fingerprint(headers: &[HeaderField], ignored: &HashSet<String>) -> Result<FingerprintOutcome> {
    let mut info = ClueInfo::default();
    let mut remote = None;
    let mut contribution = String::new();

    for (name, value) in headers {
        let normalized = normalize(name)?;

        match normalized.as_str() {
            "date" => {
                info.date = Some(value.clone());
                match parse_rfc822(value) {
                    Ok(dt) => remote = Some(dt),
                    Err(_) => {
                        log::warn!("unparsable Date header: {:?}", value);
                    }
                }
            }
            "server" => {
                info.server = Some(value.clone());
                contribution.push_str(value);
            }
            "contentlocation" => {
                info.content_location = Some(value.clone());
                contribution.push_str(value);
            }
            "setcookie" => {
                info.cookies.push(value.clone());
            }
            other if ALWAYS_DROPPED.contains(&other) => {}
            other => {
                if !ignored.contains(other) {
                    contribution.push_str(name);
                    contribution.push_str(": ");
                    contribution.push_str(value);
                    contribution.push(' ');
                }
            }
        }
    }

    let mut hasher = Sha256::new();
    hasher.update(contribution.as_bytes());
    let digest = hex::encode(hasher.finalize());

    Ok(FingerprintOutcome {
        digest,
        remote,
        info,
    })
}

/// Parse an RFC 822 (`Date:` header) timestamp, e.g.
/// `"Tue, 24 Feb 2004 17:09:05 GMT"`.
fn parse_rfc822(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| HalberdError::InvalidHeaderName(format!("Date: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_non_alnum_and_leading_digits() {
        assert_eq!(normalize("Content-Length").unwrap(), "contentlength");
        assert_eq!(normalize("X-42-Foo").unwrap(), "xfoo");
        assert_eq!(normalize("2Bar").unwrap(), "bar");
    }

    #[test]
    fn normalize_rejects_all_digit_names() {
        assert!(normalize("1234").is_err());
    }

    #[test]
    fn date_never_contributes_to_digest() {
        let ignored = HashSet::new();
        let with_date = fingerprint(
            &[
                ("Server".into(), "nginx".into()),
                ("Date".into(), "Tue, 24 Feb 2004 17:09:05 GMT".into()),
            ],
            &ignored,
        )
        .unwrap();
        let without_date = fingerprint(&[("Server".into(), "nginx".into())], &ignored).unwrap();
        assert_eq!(with_date.digest, without_date.digest);
    }

    #[test]
    fn dropped_fields_never_contribute() {
        let ignored = HashSet::new();
        let base = fingerprint(&[("Server".into(), "nginx".into())], &ignored).unwrap();
        let with_etag = fingerprint(
            &[
                ("Server".into(), "nginx".into()),
                ("ETag".into(), "abc123".into()),
                ("Set-Cookie".into(), "sid=1".into()),
                ("Expires".into(), "0".into()),
                ("Content-Length".into(), "42".into()),
                ("Last-Modified".into(), "yesterday".into()),
                ("Cache-Expires".into(), "0".into()),
                ("Age".into(), "3".into()),
            ],
            &ignored,
        )
        .unwrap();
        assert_eq!(base.digest, with_etag.digest);
        assert_eq!(with_etag.info.cookies, vec!["sid=1".to_string()]);
    }

    #[test]
    fn unrecognized_field_contributes_name_and_value() {
        let ignored = HashSet::new();
        let a = fingerprint(&[("X-Request-Id".into(), "1".into())], &ignored).unwrap();
        let b = fingerprint(&[("X-Request-Id".into(), "2".into())], &ignored).unwrap();
        assert_ne!(a.digest, b.digest);
    }

    #[test]
    fn ignore_set_suppresses_unrecognized_field_contribution() {
        let mut ignored = HashSet::new();
        ignored.insert("xrequestid".to_string());
        let a = fingerprint(&[("X-Request-Id".into(), "1".into())], &ignored).unwrap();
        let b = fingerprint(&[("X-Request-Id".into(), "2".into())], &ignored).unwrap();
        assert_eq!(a.digest, b.digest);
    }

    #[test]
    fn server_and_content_location_contribute_value_only() {
        let ignored = HashSet::new();
        let by_server = fingerprint(&[("Server".into(), "X".into())], &ignored).unwrap();
        let by_location = fingerprint(&[("Content-Location".into(), "X".into())], &ignored).unwrap();
        assert_eq!(by_server.digest, by_location.digest);
    }
}
