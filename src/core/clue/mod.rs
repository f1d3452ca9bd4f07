//! The clue data model: one observation of one HTTP reply from the target.

pub mod file;
pub mod fingerprint;
pub mod table;

use std::collections::HashSet;

use fingerprint::ClueInfo;

use crate::error::Result;

/// An ordered (name, value) header pair, preserving arrival order.
pub type HeaderField = (String, String);

/// One observation of one HTTP reply from the target.
///
/// Immutable after [`Clue::parse`] except for `count`, which only
/// increases via [`Clue::merge`], and except for the deliberate reparse
/// that reanalysis performs with an extended ignore set.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Clue {
    /// How many probe replies this clue represents after consolidation.
    pub count: u32,
    /// Wall-clock on the scanner, UTC seconds, at first-byte arrival.
    pub local: i64,
    /// `Date:` header of the reply, UTC seconds (0 if absent/unparsable).
    pub remote: i64,
    /// `trunc(local) - trunc(remote)`.
    pub diff: i64,
    /// Hex fingerprint of the canonicalized header subset.
    pub digest: String,
    /// Copies of recognized headers, for reporting.
    pub info: ClueInfo,
    /// Full ordered header list as received.
    pub headers: Vec<HeaderField>,
}

impl Clue {
    /// Build a clue from a probe reply.
    ///
    /// `local` is the UTC second at which the reply's first byte arrived.
    /// `ignored` is the reanalysis ignore-set (empty for a first pass).
    pub fn parse(local: i64, headers: Vec<HeaderField>, ignored: &HashSet<String>) -> Result<Clue> {
        let outcome = fingerprint::fingerprint(&headers, ignored)?;
        let remote = outcome.remote.map(|dt| dt.timestamp()).unwrap_or(0);

        Ok(Clue {
            count: 1,
            local,
            remote,
            diff: local - remote,
            digest: outcome.digest,
            info: outcome.info,
            headers,
        })
    }

    /// Two clues denote the same inferred back-end iff their `diff` and
    /// `digest` match. Identity and header contents are irrelevant.
    pub fn same_backend(&self, other: &Clue) -> bool {
        self.diff == other.diff && self.digest == other.digest
    }

    /// Increase `count` by a positive amount, absorbing `other`'s count.
    pub fn merge_count(&mut self, extra: u32) {
        self.count += extra;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> Vec<HeaderField> {
        pairs
            .iter()
            .map(|(n, v)| (n.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn diff_is_local_minus_remote_in_utc() {
        let ignored = HashSet::new();
        // 2004-02-24T17:09:05Z == 1077642545
        let clue = Clue::parse(
            1077642545 + 5,
            headers(&[("Date", "Tue, 24 Feb 2004 17:09:05 GMT")]),
            &ignored,
        )
        .unwrap();
        assert_eq!(clue.remote, 1077642545);
        assert_eq!(clue.diff, 5);
    }

    #[test]
    fn missing_date_defaults_remote_to_zero() {
        let ignored = HashSet::new();
        let clue = Clue::parse(100, headers(&[("Server", "nginx")]), &ignored).unwrap();
        assert_eq!(clue.remote, 0);
        assert_eq!(clue.diff, 100);
    }

    #[test]
    fn same_backend_ignores_count_and_headers() {
        let ignored = HashSet::new();
        let a = Clue::parse(10, headers(&[("Server", "nginx")]), &ignored).unwrap();
        let mut b = Clue::parse(20, headers(&[("Server", "nginx")]), &ignored).unwrap();
        b.local = 10; // force identical diff (both remote=0)
        b.diff = b.local - b.remote;
        assert!(a.same_backend(&b));
    }
}
