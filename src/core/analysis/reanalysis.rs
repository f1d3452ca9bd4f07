//! Auto-correction for volatile per-request headers that would otherwise
//! poison every clue's digest (request-id cookies, per-response ETags).
//!
//! Detection compares every ordered pair of raw clues' header lists via an
//! LCS-based alignment; any header whose name surfaces on the unmatched side
//! of an alignment, and has no dedicated fingerprinter handler, becomes a
//! candidate to ignore. If enough candidates exist to explain the spread of
//! "servers" the primary pipeline found, every raw clue is reparsed with
//! those names added to the digest's ignore set and the pipeline reruns.

use std::collections::HashSet;

use crate::core::clue::fingerprint::{self, ALWAYS_DROPPED, RECOGNIZED};
use crate::core::clue::Clue;

use super::pipeline::{primary_pipeline, PipelineConfig};

#[derive(Debug, Clone, Copy)]
pub struct ReanalysisConfig {
    /// Ratio of `primary pipeline result / raw clues` at or above which
    /// reanalysis is attempted.
    pub threshold: f64,
}

impl Default for ReanalysisConfig {
    fn default() -> Self {
        Self { threshold: 0.6 }
    }
}

#[derive(Debug)]
pub struct ReanalysisOutcome {
    pub result: Vec<Clue>,
    /// Normalized header names that were ignored to produce `result`. Empty
    /// if reanalysis never triggered.
    pub ignored_fields: Vec<String>,
}

/// Run the primary pipeline once; if the result looks poisoned by volatile
/// headers, reparse with those headers ignored and rerun.
pub fn reanalyze(
    raw: &[Clue],
    pipeline_config: &PipelineConfig,
    reanalysis_config: &ReanalysisConfig,
) -> ReanalysisOutcome {
    let primary = primary_pipeline(raw.to_vec(), pipeline_config);

    if raw.is_empty() {
        return ReanalysisOutcome {
            result: primary,
            ignored_fields: Vec::new(),
        };
    }

    let ratio = primary.len() as f64 / raw.len() as f64;
    if ratio < reanalysis_config.threshold {
        return ReanalysisOutcome {
            result: primary,
            ignored_fields: Vec::new(),
        };
    }

    let ignored = candidate_ignore_set(raw);
    if ignored.is_empty() {
        return ReanalysisOutcome {
            result: primary,
            ignored_fields: Vec::new(),
        };
    }

    let reparsed: Vec<Clue> = raw
        .iter()
        .filter_map(|clue| {
            match Clue::parse(clue.local, clue.headers.clone(), &ignored) {
                Ok(mut reparsed) => {
                    reparsed.count = clue.count;
                    Some(reparsed)
                }
                Err(e) => {
                    log::warn!("reanalysis reparse failed, dropping clue: {e}");
                    None
                }
            }
        })
        .collect();

    let result = primary_pipeline(reparsed, pipeline_config);
    let mut ignored_fields: Vec<String> = ignored.into_iter().collect();
    ignored_fields.sort();

    ReanalysisOutcome {
        result,
        ignored_fields,
    }
}

/// Collect normalized header names worth ignoring: names that appear in a
/// non-equal region of some pairwise diff, excluding names with a dedicated
/// fingerprinter handler (they can never be ignored) or that already never
/// contribute to the digest.
fn candidate_ignore_set(raw: &[Clue]) -> HashSet<String> {
    let mut candidates = HashSet::new();

    for i in 0..raw.len() {
        for j in 0..raw.len() {
            if i == j {
                continue;
            }
            for name in diff_fields(&raw[i].headers, &raw[j].headers) {
                candidates.insert(name);
            }
        }
    }

    candidates
        .into_iter()
        .filter_map(|name| fingerprint::normalize(&name).ok())
        .filter(|normalized| !RECOGNIZED.contains(&normalized.as_str()))
        .filter(|normalized| !ALWAYS_DROPPED.contains(&normalized.as_str()))
        .collect()
}

/// Names of headers that fall outside the longest common subsequence shared
/// by `a` and `b`, i.e. the ones an edit-opcode diff would mark as changed.
fn diff_fields(a: &[(String, String)], b: &[(String, String)]) -> HashSet<String> {
    let matched_a = lcs_matched_indices(a, b);
    let mut names = HashSet::new();

    for (idx, (name, _)) in a.iter().enumerate() {
        if !matched_a.0.contains(&idx) {
            names.insert(name.clone());
        }
    }
    for (idx, (name, _)) in b.iter().enumerate() {
        if !matched_a.1.contains(&idx) {
            names.insert(name.clone());
        }
    }

    names
}

/// Standard O(n*m) LCS table with backtrace, returning the indices into `a`
/// and `b` that participate in a longest common subsequence of equal
/// `(name, value)` pairs.
fn lcs_matched_indices(
    a: &[(String, String)],
    b: &[(String, String)],
) -> (HashSet<usize>, HashSet<usize>) {
    let (n, m) = (a.len(), b.len());
    let mut dp = vec![vec![0usize; m + 1]; n + 1];

    for i in (0..n).rev() {
        for j in (0..m).rev() {
            dp[i][j] = if a[i] == b[j] {
                dp[i + 1][j + 1] + 1
            } else {
                dp[i + 1][j].max(dp[i][j + 1])
            };
        }
    }

    let mut matched_a = HashSet::new();
    let mut matched_b = HashSet::new();
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if a[i] == b[j] {
            matched_a.insert(i);
            matched_b.insert(j);
            i += 1;
            j += 1;
        } else if dp[i + 1][j] >= dp[i][j + 1] {
            i += 1;
        } else {
            j += 1;
        }
    }

    (matched_a, matched_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clue_with_headers(local: i64, headers: &[(&str, &str)]) -> Clue {
        let headers: Vec<(String, String)> = headers
            .iter()
            .map(|(n, v)| (n.to_string(), v.to_string()))
            .collect();
        Clue::parse(local, headers, &HashSet::new()).unwrap()
    }

    #[test]
    fn diff_fields_ignores_identical_headers() {
        let a = [("Server".to_string(), "nginx".to_string())];
        let b = [("Server".to_string(), "nginx".to_string())];
        assert!(diff_fields(&a, &b).is_empty());
    }

    #[test]
    fn diff_fields_flags_changed_value() {
        let a = [("X-Request-Id".to_string(), "1".to_string())];
        let b = [("X-Request-Id".to_string(), "2".to_string())];
        let diff = diff_fields(&a, &b);
        assert_eq!(diff, HashSet::from(["X-Request-Id".to_string()]));
    }

    #[test]
    fn stable_volatile_etag_does_not_trigger_because_already_dropped() {
        let raw: Vec<Clue> = (0..5)
            .map(|i| {
                clue_with_headers(
                    100 + i,
                    &[("Server", "nginx"), ("ETag", &format!("\"{i}\""))],
                )
            })
            .collect();
        let outcome = reanalyze(&raw, &PipelineConfig::default(), &ReanalysisConfig::default());
        assert!(outcome.ignored_fields.is_empty());
        assert_eq!(outcome.result.len(), 1);
    }

    #[test]
    fn volatile_unrecognized_header_triggers_and_is_ignored() {
        let raw: Vec<Clue> = (0..5)
            .map(|i| {
                clue_with_headers(
                    100 + i,
                    &[("Server", "nginx"), ("X-Request-Id", &i.to_string())],
                )
            })
            .collect();
        let outcome = reanalyze(&raw, &PipelineConfig::default(), &ReanalysisConfig::default());
        assert_eq!(outcome.ignored_fields, vec!["xrequestid".to_string()]);
        assert_eq!(outcome.result.len(), 1);
        assert_eq!(outcome.result[0].count, 5);
    }
}
