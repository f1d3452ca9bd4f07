//! The primary analysis pipeline: `uniq` -> `filter_proxies` -> `cluster`.
//!
//! Each stage merges clues together; merging always sums `count` and keeps
//! the first (in stage-local sort order) clue's fields as the representative
//! for everything else, since `digest`/`info`/`headers` are definitionally
//! shared within a merge group.

use std::collections::HashMap;

use crate::core::clue::Clue;

#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    /// Maximum gap between consecutive `diff` values still considered the
    /// same upstream cache in `filter_proxies`.
    pub maxdelta: i64,
    /// Maximum `diff` spread within one cluster in the per-digest step.
    pub step: i64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            maxdelta: 3,
            step: 3,
        }
    }
}

/// Run `uniq`, `filter_proxies`, then `cluster per digest` in order.
pub fn primary_pipeline(raw: Vec<Clue>, config: &PipelineConfig) -> Vec<Clue> {
    let clues = uniq(raw);
    let clues = filter_proxies(clues, config.maxdelta);
    cluster_per_digest(clues, config.step)
}

/// Group by `(digest, diff)`, merging each group into one clue.
fn uniq(raw: Vec<Clue>) -> Vec<Clue> {
    let mut groups: HashMap<(String, i64), Clue> = HashMap::new();
    for clue in raw {
        let key = (clue.digest.clone(), clue.diff);
        match groups.get_mut(&key) {
            Some(existing) => existing.merge_count(clue.count),
            None => {
                groups.insert(key, clue);
            }
        }
    }
    groups.into_values().collect()
}

/// Group by `(remote, digest)`; within a group, sort by `diff` and merge
/// contiguous runs whose adjacent `diff`s differ by at most `maxdelta`.
fn filter_proxies(clues: Vec<Clue>, maxdelta: i64) -> Vec<Clue> {
    let mut groups: HashMap<(i64, String), Vec<Clue>> = HashMap::new();
    for clue in clues {
        groups
            .entry((clue.remote, clue.digest.clone()))
            .or_default()
            .push(clue);
    }

    let mut out = Vec::new();
    for (_, mut group) in groups {
        group.sort_by_key(|c| c.diff);
        out.extend(merge_contiguous_runs(group, maxdelta));
    }
    out
}

/// Split a `diff`-sorted list at gaps greater than `maxdelta` and merge each
/// contiguous subrun into one clue.
fn merge_contiguous_runs(sorted: Vec<Clue>, maxdelta: i64) -> Vec<Clue> {
    let mut out = Vec::new();
    let mut iter = sorted.into_iter();
    let Some(first) = iter.next() else {
        return out;
    };

    let mut run = vec![first];
    for clue in iter {
        let gap = clue.diff - run.last().unwrap().diff;
        if gap > maxdelta {
            out.push(merge_run(run));
            run = vec![clue];
        } else {
            run.push(clue);
        }
    }
    out.push(merge_run(run));
    out
}

/// Group by `digest`; within each group, greedily cluster consecutive
/// `diff`-sorted clues into runs of up to `step` members whose `diff` spread
/// is at most `step`, preferring the largest satisfying size at each
/// position.
fn cluster_per_digest(clues: Vec<Clue>, step: i64) -> Vec<Clue> {
    let mut groups: HashMap<String, Vec<Clue>> = HashMap::new();
    for clue in clues {
        groups.entry(clue.digest.clone()).or_default().push(clue);
    }

    let mut out = Vec::new();
    for (_, mut group) in groups {
        group.sort_by_key(|c| c.diff);
        out.extend(greedy_cluster(group, step));
    }
    out
}

fn greedy_cluster(sorted: Vec<Clue>, step: i64) -> Vec<Clue> {
    let cap = step.max(1) as usize;
    let mut out = Vec::new();
    let mut i = 0;
    while i < sorted.len() {
        let mut size = cap.min(sorted.len() - i);
        while size > 1 && sorted[i + size - 1].diff - sorted[i].diff > step {
            size -= 1;
        }
        let run = sorted[i..i + size].to_vec();
        out.push(merge_run(run));
        i += size;
    }
    out
}

fn merge_run(mut run: Vec<Clue>) -> Clue {
    let mut base = run.remove(0);
    for other in run {
        base.merge_count(other.count);
    }
    base
}
