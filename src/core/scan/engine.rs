//! Drives `task.parallelism` concurrent workers against `(task.address,
//! task.url)` until `task.scantime` elapses or the user interrupts, then
//! freezes the shared clue table and hands the contents back to the caller.
//!
//! Workers loop independently; a fatal probe outcome (connection refused,
//! unknown reply) flips a shared stop flag that every worker and the
//! controller observe at the top of their next iteration. This replaces the
//! install/restore SIGINT handler of the original with `tokio::signal::ctrl_c`
//! raced against the budget deadline -- no handler state to leak or restore.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::core::clue::table::ClueTable;
use crate::core::clue::Clue;
use crate::core::probe::client::{ProbeClient, ProbeOutcome};
use crate::core::scan::status::StatusRenderer;
use crate::core::scan::task::ScanTask;
use crate::error::{HalberdError, Result};

const TICK: Duration = Duration::from_millis(500);

/// Counters collected over the course of a scan, independent of the clues
/// themselves -- useful for the status line and for post-mortem reporting.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScanStats {
    pub replies: u64,
    pub missed: u64,
    pub interrupted: bool,
}

struct Shared {
    table: ClueTable,
    should_stop: AtomicBool,
    replies: AtomicU64,
    missed: AtomicU64,
}

/// Run one scan to completion (budget expiry or interruption) and return the
/// clues collected together with run statistics.
pub async fn scan(task: &ScanTask) -> Result<(Vec<Clue>, ScanStats)> {
    if task.parallelism == 0 {
        return Err(HalberdError::InvalidConfig(
            "parallelism must be at least 1".to_string(),
        ));
    }
    if task.scantime.is_zero() {
        return Err(HalberdError::InvalidConfig(
            "scantime must be positive".to_string(),
        ));
    }

    let shared = Arc::new(Shared {
        table: ClueTable::new(),
        should_stop: AtomicBool::new(false),
        replies: AtomicU64::new(0),
        missed: AtomicU64::new(0),
    });

    let mut workers = Vec::with_capacity(task.parallelism);
    for _ in 0..task.parallelism {
        let shared = Arc::clone(&shared);
        let address = task.address;
        let url = task.url.clone();
        workers.push(tokio::spawn(async move {
            worker_loop(shared, address, url).await;
        }));
    }

    let interrupted = run_controller(&shared, task).await;

    for worker in workers {
        let _ = worker.await;
    }

    let clues = shared.table.drain();
    let stats = ScanStats {
        replies: shared.replies.load(Ordering::Relaxed),
        missed: shared.missed.load(Ordering::Relaxed),
        interrupted,
    };
    Ok((clues, stats))
}

/// One probing worker: fresh connection per attempt, runs until told to stop.
async fn worker_loop(shared: Arc<Shared>, address: std::net::IpAddr, url: String) {
    let client = ProbeClient::new();
    let ignored = HashSet::new();

    while !shared.should_stop.load(Ordering::Relaxed) {
        match client.get_headers(address, &url).await {
            Ok(ProbeOutcome::Reply { timestamp, headers }) => {
                shared.replies.fetch_add(1, Ordering::Relaxed);
                match Clue::parse(timestamp, headers, &ignored) {
                    Ok(clue) => {
                        shared.table.insert(clue);
                    }
                    Err(e) => {
                        log::warn!("dropping unfingerprintable reply: {e}");
                        shared.missed.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
            Ok(ProbeOutcome::Miss) => {
                shared.missed.fetch_add(1, Ordering::Relaxed);
            }
            Err(e @ (HalberdError::ConnectionRefused(_) | HalberdError::UnknownReply(_))) => {
                log::error!("fatal probe error, stopping scan: {e}");
                shared.should_stop.store(true, Ordering::Relaxed);
                break;
            }
            Err(e) => {
                log::warn!("probe error, counted as miss: {e}");
                shared.missed.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

/// Ticks the status line every 500ms, racing the scan budget deadline
/// against a ctrl-c signal. Returns `true` if cancelled by the user.
async fn run_controller(shared: &Shared, task: &ScanTask) -> bool {
    let renderer = StatusRenderer::new();
    let deadline = Instant::now() + task.scantime;
    let address = task.address.to_string();

    loop {
        if shared.should_stop.load(Ordering::Relaxed) {
            return false;
        }

        let now = Instant::now();
        if now >= deadline {
            shared.should_stop.store(true, Ordering::Relaxed);
            return false;
        }
        let remaining = (deadline - now).min(TICK);

        if task.verbose {
            let remaining_secs = (deadline - now).as_secs() as i64;
            let line = renderer.render(
                &address,
                remaining_secs,
                shared.table.len(),
                shared.replies.load(Ordering::Relaxed),
                shared.missed.load(Ordering::Relaxed),
            );
            eprint!("{line}");
        }

        tokio::select! {
            _ = tokio::time::sleep(remaining) => {}
            ctrl_c = tokio::signal::ctrl_c() => {
                if ctrl_c.is_ok() {
                    log::info!("scan interrupted, finishing with clues collected so far");
                    shared.should_stop.store(true, Ordering::Relaxed);
                    return true;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn rejects_zero_parallelism() {
        let task = ScanTask::new(
            "http://x/",
            "127.0.0.1".parse().unwrap(),
            Duration::from_secs(1),
            0,
        );
        assert!(scan(&task).await.is_err());
    }

    #[tokio::test]
    async fn rejects_zero_scantime() {
        let task = ScanTask::new(
            "http://x/",
            "127.0.0.1".parse().unwrap(),
            Duration::from_secs(0),
            1,
        );
        assert!(scan(&task).await.is_err());
    }

    #[tokio::test]
    async fn completes_within_budget_against_a_dead_port() {
        // Port 1 on loopback: connection refused immediately, which is
        // fatal, so the scan should stop almost instantly rather than
        // waiting out the full budget.
        let task = ScanTask::new(
            "http://x/",
            "127.0.0.1".parse().unwrap(),
            Duration::from_secs(5),
            2,
        );
        let (clues, stats) = scan(&task).await.unwrap();
        assert!(clues.is_empty());
        assert_eq!(stats.replies, 0);
    }
}
