//! Coordinator side: run a local scan and fan the same task out to every
//! configured agent concurrently, merging all resulting clues (after
//! clock-skew correction) before handing them to analysis.

use std::net::SocketAddr;

use tokio::net::TcpStream;

use crate::core::clue::Clue;
use crate::core::distributed::wire::{read_frame, write_frame, AgentResponse};
use crate::core::scan::{scan, ScanStats, ScanTask};
use crate::error::{HalberdError, Result};

/// Run `task` locally and against every agent in `task.agents`, merging
/// results. If `task.agents` is empty this is equivalent to a local
/// [`scan`].
pub async fn run_distributed_scan(task: &ScanTask) -> Result<(Vec<Clue>, ScanStats)> {
    let local_task = task.as_local();

    let local_handle = {
        let local_task = local_task.clone();
        tokio::spawn(async move { scan(&local_task).await })
    };

    let agent_handles: Vec<_> = task
        .agents
        .iter()
        .map(|&addr| {
            let agent_task = local_task.clone();
            tokio::spawn(async move { run_one_agent(addr, &agent_task).await })
        })
        .collect();

    let (mut clues, mut stats) = local_handle
        .await
        .map_err(|e| HalberdError::AgentProtocol(format!("local scan task panicked: {e}")))??;

    for handle in agent_handles {
        match handle.await {
            Ok(Ok((agent_clues, agent_stats))) => {
                clues.extend(agent_clues);
                stats.replies += agent_stats.replies;
                stats.missed += agent_stats.missed;
                stats.interrupted |= agent_stats.interrupted;
            }
            Ok(Err(e)) => log::error!("agent scan failed, continuing without it: {e}"),
            Err(e) => log::error!("agent scan task panicked, continuing without it: {e}"),
        }
    }

    Ok((clues, stats))
}

async fn run_one_agent(addr: SocketAddr, task: &ScanTask) -> Result<(Vec<Clue>, ScanStats)> {
    let mut stream = TcpStream::connect(addr).await?;
    write_frame(&mut stream, task).await?;

    let response: AgentResponse = read_frame(&mut stream).await?;
    let coord_recv_utc = chrono::Utc::now().timestamp();
    let skew = response.agent_send_utc - coord_recv_utc;

    let clues: Vec<Clue> = response
        .clues
        .into_iter()
        .map(|mut clue| {
            clue.local -= skew;
            clue.diff = clue.local - clue.remote;
            clue
        })
        .collect();

    let stats = ScanStats {
        replies: response.replies,
        missed: response.missed,
        interrupted: false,
    };
    Ok((clues, stats))
}
