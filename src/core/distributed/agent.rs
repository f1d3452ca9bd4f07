//! Agent side: accept one connection at a time, run the requested scan
//! locally, and report clues back timestamped against this agent's clock.
//!
//! A threaded accept-and-fan-out server would race the ctrl-c cancellation
//! the scan engine installs per run, so -- matching the original's choice of
//! a non-threading server -- connections are served strictly sequentially.

use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpStream};

use crate::core::distributed::wire::{read_frame, write_frame, AgentRequest, AgentResponse};
use crate::core::scan::scan;
use crate::error::Result;

/// Serve agent requests on `addr` until the process is interrupted. Runs
/// forever; the caller is expected to race this against its own shutdown
/// signal if it needs one.
pub async fn run_agent(addr: SocketAddr, verbose: bool) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    log::info!("agent listening on {addr}");

    loop {
        let (stream, peer) = listener.accept().await?;
        log::info!("agent: connection from {peer}");
        if let Err(e) = serve_one(stream, verbose).await {
            log::error!("agent: request from {peer} failed: {e}");
        }
    }
}

async fn serve_one(mut stream: TcpStream, verbose: bool) -> Result<()> {
    let mut task: AgentRequest = read_frame(&mut stream).await?;
    // Never trust a peer's fan-out list or distributed flag: this agent
    // always runs locally regardless of what it was asked to run.
    task = task.as_local().with_verbose(verbose);

    log::info!("agent: scanning {} for {:?}", task.address, task.scantime);
    let (clues, stats) = scan(&task).await?;
    log::info!(
        "agent: scan done, {} clues from {} replies ({} missed)",
        clues.len(),
        stats.replies,
        stats.missed
    );

    let response = AgentResponse {
        agent_send_utc: chrono::Utc::now().timestamp(),
        clues,
        replies: stats.replies,
        missed: stats.missed,
    };
    write_frame(&mut stream, &response).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::distributed::wire::{read_frame, write_frame};
    use crate::core::scan::ScanTask;
    use std::time::Duration;

    #[tokio::test]
    async fn serves_one_request_and_reports_its_own_timestamp() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            serve_one(stream, false).await.unwrap();
        });

        let mut client = TcpStream::connect(addr).await.unwrap();
        let task = ScanTask::new("http://x/", "127.0.0.1".parse().unwrap(), Duration::from_secs(1), 1);
        write_frame(&mut client, &task).await.unwrap();
        let response: AgentResponse = read_frame(&mut client).await.unwrap();
        assert!(response.agent_send_utc > 0);

        server.await.unwrap();
    }
}
