//! The scan task: run configuration for one scan. Mutable only through
//! explicit setters; shared read-only by workers.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// Run configuration for one scan.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ScanTask {
    pub url: String,
    pub address: IpAddr,
    pub scantime: Duration,
    pub parallelism: usize,
    pub verbose: bool,
    /// Remote agent endpoints to fan out to in distributed mode. Always
    /// empty on the agent side of a request (forced by the server, see
    /// `core::distributed::agent`).
    pub agents: Vec<SocketAddr>,
}

impl ScanTask {
    pub fn new(url: impl Into<String>, address: IpAddr, scantime: Duration, parallelism: usize) -> Self {
        Self {
            url: url.into(),
            address,
            scantime,
            parallelism,
            verbose: false,
            agents: Vec::new(),
        }
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_agents(mut self, agents: Vec<SocketAddr>) -> Self {
        self.agents = agents;
        self
    }

    pub fn is_distributed(&self) -> bool {
        !self.agents.is_empty()
    }

    /// A copy of this task suitable for shipping to an agent: distributed
    /// fan-out is always cleared so the agent never recurses.
    pub fn as_local(&self) -> ScanTask {
        ScanTask {
            agents: Vec::new(),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn as_local_clears_agents() {
        let task = ScanTask::new(
            "http://x/",
            "127.0.0.1".parse().unwrap(),
            Duration::from_secs(1),
            1,
        )
        .with_agents(vec!["127.0.0.1:9000".parse().unwrap()]);
        assert!(task.is_distributed());
        assert!(!task.as_local().is_distributed());
    }
}
