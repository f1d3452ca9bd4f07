use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "halberd")]
#[command(version = concat!("Ver:", env!("CARGO_PKG_VERSION")))]
#[command(about = "HTTP load balancer detector")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scan one target and report its inferred back-end count.
    Scan(ScanArgs),
    /// Listen for and serve scan requests from a coordinator.
    Agent(AgentArgs),
    /// Reload a saved clue file and re-run analysis.
    Cluereader(CluereaderArgs),
}

#[derive(Parser, Debug)]
pub struct ScanArgs {
    /// Target URL, e.g. http://example.com/
    pub url: Option<String>,

    /// File of newline-separated target URLs to scan sequentially.
    #[arg(long = "targets")]
    pub targets: Option<PathBuf>,

    /// How long to probe the target, in seconds.
    #[arg(long = "scantime", default_value_t = 45)]
    pub scantime: u64,

    /// Number of concurrent probing workers.
    #[arg(long = "parallel", default_value_t = 4)]
    pub parallel: usize,

    /// Write the inferred server report here instead of stdout.
    #[arg(long = "output")]
    pub output: Option<PathBuf>,

    /// Save the raw clue multiset here for later `cluereader` use.
    #[arg(long = "save")]
    pub save: Option<PathBuf>,

    /// Sectioned config file (see `src/config`).
    #[arg(long = "config")]
    pub config: Option<PathBuf>,

    /// Remote agent(s) to fan out to, `host:port`. Repeatable.
    #[arg(long = "agent")]
    pub agents: Vec<SocketAddr>,

    /// Print live scan status to stderr.
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

#[derive(Parser, Debug)]
pub struct AgentArgs {
    /// Address to bind the agent listener to.
    #[arg(long = "address", default_value = "0.0.0.0")]
    pub address: std::net::IpAddr,

    /// Port to bind the agent listener to.
    #[arg(long = "port", default_value_t = 2323)]
    pub port: u16,

    /// Sectioned config file (see `src/config`).
    #[arg(long = "config")]
    pub config: Option<PathBuf>,

    /// Print per-probe status to stderr.
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

impl AgentArgs {
    /// Mirrors the `#[arg(default_value = ...)]` above, so a loaded config's
    /// `[rpcserver]` section can tell "left at default" from "set on the
    /// command line" without duplicating the literal in two places.
    pub fn default_address() -> std::net::IpAddr {
        std::net::IpAddr::from([0, 0, 0, 0])
    }

    pub fn default_port() -> u16 {
        2323
    }
}

#[derive(Parser, Debug)]
pub struct CluereaderArgs {
    /// Saved clue file to reload.
    pub file: PathBuf,
}
