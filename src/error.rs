//! Error taxonomy shared across the probing, analysis and distributed layers.

use thiserror::Error;

/// Errors the core can raise. Variant names follow the kinds fixed by the
/// probe/scan/analysis contracts rather than any particular I/O source.
#[derive(Debug, Error)]
pub enum HalberdError {
    /// Unsupported scheme, malformed port, or empty host.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Inbound TCP RST or no route to the target. Fatal to the current scan.
    #[error("connection refused: {0}")]
    ConnectionRefused(String),

    /// Socket timeout on connect/send/recv. Recoverable per-probe.
    #[error("timed out: {0}")]
    TimedOut(String),

    /// Bytes were received but they don't form an HTTP response.
    #[error("unknown reply: {0}")]
    UnknownReply(String),

    /// A saved clue file failed validation on load.
    #[error("invalid clue file: {0}")]
    InvalidClueFile(String),

    /// User-initiated cancellation. Not a failure; callers still run
    /// analysis on whatever was collected before this fires.
    #[error("interrupted")]
    Interrupted,

    /// Malformed configuration file content.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Distributed-agent protocol violation (bad framing, decode failure).
    #[error("agent protocol error: {0}")]
    AgentProtocol(String),

    /// A header name normalized to the empty string.
    #[error("invalid header name: {0:?}")]
    InvalidHeaderName(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, HalberdError>;
