//! Distributed scanning: one coordinator fans a [`ScanTask`](crate::core::scan::ScanTask)
//! out to a set of agents, each running its own local scan and reporting
//! clues back timestamped against its own clock. The coordinator normalizes
//! every agent's clues to its own wall clock before merging them for
//! analysis.

pub mod agent;
pub mod client;
pub mod wire;

pub use agent::run_agent;
pub use client::run_distributed_scan;
