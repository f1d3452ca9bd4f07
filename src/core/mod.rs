//! Core detection logic: probing, clue fingerprinting, scan orchestration,
//! clue analysis, and distributed fan-out.

pub mod analysis;
pub mod clue;
pub mod distributed;
pub mod probe;
pub mod scan;
