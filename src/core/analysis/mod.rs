//! Clue analysis: reduces a raw clue multiset into one clue per inferred
//! back-end server, with an auto-correction pass for volatile headers.

pub mod pipeline;
pub mod reanalysis;

pub use pipeline::{primary_pipeline, PipelineConfig};
pub use reanalysis::{reanalyze, ReanalysisConfig, ReanalysisOutcome};
