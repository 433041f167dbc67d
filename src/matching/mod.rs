//! Track matching: similarity scoring, the individual strategies, per-track
//! resolution and batch drivers.

pub mod batch;
pub mod orchestrator;
pub mod similarity;
pub mod strategies;

pub use batch::{BatchMatcher, BatchProgress, DifferentialMatchResult, carried_match};
pub use orchestrator::{MatchingOptions, TrackMatcher};
pub use strategies::SearchMode;
