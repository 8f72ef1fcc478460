//! Learning pipeline and confidence scoring.
//!
//! - **Pipeline**: per-action ring buffers of outcomes feeding rolling
//!   success-rate and average-confidence queries
//! - **Scorer**: combines historical success with an optional LLM judgement
//!   into a `[0, 1]` confidence per proposed action

mod pipeline;
mod scorer;

pub use pipeline::{LearningPipeline, Outcome, DEFAULT_WINDOW};
pub use scorer::{ConfidenceJudge, ConfidenceScorer, LlmConfidenceJudge};
