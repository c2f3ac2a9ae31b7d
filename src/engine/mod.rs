//! Core engine: trigger evaluation, the analysis pipeline, order
//! submission, and feed supervision.

pub mod executor;
pub mod orchestrator;
pub mod pipeline;
pub mod trigger;
