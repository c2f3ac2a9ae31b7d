//! SCOUT: streaming player-market trading agent.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod engine;
pub mod feed;
pub mod llm;
pub mod platforms;
pub mod state;
pub mod strategy;
pub mod types;
