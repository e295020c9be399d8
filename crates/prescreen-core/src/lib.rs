//! prescreen-core: Adaptive interview engine, traits, and scoring.
//!
//! This crate defines the data model, the collaborator traits, the scoring
//! policy and the session state machine that the rest of prescreen builds on.

pub mod bank;
pub mod driver;
pub mod engine;
pub mod error;
pub mod model;
pub mod report;
pub mod scoring;
pub mod session;
pub mod timer;
pub mod traits;

#[cfg(test)]
mod testing;
