//! compass-core: test assembly, scoring engine, and data model.
//!
//! This crate defines the assessment taxonomy, the store traits the engines
//! read and write through, and the two engines everything else builds on:
//! the [`assembler::TestAssembler`] that materializes a shuffled question list
//! from per-cluster quotas, and the [`scoring::ScoringEngine`] that turns raw
//! answers into construct, cluster and overall scores.

pub mod assembler;
pub mod error;
pub mod model;
pub mod parser;
pub mod scoring;
pub mod session;
pub mod store;
pub mod traits;

pub use error::CompassError;
