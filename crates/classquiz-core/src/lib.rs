//! classquiz-core — Quiz normalization, assessment sessions, scoring and results.
//!
//! This crate holds the data model, the timed session state machine and its
//! tokio runner, and the aggregation that the rest of classquiz builds on.
//! Persistence lives behind the [`traits::ResultStore`] seam.

pub mod engine;
pub mod error;
pub mod model;
pub mod monitor;
pub mod parser;
pub mod report;
pub mod scoring;
pub mod session;
pub mod statistics;
pub mod traits;
