//! Core domain types and the tick pipeline.

pub mod symbol;
pub mod tick;
pub mod market;
pub mod position;
pub mod intent;
pub mod indicator;
pub mod state;
pub mod snapshot;
pub mod metrics;
pub mod context;
pub mod strategy;
pub mod orchestrator;
pub mod execution;
pub mod pipeline;
pub mod driver;
pub mod config;
pub mod config_validation;
pub mod error;
