//! ticktrader: event-driven market tick pipeline.
//!
//! Each tick flows TICK → FEEDS → IND → CTX → STRAT → ORCH → EXEC → STATE
//! inside a driver that boots, restores state, warms up indicators and loops.
//!
//! Hexagonal architecture: domain logic in [`domain`], port traits in [`ports`],
//! concrete implementations in [`adapters`].

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod cli;
