//! Concrete adapter implementations for ports.

pub mod csv_history_adapter;
pub mod file_config_adapter;
pub mod in_memory_state_store;
pub mod json_state_store;
pub mod memory_event_sink;
pub mod simulated_venue;
#[cfg(feature = "sqlite")]
pub mod sqlite_state_store;
pub mod tracing_event_sink;
