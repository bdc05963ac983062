//! Port traits: the boundaries between the pipeline and the outside world.

pub mod config_port;
pub mod event_sink;
pub mod history_port;
pub mod state_store_port;
pub mod venue_port;
