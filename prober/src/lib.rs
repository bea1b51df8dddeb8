//! Probes a click counter endpoint with a steady stream of GET requests and
//! summarises how the counter moved once the run stops.

pub mod analysis;
pub mod client;
pub mod config;
pub mod error;
pub mod probe;
pub mod shutdown;
