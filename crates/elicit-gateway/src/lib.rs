//! Elicit Gateway - HTTP binding for the turn-processing API

pub mod server;

pub use server::{build_router, start_gateway, AppState};
