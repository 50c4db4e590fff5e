//! sysdash agent: samples host telemetry and the process table on demand
//! and serves them, with a few host-control actions, over HTTP.

pub mod actions;
pub mod api;
pub mod config;
pub mod metrics;
pub mod processes;
pub mod provider;
pub mod state;
pub mod types;
