//! # Device Waiting Room Server
//!
//! HTTP and websocket front end of the waiting room: configuration loading,
//! logging, the axum router and the `--migrate` administrative command. The
//! registry itself lives in `waitroom_core`.

pub mod api;
pub mod app;
pub mod config;
pub mod logger;
pub mod migrate;
