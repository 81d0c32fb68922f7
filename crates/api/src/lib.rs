//! HTTP surface for wavebatch: batch submission form and endpoint,
//! the WaveSpeed completion webhook, and a liveness probe.

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;
