//! HTTP and WebSocket surface for printdrop.

pub mod api;
pub mod metrics;
pub mod state;
