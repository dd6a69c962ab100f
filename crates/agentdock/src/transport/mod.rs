//! Transport layer for agentdock.
//!
//! Currently provides the HTTP front-end via axum.

pub mod http;

pub use http::{serve, serve_listener};
