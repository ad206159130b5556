//! Library side of the cgtop client: wire types and WebSocket helpers.

pub mod types;
pub mod ws;
