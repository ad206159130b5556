//! cgtop_agent: samples a control-group tree on a fixed tick and streams a
//! navigable, filterable view of it to WebSocket clients.

pub mod action;
pub mod config;
pub mod delta;
pub mod paths;
pub mod sampler;
pub mod scanner;
pub mod server;
pub mod session;
pub mod source;
pub mod state;
pub mod tls;
pub mod types;
pub mod ws;
