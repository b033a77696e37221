//! Live-latency sync server library
//!
//! Router and configuration are exposed here so integration tests can
//! drive the service without binding a socket.

pub mod config;
pub mod routes;
