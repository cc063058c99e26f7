//! Seekgate - byte-range video server with seek throttling
//!
//! This library crate exposes the core functionality for integration testing.

pub mod auth;
pub mod config;
pub mod rate_limit;
pub mod server;
pub mod streaming;
