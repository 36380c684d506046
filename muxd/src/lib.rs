//! muxd library crate.
//!
//! Exposes the demultiplexer and configuration modules for integration
//! tests and embedding; the server binary lives in main.rs.

pub mod config;
pub mod demux;
pub mod telemetry;
