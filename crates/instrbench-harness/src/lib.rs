//! instrbench harness library entry.
//!
//! Wires the benchmark runner, the local target server, the instrumented
//! HTTP client, and the OpenTelemetry signal providers into the
//! `http-client-request` benchmark. Consumed by the binary (`main.rs`) and by
//! integration tests.

pub mod bench;
pub mod client;
pub mod config;
pub mod report;
pub mod server;
pub mod telemetry;
