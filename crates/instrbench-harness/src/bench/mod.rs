//! Benchmark harness.
//!
//! A `Benchmark` describes one parameterized measurement: how to build the
//! per-configuration context, the single operation under measurement, and how
//! to release the context. The `Runner` drives it for every registered
//! configuration, strictly one at a time.

pub mod http_client;
pub mod runner;

use std::fmt::Display;

use async_trait::async_trait;

use instrbench_core::error::{BenchError, Result};

pub use http_client::{HttpClientBenchmark, RunContext};
pub use runner::{RunOutcome, Runner};

#[async_trait]
pub trait Benchmark: Send + Sync {
    /// Parameter value selecting one configuration.
    type Config: Clone + PartialEq + Display + Send + Sync;
    /// Resources owned by one configuration's run.
    type Context: Send;

    fn name(&self) -> &'static str;

    /// Acquire every resource. On error, anything already acquired has been
    /// released before returning.
    async fn setup(&self, config: &Self::Config) -> Result<Self::Context>;

    /// Exactly the work under measurement.
    async fn timed_operation(&self, ctx: &mut Self::Context) -> Result<()>;

    /// Release in reverse acquisition order, continuing past failures.
    /// Returns the failures that occurred.
    async fn teardown(&self, ctx: Self::Context) -> Vec<BenchError>;
}

/// Names accepted by `--bench`.
pub const BENCHMARKS: &[&str] = &[http_client::NAME];
