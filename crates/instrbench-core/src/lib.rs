//! instrbench core: runtime-free measurement primitives, error types, and the
//! instrumentation configuration enum.
//!
//! This crate defines the data model shared by the harness and its reports:
//! which signals a configuration enables, what one measured iteration looks
//! like, and how a run's samples are aggregated. It carries no runtime, HTTP,
//! or telemetry dependencies so it can be reused by any benchmark.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! All fallible paths surface as `BenchError`/`Result`.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod alloc;
pub mod error;
pub mod instrumentation;
pub mod sample;
pub mod stats;

/// Shared result type.
pub use error::{BenchError, ErrorKind, Phase, Result};
pub use instrumentation::{Instrumentation, Signal};
pub use sample::Sample;
pub use stats::Summary;
