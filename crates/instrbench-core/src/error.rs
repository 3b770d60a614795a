//! Shared error type across instrbench crates.

use std::fmt;

use thiserror::Error;

/// Coarse failure class (stable API, used in reports).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid configuration or CLI input.
    Config,
    /// A resource could not be acquired during setup.
    Setup,
    /// A timed or warmup iteration failed.
    Iteration,
    /// A resource could not be released during teardown.
    Teardown,
    /// Anything else.
    Internal,
}

impl ErrorKind {
    /// String representation used in JSON reports.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Config => "CONFIG",
            ErrorKind::Setup => "SETUP",
            ErrorKind::Iteration => "ITERATION",
            ErrorKind::Teardown => "TEARDOWN",
            ErrorKind::Internal => "INTERNAL",
        }
    }
}

/// Which loop an iteration failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Warmup,
    Measured,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Warmup => f.write_str("warmup"),
            Phase::Measured => f.write_str("measured"),
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, BenchError>;

/// Unified error type used by core and harness.
#[derive(Debug, Error)]
pub enum BenchError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("unsupported config version")]
    UnsupportedVersion,
    #[error("setup failed ({resource}): {reason}")]
    Setup { resource: &'static str, reason: String },
    #[error("request failed: {0}")]
    Request(String),
    #[error("response status {0} does not indicate success")]
    Status(u16),
    #[error("{phase} iteration {index} failed: {source}")]
    Iteration {
        phase: Phase,
        index: usize,
        #[source]
        source: Box<BenchError>,
    },
    #[error("release failed ({resource}): {reason}")]
    Release { resource: &'static str, reason: String },
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("internal: {0}")]
    Internal(String),
}

impl BenchError {
    pub fn setup(resource: &'static str, reason: impl fmt::Display) -> Self {
        BenchError::Setup { resource, reason: reason.to_string() }
    }

    pub fn release(resource: &'static str, reason: impl fmt::Display) -> Self {
        BenchError::Release { resource, reason: reason.to_string() }
    }

    /// Map to the stable failure class.
    pub fn kind(&self) -> ErrorKind {
        match self {
            BenchError::Config(_) | BenchError::UnsupportedVersion => ErrorKind::Config,
            BenchError::Setup { .. } => ErrorKind::Setup,
            BenchError::Request(_) | BenchError::Status(_) | BenchError::Iteration { .. } => {
                ErrorKind::Iteration
            }
            BenchError::Release { .. } => ErrorKind::Teardown,
            BenchError::Io(_) | BenchError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// The innermost error, looking through iteration wrappers.
    pub fn root(&self) -> &BenchError {
        match self {
            BenchError::Iteration { source, .. } => source.root(),
            other => other,
        }
    }
}
