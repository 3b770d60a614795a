//! Benchmark parameter: which instrumentation signals are enabled.
//!
//! Every combination of the two signals is a legal configuration, so the
//! enum lists all four explicitly instead of carrying a bit set.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::BenchError;

/// One telemetry signal a provider can instrument HTTP client calls for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    Traces,
    Metrics,
}

impl Signal {
    pub fn as_str(self) -> &'static str {
        match self {
            Signal::Traces => "traces",
            Signal::Metrics => "metrics",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Instrumentation configuration of one benchmark run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Instrumentation {
    None,
    Traces,
    Metrics,
    TracesAndMetrics,
}

impl Instrumentation {
    /// Declaration order used when no explicit set is given.
    pub const ALL: [Instrumentation; 4] = [
        Instrumentation::None,
        Instrumentation::Traces,
        Instrumentation::Metrics,
        Instrumentation::TracesAndMetrics,
    ];

    /// Signals enabled by this configuration, in acquisition order.
    pub fn signals(self) -> &'static [Signal] {
        match self {
            Instrumentation::None => &[],
            Instrumentation::Traces => &[Signal::Traces],
            Instrumentation::Metrics => &[Signal::Metrics],
            Instrumentation::TracesAndMetrics => &[Signal::Traces, Signal::Metrics],
        }
    }

    pub fn has(self, signal: Signal) -> bool {
        self.signals().contains(&signal)
    }

    /// Canonical key accepted by the config loader and the CLI.
    pub fn key(self) -> &'static str {
        match self {
            Instrumentation::None => "none",
            Instrumentation::Traces => "traces",
            Instrumentation::Metrics => "metrics",
            Instrumentation::TracesAndMetrics => "traces+metrics",
        }
    }
}

impl fmt::Display for Instrumentation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Instrumentation::None => "None",
            Instrumentation::Traces => "Traces",
            Instrumentation::Metrics => "Metrics",
            Instrumentation::TracesAndMetrics => "Traces, Metrics",
        };
        f.write_str(label)
    }
}

impl FromStr for Instrumentation {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Instrumentation::None),
            "traces" => Ok(Instrumentation::Traces),
            "metrics" => Ok(Instrumentation::Metrics),
            "traces+metrics" | "traces_and_metrics" | "all" => Ok(Instrumentation::TracesAndMetrics),
            other => Err(BenchError::Config(format!(
                "unknown instrumentation: '{other}' (use none, traces, metrics, traces+metrics)"
            ))),
        }
    }
}

impl TryFrom<String> for Instrumentation {
    type Error = BenchError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Instrumentation> for String {
    fn from(i: Instrumentation) -> Self {
        i.key().to_string()
    }
}
