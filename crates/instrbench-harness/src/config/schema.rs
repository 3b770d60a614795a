use std::collections::HashSet;
use std::net::SocketAddr;
use std::time::Duration;

use serde::Deserialize;
use instrbench_core::error::{BenchError, Result};
use instrbench_core::Instrumentation;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BenchConfig {
    pub version: u32,

    #[serde(default)]
    pub run: RunSection,

    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub request: RequestSection,

    #[serde(default)]
    pub telemetry: TelemetrySection,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            version: 1,
            run: RunSection::default(),
            server: ServerSection::default(),
            request: RequestSection::default(),
            telemetry: TelemetrySection::default(),
        }
    }
}

impl BenchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(BenchError::UnsupportedVersion);
        }

        self.run.validate()?;
        self.server.validate()?;
        self.request.validate()?;
        self.telemetry.validate()?;

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunSection {
    #[serde(default = "default_iterations")]
    pub iterations: usize,

    #[serde(default = "default_warmup")]
    pub warmup: usize,

    /// Run order; duplicates are rejected.
    #[serde(default = "default_instrumentation")]
    pub instrumentation: Vec<Instrumentation>,
}

impl Default for RunSection {
    fn default() -> Self {
        Self {
            iterations: default_iterations(),
            warmup: default_warmup(),
            instrumentation: default_instrumentation(),
        }
    }
}

impl RunSection {
    pub fn validate(&self) -> Result<()> {
        if !(1..=1_000_000).contains(&self.iterations) {
            return Err(BenchError::Config(
                "run.iterations must be between 1 and 1000000".into(),
            ));
        }
        if self.warmup > 100_000 {
            return Err(BenchError::Config("run.warmup must be at most 100000".into()));
        }
        if self.instrumentation.is_empty() {
            return Err(BenchError::Config("run.instrumentation must not be empty".into()));
        }
        let mut seen = HashSet::new();
        for i in &self.instrumentation {
            if !seen.insert(*i) {
                return Err(BenchError::Config(format!(
                    "run.instrumentation lists '{}' twice",
                    i.key()
                )));
            }
        }
        Ok(())
    }
}

fn default_iterations() -> usize {
    100
}
fn default_warmup() -> usize {
    10
}
fn default_instrumentation() -> Vec<Instrumentation> {
    Instrumentation::ALL.to_vec()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default = "default_listen")]
    pub listen: String,

    #[serde(default = "default_body")]
    pub body: String,

    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            body: default_body(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
        }
    }
}

impl ServerSection {
    pub fn validate(&self) -> Result<()> {
        self.listen_addr()?;
        if !(100..=60_000).contains(&self.shutdown_timeout_ms) {
            return Err(BenchError::Config(
                "server.shutdown_timeout_ms must be between 100 and 60000".into(),
            ));
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.listen.parse().map_err(|_| {
            BenchError::Config(format!(
                "server.listen must be a valid SocketAddr (got '{}')",
                self.listen
            ))
        })
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

fn default_listen() -> String {
    "127.0.0.1:0".into()
}
fn default_body() -> String {
    "Hello World!".into()
}
fn default_shutdown_timeout_ms() -> u64 {
    5000
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequestSection {
    #[serde(default = "default_path")]
    pub path: String,
}

impl Default for RequestSection {
    fn default() -> Self {
        Self { path: default_path() }
    }
}

impl RequestSection {
    pub fn validate(&self) -> Result<()> {
        if !self.path.starts_with('/') {
            return Err(BenchError::Config("request.path must start with '/'".into()));
        }
        Ok(())
    }
}

fn default_path() -> String {
    "/".into()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TelemetrySection {
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl Default for TelemetrySection {
    fn default() -> Self {
        Self { service_name: default_service_name() }
    }
}

impl TelemetrySection {
    pub fn validate(&self) -> Result<()> {
        if self.service_name.trim().is_empty() {
            return Err(BenchError::Config("telemetry.service_name must not be empty".into()));
        }
        Ok(())
    }
}

fn default_service_name() -> String {
    "instrbench".into()
}
