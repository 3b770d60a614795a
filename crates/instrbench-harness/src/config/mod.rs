//! Benchmark config loader (strict parsing).

pub mod schema;

use std::fs;
use std::path::Path;

use instrbench_core::error::{BenchError, Result};

pub use schema::{BenchConfig, RequestSection, RunSection, ServerSection, TelemetrySection};

pub fn load_from_file(path: impl AsRef<Path>) -> Result<BenchConfig> {
    let path = path.as_ref();
    let s = fs::read_to_string(path)
        .map_err(|e| BenchError::Config(format!("read config failed ({}): {e}", path.display())))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<BenchConfig> {
    let cfg: BenchConfig = serde_yaml::from_str(s)
        .map_err(|e| BenchError::Config(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}
