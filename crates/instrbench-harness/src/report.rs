//! Result reporting: a markdown-style table for stdout and a JSON file.

use std::fs;
use std::path::Path;

use comfy_table::presets::ASCII_MARKDOWN;
use comfy_table::{CellAlignment, Table};
use serde::Serialize;

use instrbench_core::error::{BenchError, Result};
use instrbench_core::Summary;

use crate::bench::RunOutcome;

#[derive(Debug, Serialize)]
pub struct RunReport {
    pub method: String,
    pub results: Vec<ReportEntry>,
}

#[derive(Debug, Serialize)]
pub struct ReportEntry {
    pub configuration: String,
    #[serde(flatten)]
    pub outcome: EntryOutcome,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EntryOutcome {
    Ok { summary: Summary },
    Failed { kind: String, error: String },
}

impl RunReport {
    pub fn from_outcomes<C: std::fmt::Display>(method: &str, outcomes: &[RunOutcome<C>]) -> Self {
        let results = outcomes
            .iter()
            .map(|o| ReportEntry {
                configuration: o.configuration.to_string(),
                outcome: match &o.result {
                    Ok(summary) => EntryOutcome::Ok {
                        summary: summary.clone(),
                    },
                    Err(e) => EntryOutcome::Failed {
                        kind: e.kind().as_str().to_string(),
                        error: e.to_string(),
                    },
                },
            })
            .collect();
        Self {
            method: method.to_string(),
            results,
        }
    }

    pub fn failed(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, EntryOutcome::Failed { .. }))
            .count()
    }

    pub fn render_table(&self) -> String {
        let mut table = Table::new();
        table.load_preset(ASCII_MARKDOWN);
        table.set_header(vec![
            "Method",
            "Instrumentation",
            "Mean",
            "Error",
            "StdDev",
            "P99",
            "Allocated",
        ]);

        for entry in &self.results {
            match &entry.outcome {
                EntryOutcome::Ok { summary } => table.add_row(vec![
                    self.method.clone(),
                    entry.configuration.clone(),
                    format_nanos(summary.mean_ns),
                    format_nanos(summary.error_ns),
                    format_nanos(summary.stddev_ns),
                    format_nanos(summary.p99_ns as f64),
                    format_bytes(summary.allocated_bytes),
                ]),
                EntryOutcome::Failed { kind, .. } => table.add_row(vec![
                    self.method.clone(),
                    entry.configuration.clone(),
                    format!("FAILED ({kind})"),
                    "-".to_string(),
                    "-".to_string(),
                    "-".to_string(),
                    "-".to_string(),
                ]),
            };
        }

        for i in 1..7 {
            if let Some(col) = table.column_mut(i) {
                col.set_cell_alignment(CellAlignment::Right);
            }
        }

        table.to_string()
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let body = serde_json::to_string_pretty(self)
            .map_err(|e| BenchError::Internal(format!("encode report: {e}")))?;
        fs::write(path, body)?;
        Ok(())
    }
}

/// Human duration with four significant digits: `222.7 us`, `1.234 ms`.
pub fn format_nanos(ns: f64) -> String {
    if !ns.is_finite() {
        return "-".to_string();
    }
    let (value, unit) = if ns >= 1e9 {
        (ns / 1e9, "s")
    } else if ns >= 1e6 {
        (ns / 1e6, "ms")
    } else if ns >= 1e3 {
        (ns / 1e3, "us")
    } else {
        (ns, "ns")
    };
    format!("{} {unit}", sig4(value))
}

/// Bytes per operation: `512 B`, `2.45 KB`. `-` when not measured.
pub fn format_bytes(bytes: Option<f64>) -> String {
    match bytes {
        None => "-".to_string(),
        Some(b) if b < 1024.0 => format!("{b:.0} B"),
        Some(b) if b < 1024.0 * 1024.0 => format!("{:.2} KB", b / 1024.0),
        Some(b) => format!("{:.2} MB", b / (1024.0 * 1024.0)),
    }
}

fn sig4(v: f64) -> String {
    if v >= 100.0 {
        format!("{v:.1}")
    } else if v >= 10.0 {
        format!("{v:.2}")
    } else {
        format!("{v:.3}")
    }
}
