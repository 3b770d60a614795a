#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::time::Duration;

use instrbench_core::error::BenchError;
use instrbench_core::{Instrumentation, Sample, Summary};
use instrbench_harness::bench::RunOutcome;
use instrbench_harness::report::{format_bytes, format_nanos, RunReport};

fn outcomes() -> Vec<RunOutcome<Instrumentation>> {
    let samples: Vec<Sample> = [220_000u64, 225_000, 223_000]
        .iter()
        .map(|&n| Sample::new(Duration::from_nanos(n), Some(2_509)))
        .collect();
    vec![
        RunOutcome {
            configuration: Instrumentation::None,
            result: Ok(Summary::from_samples("None", &samples, 0)),
        },
        RunOutcome {
            configuration: Instrumentation::Traces,
            result: Err(BenchError::Iteration {
                phase: instrbench_core::Phase::Measured,
                index: 0,
                source: Box::new(BenchError::Status(500)),
            }),
        },
    ]
}

#[test]
fn duration_and_byte_formatting() {
    assert_eq!(format_nanos(850.0), "850.0 ns");
    assert_eq!(format_nanos(222_700.0), "222.7 us");
    assert_eq!(format_nanos(1_234_000.0), "1.234 ms");
    assert_eq!(format_nanos(15_500_000_000.0), "15.50 s");
    assert_eq!(format_nanos(f64::NAN), "-");

    assert_eq!(format_bytes(None), "-");
    assert_eq!(format_bytes(Some(512.0)), "512 B");
    assert_eq!(format_bytes(Some(2_509.0)), "2.45 KB");
}

#[test]
fn table_lists_every_configuration() {
    let report = RunReport::from_outcomes("HttpClientRequest", &outcomes());
    assert_eq!(report.failed(), 1);

    let table = report.render_table();
    assert!(table.contains("Instrumentation"));
    assert!(table.contains("HttpClientRequest"));
    assert!(table.contains("222.7 us"), "{table}");
    assert!(table.contains("2.45 KB"), "{table}");
    // p99 of 220/223/225 us, within histogram precision
    assert!(table.contains("225.0 us"), "{table}");
    assert!(table.contains("FAILED (ITERATION)"), "{table}");
}

#[test]
fn json_report_written_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("report.json");

    RunReport::from_outcomes("HttpClientRequest", &outcomes())
        .write_json(&path)
        .unwrap();

    let v: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(v["method"], "HttpClientRequest");
    assert_eq!(v["results"][0]["configuration"], "None");
    assert_eq!(v["results"][0]["status"], "ok");
    assert_eq!(v["results"][0]["summary"]["count"], 3);
    let p99 = v["results"][0]["summary"]["p99_ns"].as_u64().unwrap();
    assert!((225_000..=225_250).contains(&p99), "p99 {p99}");
    assert_eq!(v["results"][1]["configuration"], "Traces");
    assert_eq!(v["results"][1]["status"], "failed");
    assert_eq!(v["results"][1]["kind"], "ITERATION");
}
