//! instrbench - latency and allocation overhead of HTTP client instrumentation.
//!
//! Runs `http-client-request` once per instrumentation configuration:
//! none, traces, metrics, traces+metrics.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use instrbench_core::alloc::CountingAllocator;
use instrbench_core::error::{BenchError, Result};
use instrbench_core::Instrumentation;
use instrbench_harness::bench::{self, HttpClientBenchmark, Runner};
use instrbench_harness::config::{self, BenchConfig};
use instrbench_harness::report::RunReport;

#[global_allocator]
static ALLOC: CountingAllocator = CountingAllocator::system();

#[derive(Parser)]
#[command(name = "instrbench")]
#[command(about = "Measure the overhead of tracing/metrics instrumentation on HTTP client calls")]
#[command(version)]
struct Cli {
    /// Benchmark to run
    #[arg(short = 'b', long, default_value = bench::http_client::NAME)]
    bench: String,

    /// YAML config file (defaults are used if omitted)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Measured iterations per configuration
    #[arg(short = 'n', long)]
    iterations: Option<usize>,

    /// Untimed warmup iterations per configuration
    #[arg(short = 'w', long)]
    warmup: Option<usize>,

    /// Configuration to run (repeatable): none, traces, metrics, traces+metrics
    #[arg(short = 'c', long = "instrumentation")]
    instrumentation: Vec<Instrumentation>,

    /// Also write a JSON report to this file
    #[arg(short = 'j', long)]
    json_report: Option<PathBuf>,

    /// List available benchmarks and exit
    #[arg(long)]
    list: bool,
}

fn load_config(cli: &Cli) -> Result<BenchConfig> {
    let mut cfg = match &cli.config {
        Some(path) => config::load_from_file(path)?,
        None => BenchConfig::default(),
    };
    if let Some(n) = cli.iterations {
        cfg.run.iterations = n;
    }
    if let Some(w) = cli.warmup {
        cfg.run.warmup = w;
    }
    if !cli.instrumentation.is_empty() {
        cfg.run.instrumentation = cli.instrumentation.clone();
    }
    cfg.validate()?;
    Ok(cfg)
}

async fn run(cli: Cli) -> Result<RunReport> {
    if cli.bench != bench::http_client::NAME {
        return Err(BenchError::Config(format!(
            "unknown benchmark: '{}'. Available: {}",
            cli.bench,
            bench::BENCHMARKS.join(", ")
        )));
    }

    let cfg = load_config(&cli)?;
    let iterations = cfg.run.iterations;
    let warmup = cfg.run.warmup;
    let configurations = cfg.run.instrumentation.clone();

    let mut runner = Runner::new(HttpClientBenchmark::new(cfg));
    runner.register_configurations(configurations)?;

    let outcomes = runner.run_all(iterations, warmup).await;
    let report = RunReport::from_outcomes("HttpClientRequest", &outcomes);

    println!("{}", report.render_table());

    if let Some(path) = &cli.json_report {
        report.write_json(path)?;
        println!("Report saved to {}", path.display());
    }
    Ok(report)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    if cli.list {
        for name in bench::BENCHMARKS {
            println!("{name}");
        }
        return ExitCode::SUCCESS;
    }

    match run(cli).await {
        Ok(report) if report.failed() == 0 => ExitCode::SUCCESS,
        Ok(report) => {
            tracing::error!(failed = report.failed(), "some configurations failed");
            ExitCode::FAILURE
        }
        Err(e) => {
            tracing::error!(kind = e.kind().as_str(), error = %e, "instrbench failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
