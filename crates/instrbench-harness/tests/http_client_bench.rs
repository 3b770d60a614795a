//! End-to-end runs of `http-client-request` against the local server.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use instrbench_core::alloc::CountingAllocator;
use instrbench_core::error::{BenchError, ErrorKind, Result};
use instrbench_core::{Instrumentation, Signal};
use instrbench_harness::bench::{Benchmark, HttpClientBenchmark, Runner};
use instrbench_harness::config::BenchConfig;
use instrbench_harness::server::LocalServer;
use instrbench_harness::telemetry::{
    InstrumentationHub, ProviderFactory, SdkProviderFactory, SignalProvider,
};

#[global_allocator]
static ALLOC: CountingAllocator = CountingAllocator::system();

fn config() -> BenchConfig {
    let mut cfg = BenchConfig::default();
    cfg.server.shutdown_timeout_ms = 2000;
    cfg
}

async fn free_addr() -> SocketAddr {
    let l = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    l.local_addr().unwrap()
}

async fn assert_port_released(addr: SocketAddr) {
    tokio::net::TcpListener::bind(addr)
        .await
        .unwrap_or_else(|e| panic!("port {addr} still held: {e}"));
}

#[tokio::test]
async fn no_instrumentation_fifty_iterations() {
    let runner = Runner::new(HttpClientBenchmark::new(config()));
    let summary = runner.run(&Instrumentation::None, 50, 0).await.unwrap();

    assert_eq!(summary.configuration, "None");
    assert_eq!(summary.count, 50);
    assert!(summary.mean_ns >= 0.0);
    assert!(summary.min_ns > 0);
    assert_eq!(summary.release_failures, 0);
    assert!(summary.allocated_bytes.is_some());
}

#[tokio::test]
async fn setup_then_teardown_releases_everything() {
    let bench = HttpClientBenchmark::new(config());

    for instrumentation in Instrumentation::ALL {
        let ctx = bench.setup(&instrumentation).await.unwrap();
        let addr = ctx.server_addr().unwrap();
        let hub = Arc::clone(ctx.hub());

        let mut expected = instrumentation.signals().to_vec();
        expected.sort();
        assert_eq!(hub.signals(), expected, "{instrumentation}");
        assert_eq!(ctx.provider_signals(), instrumentation.signals());

        let failures = bench.teardown(ctx).await;
        assert!(failures.is_empty(), "{instrumentation}: {failures:?}");
        assert!(hub.is_empty(), "{instrumentation}");
        assert_port_released(addr).await;
    }
}

#[tokio::test]
async fn repeated_runs_report_same_count() {
    let runner = Runner::new(HttpClientBenchmark::new(config()));
    let a = runner.run(&Instrumentation::Traces, 12, 2).await.unwrap();
    let b = runner.run(&Instrumentation::Traces, 12, 2).await.unwrap();
    assert_eq!(a.count, 12);
    assert_eq!(b.count, 12);
}

#[tokio::test]
async fn both_providers_built_before_first_iteration() {
    let bench = HttpClientBenchmark::new(config());
    let mut ctx = bench.setup(&Instrumentation::TracesAndMetrics).await.unwrap();

    assert_eq!(ctx.provider_signals(), vec![Signal::Traces, Signal::Metrics]);
    assert_eq!(ctx.observed_requests(Signal::Traces), Some(0));
    assert_eq!(ctx.observed_requests(Signal::Metrics), Some(0));

    for _ in 0..5 {
        bench.timed_operation(&mut ctx).await.unwrap();
    }
    assert_eq!(ctx.observed_requests(Signal::Traces), Some(5));
    assert_eq!(ctx.observed_requests(Signal::Metrics), Some(5));

    assert!(bench.teardown(ctx).await.is_empty());
}

#[tokio::test]
async fn single_signal_configurations_do_not_enable_the_other() {
    let bench = HttpClientBenchmark::new(config());

    let mut ctx = bench.setup(&Instrumentation::Traces).await.unwrap();
    bench.timed_operation(&mut ctx).await.unwrap();
    assert_eq!(ctx.observed_requests(Signal::Traces), Some(1));
    assert_eq!(ctx.observed_requests(Signal::Metrics), None);
    assert!(bench.teardown(ctx).await.is_empty());

    let mut ctx = bench.setup(&Instrumentation::Metrics).await.unwrap();
    bench.timed_operation(&mut ctx).await.unwrap();
    assert_eq!(ctx.observed_requests(Signal::Metrics), Some(1));
    assert_eq!(ctx.observed_requests(Signal::Traces), None);
    assert!(bench.teardown(ctx).await.is_empty());
}

#[tokio::test]
async fn non_success_status_fails_the_run() {
    let mut cfg = config();
    cfg.request.path = "/status/503".into();
    let runner = Runner::new(HttpClientBenchmark::new(cfg));

    for instrumentation in [Instrumentation::None, Instrumentation::TracesAndMetrics] {
        let err = runner.run(&instrumentation, 10, 0).await.expect_err("must fail");
        assert_eq!(err.kind(), ErrorKind::Iteration);
        assert!(matches!(err.root(), BenchError::Status(503)), "{err}");
    }
}

#[tokio::test]
async fn instrumentation_adds_allocations() {
    let runner = Runner::new(HttpClientBenchmark::new(config()));

    let mut alloc = Vec::new();
    for instrumentation in Instrumentation::ALL {
        let s = runner.run(&instrumentation, 30, 5).await.unwrap();
        alloc.push(s.allocated_bytes.unwrap());
    }
    let (none, traces, metrics, both) = (alloc[0], alloc[1], alloc[2], alloc[3]);

    assert!(traces > none, "traces={traces} none={none}");
    assert!(metrics > none, "metrics={metrics} none={none}");
    assert!(both > traces, "both={both} traces={traces}");
}

#[tokio::test]
async fn bind_conflict_is_a_setup_error() {
    let held = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let mut cfg = config();
    cfg.server.listen = held.local_addr().unwrap().to_string();

    let bench = HttpClientBenchmark::new(cfg);
    let err = bench.setup(&Instrumentation::None).await.err().expect("must fail");
    assert_eq!(err.kind(), ErrorKind::Setup);
}

#[tokio::test]
async fn server_starts_again_after_bind_failure() {
    let held = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let mut cfg = config();
    cfg.server.listen = held.local_addr().unwrap().to_string();

    let err = LocalServer::start(&cfg.server).await.err().expect("must fail");
    assert_eq!(err.kind(), ErrorKind::Setup);

    // the runtime still serves a fresh server
    let server = LocalServer::start(&config().server).await.unwrap();
    let addr = server.local_addr();
    server.stop().await.unwrap();
    assert_port_released(addr).await;
}

/// Real providers, except where a signal is scripted to misbehave.
struct FlakyFactory {
    real: SdkProviderFactory,
    fail_build: Option<Signal>,
    fail_shutdown: Option<Signal>,
    shutdown_attempted: Arc<AtomicBool>,
    hubs: Mutex<Vec<Arc<InstrumentationHub>>>,
}

impl FlakyFactory {
    fn new(fail_build: Option<Signal>, fail_shutdown: Option<Signal>) -> Self {
        Self {
            real: SdkProviderFactory::new(Default::default()),
            fail_build,
            fail_shutdown,
            shutdown_attempted: Arc::new(AtomicBool::new(false)),
            hubs: Mutex::new(Vec::new()),
        }
    }
}

struct StuckProvider {
    signal: Signal,
    attempted: Arc<AtomicBool>,
}

impl SignalProvider for StuckProvider {
    fn signal(&self) -> Signal {
        self.signal
    }

    fn observed_requests(&self) -> u64 {
        0
    }

    fn shutdown(self: Box<Self>) -> Result<()> {
        self.attempted.store(true, Ordering::SeqCst);
        Err(BenchError::release("stuck provider", "refused to shut down"))
    }
}

impl ProviderFactory for FlakyFactory {
    fn build(&self, signal: Signal, hub: &Arc<InstrumentationHub>) -> Result<Box<dyn SignalProvider>> {
        self.hubs.lock().unwrap().push(Arc::clone(hub));
        if self.fail_build == Some(signal) {
            return Err(BenchError::setup("provider", format!("{signal} exporter unavailable")));
        }
        if self.fail_shutdown == Some(signal) {
            return Ok(Box::new(StuckProvider {
                signal,
                attempted: Arc::clone(&self.shutdown_attempted),
            }));
        }
        self.real.build(signal, hub)
    }
}

#[tokio::test]
async fn provider_build_failure_rolls_back() {
    let addr = free_addr().await;
    let mut cfg = config();
    cfg.server.listen = addr.to_string();

    let factory = Arc::new(FlakyFactory::new(Some(Signal::Metrics), None));
    let bench = HttpClientBenchmark::new(cfg).with_provider_factory(factory.clone());

    let err = bench
        .setup(&Instrumentation::TracesAndMetrics)
        .await
        .err()
        .expect("must fail");
    assert_eq!(err.kind(), ErrorKind::Setup);

    // traces provider was built, then released again
    let hubs = factory.hubs.lock().unwrap().clone();
    assert_eq!(hubs.len(), 2);
    assert!(hubs[0].is_empty());

    assert_port_released(addr).await;
}

#[tokio::test]
async fn teardown_continues_after_provider_shutdown_failure() {
    let addr = free_addr().await;
    let mut cfg = config();
    cfg.server.listen = addr.to_string();

    // metrics is released first and fails; traces must still be shut down
    let factory = Arc::new(FlakyFactory::new(None, Some(Signal::Metrics)));
    let bench = HttpClientBenchmark::new(cfg).with_provider_factory(factory.clone());

    let mut ctx = bench.setup(&Instrumentation::TracesAndMetrics).await.unwrap();
    bench.timed_operation(&mut ctx).await.unwrap();
    let hub = Arc::clone(ctx.hub());
    assert_eq!(hub.signals(), vec![Signal::Traces]);

    let failures = bench.teardown(ctx).await;
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].kind(), ErrorKind::Teardown);
    assert!(factory.shutdown_attempted.load(Ordering::SeqCst));
    assert!(hub.is_empty());
    assert_port_released(addr).await;
}

#[tokio::test]
async fn teardown_failure_is_counted_not_fatal() {
    let factory = Arc::new(FlakyFactory::new(None, Some(Signal::Traces)));
    let bench = HttpClientBenchmark::new(config()).with_provider_factory(factory);
    let runner = Runner::new(bench);

    let summary = runner.run(&Instrumentation::Traces, 8, 0).await.unwrap();
    assert_eq!(summary.count, 8);
    assert_eq!(summary.release_failures, 1);
}
