//! Hub subscription rules and what the SDK observers do to a request.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::Arc;

use bytes::Bytes;
use http_body_util::Empty;
use hyper::{Request, StatusCode, Version};

use instrbench_core::error::{BenchError, ErrorKind};
use instrbench_core::Signal;
use instrbench_harness::client::OutboundRequest;
use instrbench_harness::config::TelemetrySection;
use instrbench_harness::telemetry::{
    finish_all, InstrumentationHub, MetricsProvider, ProviderFactory, RequestOutcome,
    SdkProviderFactory, SignalProvider, TracesProvider,
};

fn request() -> OutboundRequest {
    Request::get("http://127.0.0.1:5000/")
        .body(Empty::<Bytes>::new())
        .unwrap()
}

#[test]
fn empty_hub_opens_no_scopes() {
    let hub = InstrumentationHub::new();
    let mut req = request();
    let scopes = hub.start(&mut req);
    assert!(scopes.is_empty());
    assert!(req.headers().is_empty());
}

#[test]
fn traces_inject_traceparent_and_count_spans() {
    let hub = Arc::new(InstrumentationHub::new());
    let provider = TracesProvider::build(&TelemetrySection::default(), &hub).unwrap();
    assert_eq!(hub.signals(), vec![Signal::Traces]);

    let mut req = request();
    let scopes = hub.start(&mut req);
    assert_eq!(scopes.len(), 1);

    let traceparent = req
        .headers()
        .get("traceparent")
        .expect("traceparent injected")
        .to_str()
        .unwrap()
        .to_string();
    // version-traceid-spanid-flags
    let parts: Vec<&str> = traceparent.split('-').collect();
    assert_eq!(parts.len(), 4, "{traceparent}");
    assert_eq!(parts[0], "00");
    assert_eq!(parts[1].len(), 32);
    assert_eq!(parts[2].len(), 16);

    finish_all(
        scopes,
        &RequestOutcome::Response {
            status: StatusCode::OK,
            version: Version::HTTP_11,
        },
    );
    assert_eq!(provider.observed_requests(), 1);

    Box::new(provider).shutdown().unwrap();
    assert!(hub.is_empty());
}

#[test]
fn metrics_record_failed_requests_too() {
    let hub = Arc::new(InstrumentationHub::new());
    let provider = MetricsProvider::build(&TelemetrySection::default(), &hub).unwrap();

    let mut req = request();
    let scopes = hub.start(&mut req);
    let err = BenchError::Request("connection refused".into());
    finish_all(scopes, &RequestOutcome::Failed(&err));

    let mut req = request();
    let scopes = hub.start(&mut req);
    finish_all(
        scopes,
        &RequestOutcome::Response {
            status: StatusCode::SERVICE_UNAVAILABLE,
            version: Version::HTTP_11,
        },
    );

    assert_eq!(provider.observed_requests(), 2);
    // metrics never touch the request headers
    assert!(req.headers().is_empty());

    Box::new(provider).shutdown().unwrap();
    assert!(hub.is_empty());
}

#[test]
fn one_observer_per_signal() {
    let hub = Arc::new(InstrumentationHub::new());
    let factory = SdkProviderFactory::new(TelemetrySection::default());

    let first = factory.build(Signal::Traces, &hub).unwrap();
    let err = factory.build(Signal::Traces, &hub).err().expect("second subscription must fail");
    assert_eq!(err.kind(), ErrorKind::Setup);

    let metrics = factory.build(Signal::Metrics, &hub).unwrap();
    assert_eq!(hub.signals(), vec![Signal::Traces, Signal::Metrics]);

    metrics.shutdown().unwrap();
    first.shutdown().unwrap();
    assert!(hub.is_empty());
}
