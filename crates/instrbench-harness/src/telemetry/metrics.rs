//! Meter provider with HTTP client instrumentation.
//!
//! Records `http.client.request.duration` (seconds) per request. The reader
//! exports to memory on a long interval so no export lands inside a run.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use opentelemetry::metrics::{Histogram, MeterProvider as _};
use opentelemetry::KeyValue;
use opentelemetry_sdk::metrics::{InMemoryMetricExporter, PeriodicReader, SdkMeterProvider};

use instrbench_core::error::{BenchError, Result};
use instrbench_core::Signal;

use super::{
    method_name, protocol_version, resource, InstrumentationHub, RequestObserver, RequestOutcome,
    RequestScope, SignalProvider, INSTRUMENTATION_SCOPE,
};
use crate::client::OutboundRequest;
use crate::config::TelemetrySection;

const EXPORT_INTERVAL: Duration = Duration::from_secs(3600);

pub struct HttpClientMetrics {
    duration: Histogram<f64>,
    recorded: Arc<AtomicU64>,
}

impl HttpClientMetrics {
    pub fn new(duration: Histogram<f64>) -> Self {
        Self {
            duration,
            recorded: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Durations recorded so far.
    pub fn recorded(&self) -> u64 {
        self.recorded.load(Ordering::Relaxed)
    }
}

impl RequestObserver for HttpClientMetrics {
    fn signal(&self) -> Signal {
        Signal::Metrics
    }

    fn on_request(&self, request: &mut OutboundRequest) -> Box<dyn RequestScope> {
        let uri = request.uri();
        Box::new(MetricScope {
            started: Instant::now(),
            method: method_name(request.method()),
            scheme: uri.scheme_str().map(str::to_owned),
            host: uri.host().map(str::to_owned),
            port: uri.port_u16(),
            duration: self.duration.clone(),
            recorded: Arc::clone(&self.recorded),
        })
    }
}

struct MetricScope {
    started: Instant,
    method: &'static str,
    scheme: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    duration: Histogram<f64>,
    recorded: Arc<AtomicU64>,
}

impl RequestScope for MetricScope {
    fn finish(self: Box<Self>, outcome: &RequestOutcome<'_>) {
        let elapsed = self.started.elapsed().as_secs_f64();
        let this = *self;

        let mut attributes = Vec::with_capacity(6);
        attributes.push(KeyValue::new("http.request.method", this.method));
        if let Some(scheme) = this.scheme {
            attributes.push(KeyValue::new("url.scheme", scheme));
        }
        if let Some(host) = this.host {
            attributes.push(KeyValue::new("server.address", host));
        }
        if let Some(port) = this.port {
            attributes.push(KeyValue::new("server.port", i64::from(port)));
        }
        match outcome {
            RequestOutcome::Response { status, version } => {
                attributes.push(KeyValue::new(
                    "http.response.status_code",
                    i64::from(status.as_u16()),
                ));
                attributes.push(KeyValue::new(
                    "network.protocol.version",
                    protocol_version(*version),
                ));
                if status.is_client_error() || status.is_server_error() {
                    attributes.push(KeyValue::new("error.type", status.as_str().to_string()));
                }
            }
            RequestOutcome::Failed(err) => {
                attributes.push(KeyValue::new("error.type", err.kind().as_str()));
            }
        }

        this.duration.record(elapsed, &attributes);
        this.recorded.fetch_add(1, Ordering::Relaxed);
    }
}

/// `SdkMeterProvider` plus its subscription on the hub.
pub struct MetricsProvider {
    provider: SdkMeterProvider,
    observer: Arc<HttpClientMetrics>,
    hub: Arc<InstrumentationHub>,
}

impl MetricsProvider {
    pub fn build(settings: &TelemetrySection, hub: &Arc<InstrumentationHub>) -> Result<Self> {
        let reader = PeriodicReader::builder(InMemoryMetricExporter::default())
            .with_interval(EXPORT_INTERVAL)
            .build();
        let provider = SdkMeterProvider::builder()
            .with_resource(resource(settings))
            .with_reader(reader)
            .build();

        let duration = provider
            .meter(INSTRUMENTATION_SCOPE)
            .f64_histogram("http.client.request.duration")
            .with_unit("s")
            .with_description("Duration of HTTP client requests.")
            .build();

        let observer = Arc::new(HttpClientMetrics::new(duration));
        if let Err(e) = hub.subscribe(observer.clone()) {
            let _ = provider.shutdown();
            return Err(e);
        }

        tracing::debug!(service = %settings.service_name, "meter provider built");
        Ok(Self {
            provider,
            observer,
            hub: Arc::clone(hub),
        })
    }
}

impl SignalProvider for MetricsProvider {
    fn signal(&self) -> Signal {
        Signal::Metrics
    }

    fn observed_requests(&self) -> u64 {
        self.observer.recorded()
    }

    fn shutdown(self: Box<Self>) -> Result<()> {
        self.hub.unsubscribe(Signal::Metrics);
        self.provider
            .shutdown()
            .map_err(|e| BenchError::release("meter provider", e))
    }
}
