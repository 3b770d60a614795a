//! Tracer provider with HTTP client instrumentation.
//!
//! One client span per request, W3C trace context injected into the outgoing
//! headers. The provider has no span processor: spans are created, populated
//! and ended, but not exported.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use hyper::header::{HeaderMap, HeaderName, HeaderValue};
use opentelemetry::propagation::{Injector, TextMapPropagator};
use opentelemetry::trace::{SpanKind, Status, TraceContextExt, Tracer, TracerProvider as _};
use opentelemetry::{Context, KeyValue};
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::{SdkTracer, SdkTracerProvider};

use instrbench_core::error::{BenchError, Result};
use instrbench_core::Signal;

use super::{
    method_name, protocol_version, resource, InstrumentationHub, RequestObserver, RequestOutcome,
    RequestScope, SignalProvider, INSTRUMENTATION_SCOPE,
};
use crate::client::OutboundRequest;
use crate::config::TelemetrySection;

struct HeaderInjector<'a>(&'a mut HeaderMap);

impl Injector for HeaderInjector<'_> {
    fn set(&mut self, key: &str, value: String) {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(key.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            self.0.insert(name, value);
        }
    }
}

pub struct HttpClientTraces {
    tracer: SdkTracer,
    propagator: TraceContextPropagator,
    spans: Arc<AtomicU64>,
}

impl HttpClientTraces {
    pub fn new(tracer: SdkTracer) -> Self {
        Self {
            tracer,
            propagator: TraceContextPropagator::new(),
            spans: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Spans ended so far.
    pub fn spans_ended(&self) -> u64 {
        self.spans.load(Ordering::Relaxed)
    }
}

impl RequestObserver for HttpClientTraces {
    fn signal(&self) -> Signal {
        Signal::Traces
    }

    fn on_request(&self, request: &mut OutboundRequest) -> Box<dyn RequestScope> {
        let method = method_name(request.method());
        let uri = request.uri();

        let mut attributes = Vec::with_capacity(4);
        attributes.push(KeyValue::new("http.request.method", method));
        attributes.push(KeyValue::new("url.full", uri.to_string()));
        if let Some(host) = uri.host() {
            attributes.push(KeyValue::new("server.address", host.to_string()));
        }
        if let Some(port) = uri.port_u16() {
            attributes.push(KeyValue::new("server.port", i64::from(port)));
        }

        let span = self
            .tracer
            .span_builder(method)
            .with_kind(SpanKind::Client)
            .with_attributes(attributes)
            .start(&self.tracer);
        let cx = Context::current_with_span(span);

        self.propagator
            .inject_context(&cx, &mut HeaderInjector(request.headers_mut()));

        Box::new(TraceScope {
            cx,
            spans: Arc::clone(&self.spans),
        })
    }
}

struct TraceScope {
    cx: Context,
    spans: Arc<AtomicU64>,
}

impl RequestScope for TraceScope {
    fn finish(self: Box<Self>, outcome: &RequestOutcome<'_>) {
        let span = self.cx.span();
        match outcome {
            RequestOutcome::Response { status, version } => {
                span.set_attribute(KeyValue::new(
                    "http.response.status_code",
                    i64::from(status.as_u16()),
                ));
                span.set_attribute(KeyValue::new(
                    "network.protocol.version",
                    protocol_version(*version),
                ));
                if status.is_client_error() || status.is_server_error() {
                    span.set_attribute(KeyValue::new("error.type", status.as_str().to_string()));
                    span.set_status(Status::error(status.to_string()));
                }
            }
            RequestOutcome::Failed(err) => {
                span.set_attribute(KeyValue::new("error.type", err.kind().as_str()));
                span.set_status(Status::error(err.to_string()));
            }
        }
        span.end();
        self.spans.fetch_add(1, Ordering::Relaxed);
    }
}

/// `SdkTracerProvider` plus its subscription on the hub.
pub struct TracesProvider {
    provider: SdkTracerProvider,
    observer: Arc<HttpClientTraces>,
    hub: Arc<InstrumentationHub>,
}

impl TracesProvider {
    pub fn build(settings: &TelemetrySection, hub: &Arc<InstrumentationHub>) -> Result<Self> {
        let provider = SdkTracerProvider::builder()
            .with_resource(resource(settings))
            .build();

        let observer = Arc::new(HttpClientTraces::new(provider.tracer(INSTRUMENTATION_SCOPE)));
        if let Err(e) = hub.subscribe(observer.clone()) {
            let _ = provider.shutdown();
            return Err(e);
        }

        tracing::debug!(service = %settings.service_name, "tracer provider built");
        Ok(Self {
            provider,
            observer,
            hub: Arc::clone(hub),
        })
    }
}

impl SignalProvider for TracesProvider {
    fn signal(&self) -> Signal {
        Signal::Traces
    }

    fn observed_requests(&self) -> u64 {
        self.observer.spans_ended()
    }

    fn shutdown(self: Box<Self>) -> Result<()> {
        self.hub.unsubscribe(Signal::Traces);
        self.provider
            .shutdown()
            .map_err(|e| BenchError::release("tracer provider", e))
    }
}
