//! HTTP client instrumentation.
//!
//! The client consults an `InstrumentationHub` for every outbound request.
//! Signal providers subscribe a `RequestObserver` when they are built and
//! unsubscribe when they shut down, so a provider's presence alone decides
//! whether its signal instruments the call. An empty hub costs nothing per
//! request.

pub mod metrics;
pub mod traces;

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use hyper::{Method, StatusCode, Version};
use opentelemetry_sdk::Resource;

use instrbench_core::error::{BenchError, Result};
use instrbench_core::Signal;

use crate::client::OutboundRequest;
use crate::config::TelemetrySection;

pub use metrics::{HttpClientMetrics, MetricsProvider};
pub use traces::{HttpClientTraces, TracesProvider};

/// Instrumentation scope name reported by both providers.
pub const INSTRUMENTATION_SCOPE: &str = "instrbench.http_client";

/// How an outbound request ended.
#[derive(Debug, Clone, Copy)]
pub enum RequestOutcome<'a> {
    Response { status: StatusCode, version: Version },
    Failed(&'a BenchError),
}

/// Per-signal hook invoked when a request starts.
pub trait RequestObserver: Send + Sync {
    fn signal(&self) -> Signal;

    /// May mutate the request (e.g. inject propagation headers).
    fn on_request(&self, request: &mut OutboundRequest) -> Box<dyn RequestScope>;
}

/// State an observer keeps for one in-flight request.
pub trait RequestScope: Send {
    fn finish(self: Box<Self>, outcome: &RequestOutcome<'_>);
}

/// Registry of active observers, keyed by signal.
#[derive(Default)]
pub struct InstrumentationHub {
    observers: DashMap<Signal, Arc<dyn RequestObserver>>,
}

impl InstrumentationHub {
    pub fn new() -> Self {
        Self {
            observers: DashMap::new(),
        }
    }

    /// At most one observer per signal.
    pub fn subscribe(&self, observer: Arc<dyn RequestObserver>) -> Result<()> {
        let signal = observer.signal();
        match self.observers.entry(signal) {
            Entry::Occupied(_) => Err(BenchError::setup(
                "instrumentation",
                format!("{signal} instrumentation already subscribed"),
            )),
            Entry::Vacant(v) => {
                v.insert(observer);
                Ok(())
            }
        }
    }

    pub fn unsubscribe(&self, signal: Signal) -> bool {
        self.observers.remove(&signal).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    pub fn signals(&self) -> Vec<Signal> {
        let mut out: Vec<Signal> = self.observers.iter().map(|e| *e.key()).collect();
        out.sort();
        out
    }

    /// Open one scope per subscribed observer.
    pub fn start(&self, request: &mut OutboundRequest) -> Vec<Box<dyn RequestScope>> {
        if self.observers.is_empty() {
            return Vec::new();
        }
        let mut scopes = Vec::with_capacity(self.observers.len());
        for entry in self.observers.iter() {
            scopes.push(entry.value().on_request(request));
        }
        scopes
    }
}

pub fn finish_all(scopes: Vec<Box<dyn RequestScope>>, outcome: &RequestOutcome<'_>) {
    for scope in scopes {
        scope.finish(outcome);
    }
}

/// A built provider for one signal; owns its SDK pipeline.
pub trait SignalProvider: Send {
    fn signal(&self) -> Signal;

    /// Requests this provider's instrumentation has seen.
    fn observed_requests(&self) -> u64;

    /// Unsubscribe from the hub, then flush and stop the SDK pipeline.
    fn shutdown(self: Box<Self>) -> Result<()>;
}

/// Builds the provider for a signal, wired to the given hub.
pub trait ProviderFactory: Send + Sync {
    fn build(&self, signal: Signal, hub: &Arc<InstrumentationHub>) -> Result<Box<dyn SignalProvider>>;
}

/// OpenTelemetry SDK providers with HTTP client instrumentation.
pub struct SdkProviderFactory {
    settings: TelemetrySection,
}

impl SdkProviderFactory {
    pub fn new(settings: TelemetrySection) -> Self {
        Self { settings }
    }
}

impl ProviderFactory for SdkProviderFactory {
    fn build(&self, signal: Signal, hub: &Arc<InstrumentationHub>) -> Result<Box<dyn SignalProvider>> {
        match signal {
            Signal::Traces => Ok(Box::new(TracesProvider::build(&self.settings, hub)?)),
            Signal::Metrics => Ok(Box::new(MetricsProvider::build(&self.settings, hub)?)),
        }
    }
}

pub(crate) fn resource(settings: &TelemetrySection) -> Resource {
    Resource::builder()
        .with_service_name(settings.service_name.clone())
        .build()
}

/// Semantic-convention method name; unknown methods collapse to `_OTHER`.
pub(crate) fn method_name(method: &Method) -> &'static str {
    match method.as_str() {
        "GET" => "GET",
        "HEAD" => "HEAD",
        "POST" => "POST",
        "PUT" => "PUT",
        "DELETE" => "DELETE",
        "PATCH" => "PATCH",
        "OPTIONS" => "OPTIONS",
        "TRACE" => "TRACE",
        "CONNECT" => "CONNECT",
        _ => "_OTHER",
    }
}

pub(crate) fn protocol_version(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "0.9",
        Version::HTTP_10 => "1.0",
        Version::HTTP_11 => "1.1",
        Version::HTTP_2 => "2",
        Version::HTTP_3 => "3",
        _ => "unknown",
    }
}
