//! `HttpClientRequest`: one GET against the local server per operation,
//! parameterized by which instrumentation signals are enabled.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use hyper::Uri;

use instrbench_core::error::{BenchError, Result};
use instrbench_core::{Instrumentation, Signal};

use super::Benchmark;
use crate::client::HttpClient;
use crate::config::BenchConfig;
use crate::server::LocalServer;
use crate::telemetry::{InstrumentationHub, ProviderFactory, SdkProviderFactory, SignalProvider};

pub const NAME: &str = "http-client-request";

/// Resources of one configuration's run. Acquired as server, client, then
/// one provider per enabled signal; released in reverse.
pub struct RunContext {
    instrumentation: Instrumentation,
    target: Uri,
    hub: Arc<InstrumentationHub>,
    server: Option<LocalServer>,
    client: Option<HttpClient>,
    providers: Vec<Box<dyn SignalProvider>>,
}

impl RunContext {
    pub fn instrumentation(&self) -> Instrumentation {
        self.instrumentation
    }

    pub fn target(&self) -> &Uri {
        &self.target
    }

    pub fn hub(&self) -> &Arc<InstrumentationHub> {
        &self.hub
    }

    pub fn server_addr(&self) -> Option<SocketAddr> {
        self.server.as_ref().map(LocalServer::local_addr)
    }

    /// Signals with a live provider, in acquisition order.
    pub fn provider_signals(&self) -> Vec<Signal> {
        self.providers.iter().map(|p| p.signal()).collect()
    }

    /// Requests seen by the given signal's provider.
    pub fn observed_requests(&self, signal: Signal) -> Option<u64> {
        self.providers
            .iter()
            .find(|p| p.signal() == signal)
            .map(|p| p.observed_requests())
    }

    /// Release everything still held, newest first. Every resource is
    /// attempted; failures are collected.
    pub async fn release(mut self) -> Vec<BenchError> {
        let mut failures = Vec::new();

        while let Some(provider) = self.providers.pop() {
            let signal = provider.signal();
            let observed = provider.observed_requests();
            match provider.shutdown() {
                Ok(()) => tracing::debug!(%signal, observed, "provider shut down"),
                Err(e) => {
                    tracing::warn!(%signal, error = %e, "provider shutdown failed");
                    failures.push(e);
                }
            }
        }

        if self.client.take().is_some() {
            tracing::debug!("client disposed");
        }

        if let Some(server) = self.server.take() {
            if let Err(e) = server.stop().await {
                tracing::warn!(error = %e, "server stop failed");
                failures.push(e);
            }
        }

        failures
    }
}

pub struct HttpClientBenchmark {
    cfg: BenchConfig,
    factory: Arc<dyn ProviderFactory>,
}

impl HttpClientBenchmark {
    pub fn new(cfg: BenchConfig) -> Self {
        let factory = Arc::new(SdkProviderFactory::new(cfg.telemetry.clone()));
        Self { cfg, factory }
    }

    pub fn with_provider_factory(mut self, factory: Arc<dyn ProviderFactory>) -> Self {
        self.factory = factory;
        self
    }

    pub fn config(&self) -> &BenchConfig {
        &self.cfg
    }
}

#[async_trait]
impl Benchmark for HttpClientBenchmark {
    type Config = Instrumentation;
    type Context = RunContext;

    fn name(&self) -> &'static str {
        NAME
    }

    async fn setup(&self, instrumentation: &Instrumentation) -> Result<RunContext> {
        let server = LocalServer::start(&self.cfg.server).await?;

        let target = format!("http://{}{}", server.local_addr(), self.cfg.request.path);
        let target: Uri = match target.parse() {
            Ok(uri) => uri,
            Err(e) => {
                if let Err(stop) = server.stop().await {
                    tracing::warn!(error = %stop, "server stop failed");
                }
                return Err(BenchError::setup("client", format!("invalid target '{target}': {e}")));
            }
        };

        let hub = Arc::new(InstrumentationHub::new());
        let mut ctx = RunContext {
            instrumentation: *instrumentation,
            target,
            client: Some(HttpClient::new(Arc::clone(&hub))),
            hub,
            server: Some(server),
            providers: Vec::with_capacity(instrumentation.signals().len()),
        };

        for &signal in instrumentation.signals() {
            match self.factory.build(signal, &ctx.hub) {
                Ok(provider) => ctx.providers.push(provider),
                Err(e) => {
                    tracing::warn!(%signal, error = %e, "provider build failed, rolling back");
                    for f in ctx.release().await {
                        tracing::warn!(error = %f, "rollback release failed");
                    }
                    return Err(e);
                }
            }
        }

        Ok(ctx)
    }

    async fn timed_operation(&self, ctx: &mut RunContext) -> Result<()> {
        let client = ctx
            .client
            .as_ref()
            .ok_or_else(|| BenchError::Internal("client already released".into()))?;
        let response = client.get(&ctx.target).await?;
        response.ensure_success_status()?;
        Ok(())
    }

    async fn teardown(&self, ctx: RunContext) -> Vec<BenchError> {
        ctx.release().await
    }
}
