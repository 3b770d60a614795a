//! Benchmark runner - drives setup, warmup, measured iterations and teardown.

use std::time::Instant;

use instrbench_core::alloc::AllocProbe;
use instrbench_core::error::{BenchError, Phase, Result};
use instrbench_core::{Sample, Summary};

use super::Benchmark;

/// Result of one configuration within `run_all`.
#[derive(Debug)]
pub struct RunOutcome<C> {
    pub configuration: C,
    pub result: Result<Summary>,
}

pub struct Runner<B: Benchmark> {
    bench: B,
    configurations: Vec<B::Config>,
}

impl<B: Benchmark> Runner<B> {
    pub fn new(bench: B) -> Self {
        Self {
            bench,
            configurations: Vec::new(),
        }
    }

    pub fn benchmark(&self) -> &B {
        &self.bench
    }

    /// Replace the configuration set. Must be non-empty without duplicates.
    pub fn register_configurations<I>(&mut self, set: I) -> Result<()>
    where
        I: IntoIterator<Item = B::Config>,
    {
        let mut configurations: Vec<B::Config> = Vec::new();
        for c in set {
            if configurations.contains(&c) {
                return Err(BenchError::Config(format!("configuration '{c}' registered twice")));
            }
            configurations.push(c);
        }
        if configurations.is_empty() {
            return Err(BenchError::Config("no configurations registered".into()));
        }
        self.configurations = configurations;
        Ok(())
    }

    pub fn configurations(&self) -> &[B::Config] {
        &self.configurations
    }

    /// Every registered configuration, in declaration order. A failed
    /// configuration does not stop the ones after it.
    pub async fn run_all(&self, iterations: usize, warmup: usize) -> Vec<RunOutcome<B::Config>> {
        let mut outcomes = Vec::with_capacity(self.configurations.len());
        for configuration in &self.configurations {
            let result = self.run(configuration, iterations, warmup).await;
            if let Err(e) = &result {
                tracing::error!(
                    bench = self.bench.name(),
                    configuration = %configuration,
                    kind = e.kind().as_str(),
                    error = %e,
                    "configuration failed"
                );
            }
            outcomes.push(RunOutcome {
                configuration: configuration.clone(),
                result,
            });
        }
        outcomes
    }

    /// Setup, `warmup` untimed iterations, `iterations` timed iterations,
    /// teardown. Teardown runs whether or not the iterations succeeded.
    pub async fn run(&self, configuration: &B::Config, iterations: usize, warmup: usize) -> Result<Summary> {
        let bench = self.bench.name();
        tracing::info!(bench, configuration = %configuration, iterations, warmup, "setup");

        let mut ctx = self.bench.setup(configuration).await?;

        let measured = self.iterate(&mut ctx, iterations, warmup).await;

        let failures = self.bench.teardown(ctx).await;
        for f in &failures {
            tracing::warn!(bench, configuration = %configuration, error = %f, "release failed");
        }

        let samples = measured?;
        let summary = Summary::from_samples(configuration.to_string(), &samples, failures.len());
        tracing::info!(
            bench,
            configuration = %configuration,
            count = summary.count,
            mean_ns = summary.mean_ns,
            "run complete"
        );
        Ok(summary)
    }

    async fn iterate(&self, ctx: &mut B::Context, iterations: usize, warmup: usize) -> Result<Vec<Sample>> {
        for index in 0..warmup {
            self.bench
                .timed_operation(ctx)
                .await
                .map_err(|e| iteration_error(Phase::Warmup, index, e))?;
        }
        tracing::debug!(bench = self.bench.name(), warmup, "warmup complete");

        let mut samples = Vec::with_capacity(iterations);
        for index in 0..iterations {
            let sample = self
                .measure(ctx)
                .await
                .map_err(|e| iteration_error(Phase::Measured, index, e))?;
            samples.push(sample);
        }
        Ok(samples)
    }

    /// One timed operation: wall time and bytes allocated on this thread.
    pub async fn measure(&self, ctx: &mut B::Context) -> Result<Sample> {
        let probe = AllocProbe::start();
        let started = Instant::now();
        let outcome = self.bench.timed_operation(ctx).await;
        let elapsed = started.elapsed();
        let allocated = probe.finish();

        outcome?;
        Ok(Sample::new(elapsed, allocated))
    }
}

fn iteration_error(phase: Phase, index: usize, source: BenchError) -> BenchError {
    BenchError::Iteration {
        phase,
        index,
        source: Box::new(source),
    }
}
