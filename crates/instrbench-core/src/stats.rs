//! Aggregation of a run's samples into a result summary.
//!
//! Timing values are nanoseconds. The reported error is the half-width of the
//! 99.9% confidence interval of the mean (Student t, two-sided).

use hdrhistogram::Histogram;
use serde::Serialize;

use crate::sample::Sample;

/// Two-sided 99.9% Student t quantiles for 1..=30 degrees of freedom.
const T_999: [f64; 30] = [
    636.619, 31.599, 12.924, 8.610, 6.869, 5.959, 5.408, 5.041, 4.781, 4.587,
    4.437, 4.318, 4.221, 4.140, 4.073, 4.015, 3.965, 3.922, 3.883, 3.850,
    3.819, 3.792, 3.768, 3.745, 3.725, 3.707, 3.690, 3.674, 3.659, 3.646,
];

/// Standard normal quantile at 0.9995.
const Z_9995: f64 = 3.290_527;

/// Student t quantile (0.9995) for `df` degrees of freedom.
pub fn t_quantile_999(df: usize) -> f64 {
    if df == 0 {
        return f64::NAN;
    }
    if df <= T_999.len() {
        return T_999[df - 1];
    }
    // Cornish-Fisher expansion around the normal quantile.
    let z = Z_9995;
    let v = df as f64;
    let z3 = z.powi(3);
    let z5 = z.powi(5);
    let z7 = z.powi(7);
    z + (z3 + z) / (4.0 * v)
        + (5.0 * z5 + 16.0 * z3 + 3.0 * z) / (96.0 * v * v)
        + (3.0 * z7 + 19.0 * z5 + 17.0 * z3 - 15.0 * z) / (384.0 * v * v * v)
}

/// Aggregated statistics of one configuration's run. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub configuration: String,
    pub count: usize,
    pub mean_ns: f64,
    pub error_ns: f64,
    pub stddev_ns: f64,
    pub min_ns: u64,
    pub max_ns: u64,
    pub p50_ns: u64,
    pub p90_ns: u64,
    pub p99_ns: u64,
    /// Mean bytes allocated per operation; absent without allocation counting.
    pub allocated_bytes: Option<f64>,
    /// Resources that failed to release during teardown.
    pub release_failures: usize,
}

impl Summary {
    pub fn from_samples(
        configuration: impl Into<String>,
        samples: &[Sample],
        release_failures: usize,
    ) -> Self {
        let count = samples.len();
        let nanos: Vec<u64> = samples.iter().map(Sample::elapsed_nanos).collect();

        let (mean_ns, stddev_ns) = mean_and_stddev(&nanos);
        let error_ns = if count > 1 {
            t_quantile_999(count - 1) * stddev_ns / (count as f64).sqrt()
        } else {
            0.0
        };

        let (p50_ns, p90_ns, p99_ns) = percentiles(&nanos);

        let allocated_bytes = if count == 0 {
            None
        } else {
            samples
                .iter()
                .try_fold(0u128, |acc, s| s.allocated_bytes.map(|b| acc + u128::from(b)))
                .map(|total| total as f64 / count as f64)
        };

        Self {
            configuration: configuration.into(),
            count,
            mean_ns,
            error_ns,
            stddev_ns,
            min_ns: nanos.iter().copied().min().unwrap_or(0),
            max_ns: nanos.iter().copied().max().unwrap_or(0),
            p50_ns,
            p90_ns,
            p99_ns,
            allocated_bytes,
            release_failures,
        }
    }
}

/// Mean and sample standard deviation (n - 1). Zero for fewer than two values.
fn mean_and_stddev(values: &[u64]) -> (f64, f64) {
    let n = values.len();
    if n == 0 {
        return (0.0, 0.0);
    }
    let mean = values.iter().map(|&v| v as f64).sum::<f64>() / n as f64;
    if n < 2 {
        return (mean, 0.0);
    }
    let var = values
        .iter()
        .map(|&v| {
            let d = v as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / (n - 1) as f64;
    (mean, var.sqrt())
}

const HISTOGRAM_MAX_NS: u64 = 3_600_000_000_000;

fn percentiles(values: &[u64]) -> (u64, u64, u64) {
    if values.is_empty() {
        return (0, 0, 0);
    }
    // 1 ns to 1 hour, 3 significant figures
    let Ok(mut hist) = Histogram::<u64>::new_with_bounds(1, HISTOGRAM_MAX_NS, 3) else {
        return (0, 0, 0);
    };
    for &v in values {
        let _ = hist.record(v.clamp(1, HISTOGRAM_MAX_NS));
    }
    (
        hist.value_at_quantile(0.50),
        hist.value_at_quantile(0.90),
        hist.value_at_quantile(0.99),
    )
}
