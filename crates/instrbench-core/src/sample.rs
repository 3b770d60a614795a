//! One observation of the timed operation.

use std::time::Duration;

/// Elapsed wall time and bytes allocated on the measuring thread during a
/// single timed operation. `allocated_bytes` is `None` when allocation
/// counting is not installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    pub elapsed: Duration,
    pub allocated_bytes: Option<u64>,
}

impl Sample {
    pub fn new(elapsed: Duration, allocated_bytes: Option<u64>) -> Self {
        Self { elapsed, allocated_bytes }
    }

    pub fn elapsed_nanos(&self) -> u64 {
        u64::try_from(self.elapsed.as_nanos()).unwrap_or(u64::MAX)
    }
}
