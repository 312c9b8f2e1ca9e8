use std::ops::RangeInclusive;
use std::time::Instant;

use crate::error::WorkloadError;
use crate::schema::{throughput_ops_per_sec, CanonicalStat};

#[derive(Clone, Copy, Debug)]
pub enum Profile {
    Quick,
    Full,
}

impl Profile {
    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::Quick => "quick",
            Profile::Full => "full",
        }
    }
}

/// Workload sizes. `Quick` keeps a full run to well under a minute on a laptop.
#[derive(Clone, Debug)]
pub struct BenchConfig {
    pub profile: Profile,
}

impl BenchConfig {
    /// Blocks mined before the transaction workload so coinbase outputs mature.
    pub fn funding_blocks(&self) -> u64 {
        101
    }

    /// Chain height the hash-proxy workload needs before it starts timing.
    pub fn min_height(&self) -> u64 {
        100
    }

    pub fn transaction_repeats(&self) -> u64 {
        match self.profile {
            Profile::Quick => 50,
            Profile::Full => 500,
        }
    }

    pub fn block_repeats(&self) -> u64 {
        match self.profile {
            Profile::Quick => 10,
            Profile::Full => 50,
        }
    }

    pub fn hash_heights(&self) -> RangeInclusive<u64> {
        1..=self.min_height()
    }
}

/// Elapsed-time samples for one operation, in milliseconds.
///
/// Only ever appended to; reduced once with [`RawSampleSet::summarize`].
#[derive(Clone, Debug, PartialEq)]
pub struct RawSampleSet {
    operation: String,
    samples_ms: Vec<f64>,
}

impl RawSampleSet {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            samples_ms: Vec::new(),
        }
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn push(&mut self, elapsed_ms: f64) {
        self.samples_ms.push(elapsed_ms);
    }

    pub fn len(&self) -> usize {
        self.samples_ms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples_ms.is_empty()
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples_ms
    }

    /// Mean, min and max over the samples. Median and confidence bounds are
    /// left absent. An empty set is an error, never a zero statistic.
    pub fn summarize(self) -> Result<CanonicalStat, WorkloadError> {
        if self.samples_ms.is_empty() {
            return Err(WorkloadError::EmptyMeasurement {
                operation: self.operation,
            });
        }

        let count = self.samples_ms.len();
        let mean_ms = self.samples_ms.iter().sum::<f64>() / count as f64;
        let min_ms = self.samples_ms.iter().copied().fold(f64::INFINITY, f64::min);
        let max_ms = self
            .samples_ms
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);

        Ok(CanonicalStat {
            operation_key: self.operation,
            mean_ms,
            min_ms: Some(min_ms),
            max_ms: Some(max_ms),
            median_ms: None,
            samples: Some(count as u64),
            throughput_ops_per_sec: throughput_ops_per_sec(mean_ms),
            confidence_lower_ms: None,
            confidence_upper_ms: None,
            note: None,
        })
    }
}

/// Time `f` once per input and keep the elapsed time of every call that
/// produced a value. Calls returning `None` are dropped, not counted.
pub fn sample_calls<I, T>(
    operation: &str,
    inputs: I,
    mut f: impl FnMut(I::Item) -> Option<T>,
) -> RawSampleSet
where
    I: IntoIterator,
{
    let mut set = RawSampleSet::new(operation);
    for input in inputs {
        let start = Instant::now();
        let result = f(input);
        let elapsed = start.elapsed();
        if result.is_some() {
            set.push(elapsed.as_secs_f64() * 1000.0);
        }
    }
    set
}
