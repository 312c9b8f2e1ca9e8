use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Ops/sec for a mean latency in milliseconds. Absent for a non-positive or
/// non-finite mean rather than a divide-by-zero sentinel.
pub fn throughput_ops_per_sec(mean_ms: f64) -> Option<f64> {
    if mean_ms.is_finite() && mean_ms > 0.0 {
        Some(1000.0 / mean_ms)
    } else {
        None
    }
}

/// Normalized per-operation statistics.
///
/// Only `mean_ms` is mandatory; every other field stays `None` when the source
/// never measured it, so consumers can tell "unmeasured" from "zero".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalStat {
    pub operation_key: String,
    pub mean_ms: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub median_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub samples: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub throughput_ops_per_sec: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_lower_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_upper_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl CanonicalStat {
    /// A stat carrying only a mean; throughput is derived from it.
    pub fn from_mean(operation_key: impl Into<String>, mean_ms: f64) -> Self {
        Self {
            operation_key: operation_key.into(),
            mean_ms,
            min_ms: None,
            max_ms: None,
            median_ms: None,
            samples: None,
            throughput_ops_per_sec: throughput_ops_per_sec(mean_ms),
            confidence_lower_ms: None,
            confidence_upper_ms: None,
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Free-form description of the machine an export was produced on.
///
/// Informational only; comparison logic never reads it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rust_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// One benchmark inside a canonical export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportEntry {
    pub mean_ms: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub samples: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub throughput_ops_per_sec: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Native name the entry was exported from.
    pub original_name: String,
}

impl ExportEntry {
    pub fn from_stat(stat: &CanonicalStat, original_name: impl Into<String>) -> Self {
        Self {
            mean_ms: stat.mean_ms,
            min_ms: stat.min_ms,
            max_ms: stat.max_ms,
            samples: stat.samples,
            throughput_ops_per_sec: stat.throughput_ops_per_sec,
            note: stat.note.clone(),
            original_name: original_name.into(),
        }
    }

    /// Back to a `CanonicalStat`. Fields the export format drops (median,
    /// confidence bounds) come back absent.
    pub fn to_stat(&self, operation_key: &str) -> CanonicalStat {
        CanonicalStat {
            operation_key: operation_key.to_string(),
            mean_ms: self.mean_ms,
            min_ms: self.min_ms,
            max_ms: self.max_ms,
            median_ms: None,
            samples: self.samples,
            throughput_ops_per_sec: self.throughput_ops_per_sec,
            confidence_lower_ms: None,
            confidence_upper_ms: None,
            note: self.note.clone(),
        }
    }
}

/// Per-system export keyed by canonical operation key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalExport {
    pub system: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<SystemMetadata>,
    pub benchmarks: BTreeMap<String, ExportEntry>,
}

impl CanonicalExport {
    pub fn new(system: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            metadata: None,
            benchmarks: BTreeMap::new(),
        }
    }

    pub fn stat(&self, operation_key: &str) -> Option<CanonicalStat> {
        self.benchmarks
            .get(operation_key)
            .map(|entry| entry.to_stat(operation_key))
    }
}

/// Result of one reference workload: a measured entry or the reason it has none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WorkloadOutcome {
    Measured(ExportEntry),
    Failed { error: String },
}

/// Document written by a reference-node benchmark run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceReport {
    pub system: String,
    pub timestamp_unix: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<SystemMetadata>,
    pub benchmarks: BTreeMap<String, WorkloadOutcome>,
    /// Set when the node itself could not be run; `benchmarks` is then empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ReferenceReport {
    /// Report for a run that never reached the workloads.
    pub fn failed(
        system: impl Into<String>,
        error: impl Into<String>,
        metadata: Option<SystemMetadata>,
        timestamp_unix: u64,
    ) -> Self {
        Self {
            system: system.into(),
            timestamp_unix,
            metadata,
            benchmarks: BTreeMap::new(),
            error: Some(error.into()),
        }
    }

    pub fn measured_count(&self) -> usize {
        self.benchmarks
            .values()
            .filter(|outcome| matches!(outcome, WorkloadOutcome::Measured(_)))
            .count()
    }

    /// Canonical export of the measured workloads; failed ones are dropped.
    pub fn to_export(&self) -> CanonicalExport {
        let benchmarks = self
            .benchmarks
            .iter()
            .filter_map(|(key, outcome)| match outcome {
                WorkloadOutcome::Measured(entry) => Some((key.clone(), entry.clone())),
                WorkloadOutcome::Failed { .. } => None,
            })
            .collect();
        CanonicalExport {
            system: self.system.clone(),
            metadata: self.metadata.clone(),
            benchmarks,
        }
    }
}

/// Which side of a comparison had the lower mean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Faster {
    A,
    B,
}

/// Joined result for one operation across both systems.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRecord {
    pub operation_key: String,
    pub stat_a: CanonicalStat,
    pub stat_b: Option<CanonicalStat>,
    pub ratio: Option<f64>,
    pub faster: Option<Faster>,
    pub note: Option<String>,
}

/// Serialized shape of a `ComparisonRecord` inside a comparison report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonEntry {
    #[serde(rename = "A_ms")]
    pub a_ms: f64,
    #[serde(rename = "B_ms", default, skip_serializing_if = "Option::is_none")]
    pub b_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ratio: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub faster: Option<Faster>,
    #[serde(rename = "A_throughput", default, skip_serializing_if = "Option::is_none")]
    pub a_throughput: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl From<&ComparisonRecord> for ComparisonEntry {
    fn from(record: &ComparisonRecord) -> Self {
        Self {
            a_ms: record.stat_a.mean_ms,
            b_ms: record.stat_b.as_ref().map(|stat| stat.mean_ms),
            ratio: record.ratio,
            faster: record.faster,
            a_throughput: record.stat_a.throughput_ops_per_sec,
            note: record.note.clone(),
        }
    }
}

/// Display names of the two compared systems.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemLabels {
    pub a: String,
    pub b: String,
}

impl SystemLabels {
    pub fn name(&self, side: Faster) -> &str {
        match side {
            Faster::A => &self.a,
            Faster::B => &self.b,
        }
    }
}

/// Machine-readable comparison report.
///
/// Each system's export sits at the top level under its label key, next to
/// `labels` and `comparison`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub labels: SystemLabels,
    #[serde(flatten)]
    pub systems: BTreeMap<String, CanonicalExport>,
    pub comparison: BTreeMap<String, ComparisonEntry>,
}
