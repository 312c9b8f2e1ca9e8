//! Decoder for micro-benchmark statistics reports.
//!
//! The report is a JSON object mapping benchmark name to Criterion-style
//! estimates, all times in nanoseconds:
//!
//! ```text
//! {
//!   "check_transaction": {
//!     "mean":   { "point_estimate": 1234.5,
//!                 "confidence_interval": { "lower_bound": 1200.0, "upper_bound": 1270.0 } },
//!     "median": { "point_estimate": 1220.0 },
//!     "min": 1100.0, "max": 1500.0, "sample_count": 100
//!   }
//! }
//! ```
//!
//! Only `mean.point_estimate` is required per entry. Entries without it, or
//! with fields of the wrong type, are skipped; the rest of the file still counts.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::schema::CanonicalStat;

pub(crate) const NS_PER_MS: f64 = 1_000_000.0;
const NS_PER_SEC: f64 = 1_000_000_000.0;

#[derive(Debug, Deserialize, Default)]
struct Entry {
    #[serde(default)]
    mean: Option<Estimate>,
    #[serde(default)]
    median: Option<Estimate>,
    #[serde(default)]
    min: Option<f64>,
    #[serde(default)]
    max: Option<f64>,
    #[serde(default)]
    sample_count: Option<f64>,
}

/// Statistical estimate with optional confidence interval.
#[derive(Debug, Deserialize, Default)]
struct Estimate {
    #[serde(default)]
    point_estimate: Option<f64>,
    #[serde(default)]
    confidence_interval: Option<ConfidenceInterval>,
}

#[derive(Debug, Deserialize, Default)]
struct ConfidenceInterval {
    #[serde(default)]
    lower_bound: Option<f64>,
    #[serde(default)]
    upper_bound: Option<f64>,
}

/// Parse the report at `path`, keyed by native benchmark name.
///
/// Unreadable or malformed files give an empty map and a warning; callers treat
/// that as "no data available".
pub fn parse_report(path: &Path) -> BTreeMap<String, CanonicalStat> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "failed to read statistics report");
            return BTreeMap::new();
        }
    };
    match serde_json::from_str::<Value>(&text) {
        Ok(value) => parse_value(&value),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "failed to parse statistics report");
            BTreeMap::new()
        }
    }
}

/// Parse an already decoded report document.
pub fn parse_value(value: &Value) -> BTreeMap<String, CanonicalStat> {
    let Some(entries) = value.as_object() else {
        warn!("statistics report is not a JSON object; ignoring it");
        return BTreeMap::new();
    };

    entries
        .iter()
        .filter_map(|(name, raw)| parse_entry(name, raw).map(|stat| (name.clone(), stat)))
        .collect()
}

fn parse_entry(name: &str, raw: &Value) -> Option<CanonicalStat> {
    let entry = match Entry::deserialize(raw) {
        Ok(entry) => entry,
        Err(err) => {
            warn!(benchmark = name, error = %err, "skipping malformed benchmark entry");
            return None;
        }
    };
    let Some(mean) = entry.mean else {
        debug!(benchmark = name, "skipping entry without a mean estimate");
        return None;
    };
    let Some(mean_ns) = mean.point_estimate else {
        debug!(benchmark = name, "skipping entry without mean.point_estimate");
        return None;
    };

    let interval = mean.confidence_interval.unwrap_or_default();
    let median_ns = entry.median.and_then(|m| m.point_estimate);

    Some(CanonicalStat {
        operation_key: name.to_string(),
        mean_ms: mean_ns / NS_PER_MS,
        min_ms: entry.min.map(|ns| ns / NS_PER_MS),
        max_ms: entry.max.map(|ns| ns / NS_PER_MS),
        median_ms: median_ns.map(|ns| ns / NS_PER_MS),
        samples: entry
            .sample_count
            .filter(|n| n.is_finite() && *n >= 0.0)
            .map(|n| n as u64),
        throughput_ops_per_sec: (mean_ns > 0.0).then(|| NS_PER_SEC / mean_ns),
        confidence_lower_ms: interval.lower_bound.map(|ns| ns / NS_PER_MS),
        confidence_upper_ms: interval.upper_bound.map(|ns| ns / NS_PER_MS),
        note: None,
    })
}
