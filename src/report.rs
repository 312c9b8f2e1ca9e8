//! Comparison report assembly, text rendering and JSON file I/O.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::io::Write as _;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::criterion_report::NS_PER_MS;
use crate::error::ReportError;
use crate::normalize::{system_key, OperationFamily};
use crate::schema::{
    CanonicalExport, ComparisonEntry, ComparisonRecord, ComparisonReport, SystemLabels,
};

const RULE_WIDTH: usize = 72;

/// Bundle both exports and the joined records into one report document.
pub fn build_report(
    labels: SystemLabels,
    a: CanonicalExport,
    b: CanonicalExport,
    records: &[ComparisonRecord],
) -> ComparisonReport {
    let mut systems = BTreeMap::new();
    let key_a = system_key(&labels.a);
    let mut key_b = system_key(&labels.b);
    if key_b == key_a {
        key_b.push_str("_b");
    }
    systems.insert(key_a, a);
    systems.insert(key_b, b);

    let comparison = records
        .iter()
        .map(|record| (record.operation_key.clone(), ComparisonEntry::from(record)))
        .collect();

    ComparisonReport {
        labels,
        systems,
        comparison,
    }
}

/// Render a time given in milliseconds with the largest unit that keeps it ≥ 1.
pub fn format_time_ms(ms: f64) -> String {
    let ns = ms * NS_PER_MS;
    if ns >= 1_000_000_000.0 {
        format!("{:.3} s", ns / 1_000_000_000.0)
    } else if ns >= 1_000_000.0 {
        format!("{:.3} ms", ns / 1_000_000.0)
    } else if ns >= 1_000.0 {
        format!("{:.3} µs", ns / 1_000.0)
    } else {
        format!("{ns:.2} ns")
    }
}

/// Render ops/sec as plain, thousands (`K`) or millions (`M`).
pub fn format_throughput(ops_per_sec: f64) -> String {
    if ops_per_sec > 1_000_000.0 {
        format!("{:.2}M ops/sec", ops_per_sec / 1_000_000.0)
    } else if ops_per_sec > 1_000.0 {
        format!("{:.2}K ops/sec", ops_per_sec / 1_000.0)
    } else {
        format!("{ops_per_sec:.2} ops/sec")
    }
}

/// `block_validation_multi_tx` under `block_validation` → "Multi Tx".
fn variant_title(key: &str, family: OperationFamily) -> String {
    let suffix = family
        .base_key()
        .and_then(|base| key.strip_prefix(base))
        .map(|rest| rest.trim_start_matches('_'))
        .filter(|rest| !rest.is_empty())
        .unwrap_or(key);
    suffix
        .split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn render_entry(out: &mut String, labels: &SystemLabels, entry: &ComparisonEntry, indent: &str) {
    let _ = writeln!(out, "{indent}{}: {}", labels.a, format_time_ms(entry.a_ms));
    if let Some(b_ms) = entry.b_ms {
        let _ = writeln!(out, "{indent}{}: {}", labels.b, format_time_ms(b_ms));
    }
    if let Some(ratio) = entry.ratio {
        match entry.faster {
            Some(side) => {
                let _ = writeln!(
                    out,
                    "{indent}Ratio: {ratio:.2}x ({} is faster)",
                    labels.name(side)
                );
            }
            None => {
                let _ = writeln!(out, "{indent}Ratio: {ratio:.2}x");
            }
        }
    }
    if let Some(throughput) = entry.a_throughput {
        let _ = writeln!(
            out,
            "{indent}{} Throughput: {}",
            labels.a,
            format_throughput(throughput)
        );
    }
    if let Some(note) = &entry.note {
        let _ = writeln!(out, "{indent}Note: {note}");
    }
}

/// Fixed-layout text rendering: one section per operation family, keys
/// sorted within each section.
pub fn render_text(report: &ComparisonReport) -> String {
    let labels = &report.labels;
    let rule = "=".repeat(RULE_WIDTH);
    let mut out = String::new();
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "Benchmark Comparison: {} vs {}", labels.a, labels.b);
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out);

    if report.comparison.is_empty() {
        let _ = writeln!(out, "No comparison data found");
        let _ = writeln!(out);
    }

    for family in OperationFamily::ALL {
        let keys: Vec<&String> = report
            .comparison
            .keys()
            .filter(|key| OperationFamily::of(key) == family)
            .collect();
        if keys.is_empty() {
            continue;
        }

        let _ = writeln!(out, "{}:", family.title());
        for key in keys {
            let _ = writeln!(out, "  {}:", variant_title(key, family));
            render_entry(&mut out, labels, &report.comparison[key], "    ");
        }
        let _ = writeln!(out);
    }

    let _ = writeln!(out, "{rule}");
    let _ = writeln!(
        out,
        "Note: lightweight benchmarks without warm-up control or outlier rejection."
    );
    let _ = writeln!(out, "For production performance testing, use full blockchain data.");
    let _ = writeln!(out, "{rule}");
    out
}

/// Write `value` as pretty JSON, replacing `path` atomically.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ReportError> {
    let json = serde_json::to_string_pretty(value).map_err(|e| ReportError::json(path, e))?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|e| ReportError::io(dir, e))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| ReportError::io(dir, e))?;
    tmp.write_all(json.as_bytes())
        .and_then(|_| tmp.write_all(b"\n"))
        .map_err(|e| ReportError::io(path, e))?;
    tmp.persist(path).map_err(|e| ReportError::io(path, e.error))?;
    Ok(())
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ReportError> {
    if !path.is_file() {
        return Err(ReportError::MissingFile(path.to_path_buf()));
    }
    let text = fs::read_to_string(path).map_err(|e| ReportError::io(path, e))?;
    serde_json::from_str(&text).map_err(|e| ReportError::json(path, e))
}
