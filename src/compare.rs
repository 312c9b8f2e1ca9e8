//! Joins two canonical exports by operation key.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::criterion_report;
use crate::error::ReportError;
use crate::normalize::{export_stats, NameTable, OperationFamily};
use crate::schema::{
    CanonicalExport, CanonicalStat, ComparisonRecord, ExportEntry, Faster, SystemMetadata,
};

pub const MISSING_COUNTERPART_NOTE: &str = "counterpart benchmark not available for comparison";
pub const NON_POSITIVE_MEAN_NOTE: &str = "non-positive mean; ratio not computed";

/// One record per key of `a`, in key order.
///
/// Counterparts are found by exact key first, then by the family's base key
/// (`block_validation_multi_tx` joins `block_validation`). A missing
/// counterpart yields a record carrying only `a` plus a note.
pub fn compare_exports(a: &CanonicalExport, b: &CanonicalExport) -> Vec<ComparisonRecord> {
    a.benchmarks
        .keys()
        .filter_map(|key| {
            let stat_a = a.stat(key)?;
            Some(compare_stats(key, stat_a, counterpart(b, key)))
        })
        .collect()
}

fn counterpart(b: &CanonicalExport, key: &str) -> Option<CanonicalStat> {
    b.stat(key).or_else(|| {
        OperationFamily::of(key)
            .base_key()
            .filter(|base| *base != key)
            .and_then(|base| b.stat(base))
    })
}

/// Ratio is `b / a`; both means must be finite and positive.
pub fn compare_stats(
    operation_key: &str,
    stat_a: CanonicalStat,
    stat_b: Option<CanonicalStat>,
) -> ComparisonRecord {
    let mut notes: Vec<String> = Vec::new();
    let mut ratio = None;
    let mut faster = None;

    match &stat_b {
        None => notes.push(MISSING_COUNTERPART_NOTE.to_string()),
        Some(b) => {
            let a_ms = stat_a.mean_ms;
            let b_ms = b.mean_ms;
            if a_ms.is_finite() && b_ms.is_finite() && a_ms > 0.0 && b_ms > 0.0 {
                ratio = Some(b_ms / a_ms);
                faster = Some(if a_ms < b_ms { Faster::A } else { Faster::B });
            } else {
                notes.push(NON_POSITIVE_MEAN_NOTE.to_string());
            }
        }
    }

    let carried = [
        stat_a.note.as_deref(),
        stat_b.as_ref().and_then(|b| b.note.as_deref()),
    ];
    for note in carried.into_iter().flatten() {
        if !notes.iter().any(|n| n == note) {
            notes.push(note.to_string());
        }
    }

    ComparisonRecord {
        operation_key: operation_key.to_string(),
        stat_a,
        stat_b,
        ratio,
        faster,
        note: (!notes.is_empty()).then(|| notes.join("; ")),
    }
}

/// Every `*.json` file directly inside `dir`, sorted by file name.
fn json_files(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!(error = %err, "skipping unreadable directory entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .collect()
}

/// Decode one results file into canonical form.
///
/// Accepts a reference report (with or without a timestamp), a canonical
/// export, or a raw statistics report (normalized with the alternative name
/// table).
fn load_results_file(path: &Path) -> Option<CanonicalExport> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "skipping unreadable results file");
            return None;
        }
    };
    let value: Value = match serde_json::from_str(&text) {
        Ok(value) => value,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "skipping malformed results file");
            return None;
        }
    };

    if let (Some(system), Some(benchmarks)) = (
        value.get("system").and_then(Value::as_str),
        value.get("benchmarks").and_then(Value::as_object),
    ) {
        if let Some(error) = value.get("error").and_then(Value::as_str) {
            warn!(path = %path.display(), error, "results file records a failed run");
        }
        let mut export = CanonicalExport::new(system);
        export.metadata = value.get("metadata").and_then(|raw| decode_metadata(path, raw));
        export.benchmarks = benchmarks
            .iter()
            .filter_map(|(key, raw)| decode_entry(path, key, raw).map(|entry| (key.clone(), entry)))
            .collect();
        debug!(path = %path.display(), entries = export.benchmarks.len(), "loaded results export");
        return Some(export);
    }

    let stats = criterion_report::parse_value(&value);
    debug!(path = %path.display(), entries = stats.len(), "loaded statistics report");
    let system = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    Some(export_stats(
        &system,
        &NameTable::alternative(),
        stats.into_values(),
        None,
    ))
}

/// One `benchmarks` entry. Failed workloads are skipped quietly, malformed
/// entries with a warning; neither affects the rest of the file. A missing
/// `original_name` falls back to the canonical key.
fn decode_entry(path: &Path, key: &str, raw: &Value) -> Option<ExportEntry> {
    if raw.get("mean_ms").is_none() {
        if let Some(error) = raw.get("error").and_then(Value::as_str) {
            debug!(path = %path.display(), key, error, "skipping failed workload");
            return None;
        }
    }
    let mut raw = raw.clone();
    if let Some(fields) = raw.as_object_mut() {
        fields
            .entry("original_name")
            .or_insert_with(|| Value::String(key.to_string()));
    }
    match ExportEntry::deserialize(&raw) {
        Ok(entry) => Some(entry),
        Err(err) => {
            warn!(path = %path.display(), key, error = %err, "skipping malformed benchmark entry");
            None
        }
    }
}

fn decode_metadata(path: &Path, raw: &Value) -> Option<SystemMetadata> {
    match SystemMetadata::deserialize(raw) {
        Ok(metadata) => Some(metadata),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "ignoring malformed metadata");
            None
        }
    }
}

/// Merge every results file in `dir` into one canonical export labelled
/// `system`. Earlier files win on key collisions.
pub fn load_results_dir(dir: &Path, system: &str) -> Result<CanonicalExport, ReportError> {
    if !dir.is_dir() {
        return Err(ReportError::MissingDirectory(dir.to_path_buf()));
    }

    let mut merged = CanonicalExport::new(system);
    for path in json_files(dir) {
        let Some(export) = load_results_file(&path) else {
            continue;
        };
        if merged.metadata.is_none() {
            merged.metadata = export.metadata;
        }
        for (key, entry) in export.benchmarks {
            if merged.benchmarks.contains_key(&key) {
                warn!(key = %key, path = %path.display(), "duplicate benchmark key; keeping the first");
                continue;
            }
            merged.benchmarks.insert(key, entry);
        }
    }
    info!(system, dir = %dir.display(), benchmarks = merged.benchmarks.len(), "loaded results");
    Ok(merged)
}
