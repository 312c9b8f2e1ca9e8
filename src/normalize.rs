//! Native operation names to the shared canonical vocabulary.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::process::Command;
use std::time::Duration;

use tracing::debug;

use crate::benches::WorkloadResult;
use crate::node::run_with_timeout;
use crate::schema::{
    CanonicalExport, CanonicalStat, ExportEntry, ReferenceReport, SystemMetadata, WorkloadOutcome,
};

/// Closed, bidirectional native ↔ canonical name table for one system.
#[derive(Clone, Copy, Debug)]
pub struct NameTable {
    pairs: &'static [(&'static str, &'static str)],
}

const REFERENCE_NAMES: &[(&str, &str)] = &[
    ("testmempoolaccept", "transaction_validation"),
    ("generatetoaddress", "block_validation"),
    ("getblockhash", "hash_operations"),
];

const ALTERNATIVE_NAMES: &[(&str, &str)] = &[
    ("check_transaction", "transaction_validation"),
    ("check_transaction_complex", "transaction_validation_complex"),
    ("sha256_1kb", "hash_operations_sha256"),
    ("double_sha256_1kb", "hash_operations_double_sha256"),
    ("connect_block", "block_validation"),
    ("connect_block_multi_tx", "block_validation_multi_tx"),
];

impl NameTable {
    /// Names of the reference node's timed control-channel calls.
    pub const fn reference() -> Self {
        Self {
            pairs: REFERENCE_NAMES,
        }
    }

    /// Names used by the alternative implementation's micro-benchmarks.
    pub const fn alternative() -> Self {
        Self {
            pairs: ALTERNATIVE_NAMES,
        }
    }

    pub fn pairs(&self) -> &'static [(&'static str, &'static str)] {
        self.pairs
    }

    /// Canonical key for a native name. Unknown names are their own key.
    pub fn canonical(&self, native: &str) -> String {
        self.pairs
            .iter()
            .find(|(n, _)| *n == native)
            .map(|(_, canonical)| (*canonical).to_string())
            .unwrap_or_else(|| native.to_string())
    }

    /// Native name for a canonical key, when the table knows one.
    pub fn native(&self, canonical: &str) -> Option<&'static str> {
        self.pairs
            .iter()
            .find(|(_, c)| *c == canonical)
            .map(|(native, _)| *native)
    }
}

/// Operation families used to join and group canonical keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OperationFamily {
    TransactionValidation,
    HashOperations,
    BlockValidation,
    Other,
}

impl OperationFamily {
    pub const ALL: [OperationFamily; 4] = [
        OperationFamily::TransactionValidation,
        OperationFamily::HashOperations,
        OperationFamily::BlockValidation,
        OperationFamily::Other,
    ];

    /// `base` itself or `base_<variant>` belongs to the family of `base`.
    pub fn of(key: &str) -> Self {
        [
            OperationFamily::TransactionValidation,
            OperationFamily::HashOperations,
            OperationFamily::BlockValidation,
        ]
        .into_iter()
        .find(|family| {
            family.base_key().is_some_and(|base| {
                key == base
                    || key
                        .strip_prefix(base)
                        .is_some_and(|rest| rest.starts_with('_') && rest.len() > 1)
            })
        })
        .unwrap_or(OperationFamily::Other)
    }

    pub fn base_key(&self) -> Option<&'static str> {
        match self {
            OperationFamily::TransactionValidation => Some("transaction_validation"),
            OperationFamily::HashOperations => Some("hash_operations"),
            OperationFamily::BlockValidation => Some("block_validation"),
            OperationFamily::Other => None,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            OperationFamily::TransactionValidation => "Transaction Validation",
            OperationFamily::HashOperations => "Hash Operations",
            OperationFamily::BlockValidation => "Block Validation",
            OperationFamily::Other => "Other Operations",
        }
    }
}

/// Build a canonical export from stats keyed by native name.
///
/// If two native names map to the same canonical key the first one wins.
pub fn export_stats<I>(
    system: &str,
    table: &NameTable,
    stats: I,
    metadata: Option<SystemMetadata>,
) -> CanonicalExport
where
    I: IntoIterator<Item = CanonicalStat>,
{
    let mut export = CanonicalExport::new(system);
    export.metadata = metadata;
    for stat in stats {
        let key = table.canonical(&stat.operation_key);
        if export.benchmarks.contains_key(&key) {
            debug!(key = %key, native = %stat.operation_key, "duplicate canonical key; keeping first");
            continue;
        }
        let entry = ExportEntry::from_stat(&stat, stat.operation_key.as_str());
        export.benchmarks.insert(key, entry);
    }
    export
}

/// Assemble the document written by a reference run.
pub fn reference_report(
    system: &str,
    results: Vec<WorkloadResult>,
    metadata: Option<SystemMetadata>,
    timestamp_unix: u64,
) -> ReferenceReport {
    let table = NameTable::reference();
    let benchmarks: BTreeMap<String, WorkloadOutcome> = results
        .into_iter()
        .map(|result| {
            let native = result.workload.native_name();
            let outcome = match result.outcome {
                Ok(stat) => WorkloadOutcome::Measured(ExportEntry::from_stat(&stat, native)),
                Err(err) => WorkloadOutcome::Failed {
                    error: err.to_string(),
                },
            };
            (table.canonical(native), outcome)
        })
        .collect();

    ReferenceReport {
        system: system.to_string(),
        timestamp_unix,
        metadata,
        benchmarks,
        error: None,
    }
}

/// JSON object key for a system label: lowercase, non-alphanumerics as `_`.
/// Keys that would clash with the comparison report's own fields get a suffix.
pub fn system_key(label: &str) -> String {
    let key: String = label
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    match key.as_str() {
        "" => "system".to_string(),
        "comparison" | "labels" => format!("{key}_system"),
        _ => key,
    }
}

/// Best-effort description of the current machine.
pub fn collect_metadata(source_file: Option<&Path>) -> SystemMetadata {
    let cpuinfo = fs::read_to_string("/proc/cpuinfo").unwrap_or_default();
    SystemMetadata {
        platform: Some(format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH)),
        processor: cpuinfo_field(&cpuinfo, "vendor_id"),
        machine: Some(std::env::consts::ARCH.to_string()),
        cpu_model: cpuinfo_field(&cpuinfo, "model name"),
        rust_version: rustc_version(),
        source_file: source_file.map(|p| p.display().to_string()),
        extra: BTreeMap::new(),
    }
}

/// First value of `field` in `/proc/cpuinfo` text.
fn cpuinfo_field(cpuinfo: &str, field: &str) -> Option<String> {
    cpuinfo
        .lines()
        .find(|line| line.starts_with(field))
        .and_then(|line| line.split_once(':'))
        .map(|(_, model)| model.trim().to_string())
        .filter(|model| !model.is_empty())
}

fn rustc_version() -> Option<String> {
    let mut cmd = Command::new("rustc");
    cmd.arg("--version");
    match run_with_timeout(&mut cmd, Duration::from_secs(5)) {
        Ok(Some(output)) if output.status.success() => Some(output.stdout.trim().to_string()),
        _ => None,
    }
}
