use std::fs;
use std::path::Path;

use consensus_compare_bench::benches::{Workload, WorkloadResult};
use consensus_compare_bench::compare::{compare_exports, load_results_dir, MISSING_COUNTERPART_NOTE};
use consensus_compare_bench::criterion_report::parse_report;
use consensus_compare_bench::error::WorkloadError;
use consensus_compare_bench::normalize::{export_stats, reference_report, NameTable};
use consensus_compare_bench::report::{build_report, read_json, render_text, write_json};
use consensus_compare_bench::schema::{
    CanonicalExport, CanonicalStat, ComparisonReport, Faster, SystemLabels,
};
use serde_json::json;
use tempfile::TempDir;

fn write(path: &Path, value: &serde_json::Value) {
    fs::write(path, serde_json::to_string_pretty(value).unwrap()).unwrap();
}

fn alternative_report() -> serde_json::Value {
    json!({
        "check_transaction": {
            "mean": {
                "point_estimate": 12_345.678,
                "confidence_interval": { "lower_bound": 12_000.0, "upper_bound": 12_700.0 }
            },
            "min": 11_000.0,
            "max": 15_000.0,
            "sample_count": 100
        },
        "connect_block": { "mean": { "point_estimate": 1_700_000.0 } },
        "sha256_1kb": { "mean": { "point_estimate": 2_100.0 } }
    })
}

fn labels() -> SystemLabels {
    SystemLabels {
        a: "Alternative".to_string(),
        b: "Reference".to_string(),
    }
}

#[test]
fn test_hash_operations_without_reference_counterpart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("estimates.json");
    write(&path, &alternative_report());

    let stats = parse_report(&path);
    let a = export_stats("Alternative", &NameTable::alternative(), stats.into_values(), None);

    // Reference side measured transactions and blocks but its hash workload failed.
    let results = vec![
        WorkloadResult {
            workload: Workload::TransactionValidation,
            outcome: Ok(CanonicalStat::from_mean("testmempoolaccept", 0.9)),
        },
        WorkloadResult {
            workload: Workload::BlockValidation,
            outcome: Ok(CanonicalStat::from_mean("generatetoaddress", 25.0)),
        },
        WorkloadResult {
            workload: Workload::HashProxy,
            outcome: Err(WorkloadError::EmptyMeasurement {
                operation: "getblockhash".to_string(),
            }),
        },
    ];
    let b = reference_report("Reference", results, None, 1_700_000_000).to_export();

    let records = compare_exports(&a, &b);
    let keys: Vec<_> = records.iter().map(|r| r.operation_key.as_str()).collect();
    assert_eq!(
        keys,
        vec![
            "block_validation",
            "hash_operations_sha256",
            "transaction_validation"
        ]
    );

    let hash = &records[1];
    assert!(hash.stat_b.is_none());
    assert!(hash.ratio.is_none());
    assert_eq!(hash.note.as_deref(), Some(MISSING_COUNTERPART_NOTE));

    let tx = &records[2];
    assert_eq!(tx.faster, Some(Faster::A));
    assert!(tx.ratio.unwrap() > 1.0);

    let report = build_report(labels(), a, b, &records);
    let text = render_text(&report);
    assert!(text.contains("Hash Operations:"));
    assert!(text.contains(MISSING_COUNTERPART_NOTE));
}

#[test]
fn test_malformed_entries_do_not_abort_pipeline() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("estimates.json");
    write(
        &path,
        &json!({
            "check_transaction": { "mean": { "point_estimate": 5_000.0 } },
            "connect_block": { "mean": {} },
            "sha256_1kb": "garbage"
        }),
    );

    let stats = parse_report(&path);
    assert_eq!(stats.len(), 1);

    let a = export_stats("Alternative", &NameTable::alternative(), stats.into_values(), None);
    let records = compare_exports(&a, &CanonicalExport::new("Reference"));
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].operation_key, "transaction_validation");
}

#[test]
fn test_export_round_trip_preserves_means() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("estimates.json");
    write(&input, &alternative_report());

    let stats = parse_report(&input);
    let export = export_stats("Alternative", &NameTable::alternative(), stats.into_values(), None);
    let out = dir.path().join("export.json");
    write_json(&out, &export).unwrap();

    let loaded: CanonicalExport = read_json(&out).unwrap();
    assert_eq!(loaded, export);
    assert_eq!(
        loaded.benchmarks["transaction_validation"].mean_ms,
        12_345.678 / 1_000_000.0
    );
    assert_eq!(
        loaded.benchmarks["transaction_validation"].original_name,
        "check_transaction"
    );
}

#[test]
fn test_results_directories_compare_deterministically() {
    let dir = TempDir::new().unwrap();
    let alt_dir = dir.path().join("alternative");
    let ref_dir = dir.path().join("reference");
    fs::create_dir_all(&alt_dir).unwrap();
    fs::create_dir_all(&ref_dir).unwrap();

    write(&alt_dir.join("a_estimates.json"), &alternative_report());
    fs::write(alt_dir.join("b_broken.json"), "{ not json").unwrap();
    fs::write(alt_dir.join("notes.txt"), "ignored").unwrap();

    let reference = reference_report(
        "Reference",
        vec![WorkloadResult {
            workload: Workload::HashProxy,
            outcome: Ok(CanonicalStat::from_mean("getblockhash", 0.05).with_note("proxy")),
        }],
        None,
        1_700_000_000,
    );
    write_json(&ref_dir.join("reference.json"), &reference).unwrap();

    let run = || {
        let a = load_results_dir(&alt_dir, "Alternative").unwrap();
        let b = load_results_dir(&ref_dir, "Reference").unwrap();
        let records = compare_exports(&a, &b);
        build_report(labels(), a, b, &records)
    };

    let first = run();
    let second = run();
    assert_eq!(first, second);
    assert_eq!(first.comparison.len(), 3);
    assert_eq!(
        first.comparison["hash_operations_sha256"].note.as_deref(),
        Some("proxy")
    );

    let out = dir.path().join("comparison.json");
    write_json(&out, &first).unwrap();
    let loaded: ComparisonReport = read_json(&out).unwrap();
    assert_eq!(render_text(&loaded), render_text(&first));
}
